//! The actual code-formatting algorithm is an external collaborator whose
//! contract, not implementation, belongs here: a `Formatter` is handed
//! already-clamped options and a content slice and returns formatted text
//! plus parse diagnostics. Production hosts plug in a real formatting
//! engine; [`PassthroughFormatter`] is the dependency-free stand-in this
//! workspace ships and tests against.

use std::time::Duration;

use fmt_protocol::payload::FormattingOptions;

pub struct FormatOutcome {
    pub formatted: String,
    pub parse_diagnostic_count: u32,
    pub elapsed: Duration,
}

pub trait Formatter: Send + Sync {
    fn format(&self, content: &str, options: &FormattingOptions) -> FormatOutcome;
}

/// Formats nothing: returns the input unchanged. Downstream post-processing
/// (line-ending normalization, trailing-newline enforcement, TODO
/// diagnostics) still runs on top of this, so the handler's observable
/// behavior is fully exercised without a real formatting engine.
#[derive(Debug, Default)]
pub struct PassthroughFormatter;

impl Formatter for PassthroughFormatter {
    fn format(&self, content: &str, _options: &FormattingOptions) -> FormatOutcome {
        let started = std::time::Instant::now();
        FormatOutcome {
            formatted: content.to_string(),
            parse_diagnostic_count: 0,
            elapsed: started.elapsed(),
        }
    }
}
