//! Text post-processing applied after the formatter runs (§4.3 steps 5-6):
//! line-ending normalization, trailing-terminator enforcement, and
//! synthetic `TODO` diagnostics.

use fmt_protocol::payload::{Diagnostic, DiagnosticSeverity, EndOfLine};

/// Normalizes every line ending in `text` to `eol` and ensures the result
/// ends with exactly one terminator.
pub fn normalize_line_endings(text: &str, eol: EndOfLine) -> String {
    let unified: String = text.replace("\r\n", "\n");
    let terminator = eol.as_str();
    let trimmed = unified.trim_end_matches('\n');
    let mut out = trimmed.replace('\n', terminator);
    out.push_str(terminator);
    out
}

/// Appends a `warning` diagnostic for every literal occurrence of the
/// substring `TODO`, spanning `[i, i+4)` as specified.
pub fn todo_diagnostics(text: &str) -> Vec<Diagnostic> {
    let bytes = text.as_bytes();
    let needle = b"TODO";
    let mut diagnostics = Vec::new();
    let mut i = 0;
    while i + needle.len() <= bytes.len() {
        if &bytes[i..i + needle.len()] == needle {
            diagnostics.push(Diagnostic {
                severity: DiagnosticSeverity::Warning,
                message: "TODO comment detected.".to_string(),
                start: Some(i),
                end: Some(i + needle.len()),
            });
        }
        i += 1;
    }
    diagnostics
}
