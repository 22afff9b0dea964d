//! Request dispatch for the host event loop (§4.3).
//!
//! Each handler is a pure-ish function over `&mut HostState` plus the
//! envelope payload; the caller (the frame loop in `main.rs`) is
//! responsible for I/O and for acting on the `exit_code` an outcome may
//! carry.

use fmt_protocol::envelope::{Command, Envelope};
use fmt_protocol::error::{ErrorCode, ProtocolError};
use fmt_protocol::payload::{
    ErrorNotification, ErrorSeverity, FormatMetrics, FormatRequest, FormatResponse,
    FormatResponseDetails, HostCapabilities, InitializeRequest, InitializeResponse, LogLevel,
    LogNotification, PingRequest, PingResponse, ShutdownRequest, ShutdownResponse,
};
use serde_json::Value;

use crate::defaults;
use crate::error::HostError;
use crate::formatter::Formatter;
use crate::memory;
use crate::postprocess;
use crate::state::HostState;

pub const HOST_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of dispatching a single request envelope.
pub struct DispatchOutcome {
    pub response: Envelope,
    pub notifications: Vec<Envelope>,
    /// Set when the handler determined the process must exit after
    /// flushing `response` and `notifications` (clean shutdown, or the
    /// memory-guard hard exit).
    pub exit_code: Option<i32>,
}

fn ok_outcome(response: Envelope) -> DispatchOutcome {
    DispatchOutcome {
        response,
        notifications: Vec::new(),
        exit_code: None,
    }
}

fn value_of<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).expect("payload types always serialize")
}

/// Dispatches one already-validated `request` envelope. Non-request
/// envelopes are rejected by the caller before this is reached.
pub fn dispatch(
    envelope: Envelope,
    state: &mut HostState,
    formatter: &dyn Formatter,
) -> Result<DispatchOutcome, HostError> {
    let request_id = envelope
        .request_id
        .clone()
        .expect("request envelopes carry a requestId");

    match envelope.command {
        Command::Initialize => {
            let parsed: Result<InitializeRequest, _> = serde_json::from_value(envelope.payload);
            Ok(match parsed {
                Ok(req) => handle_initialize(state, &request_id, req),
                Err(_) => invalid_message(&request_id, Command::Initialize),
            })
        }
        Command::Format => {
            let parsed: Result<FormatRequest, _> = serde_json::from_value(envelope.payload);
            match parsed {
                Ok(req) => handle_format(state, formatter, &request_id, req),
                Err(_) => Ok(invalid_message(&request_id, Command::Format)),
            }
        }
        Command::Ping => {
            let parsed: Result<PingRequest, _> = serde_json::from_value(envelope.payload);
            Ok(match parsed {
                Ok(req) => handle_ping(state, &request_id, req),
                Err(_) => invalid_message(&request_id, Command::Ping),
            })
        }
        Command::Shutdown => {
            let parsed: Result<ShutdownRequest, _> = serde_json::from_value(envelope.payload);
            Ok(match parsed {
                Ok(req) => handle_shutdown(&request_id, req),
                Err(_) => invalid_message(&request_id, Command::Shutdown),
            })
        }
        Command::Log | Command::Error => {
            // These are host -> client notification commands; a client
            // should never send them as a request.
            Ok(invalid_message(&request_id, envelope.command))
        }
    }
}

/// Builds the outcome for a frame body that failed to decode into a valid
/// envelope (malformed JSON, an unknown command, or a structurally invalid
/// message). When a `requestId` could be recovered from the raw body, this
/// is a per-request error response tagged `error`; callers without a
/// recovered `requestId` should fall back to [`decode_error_notification`]
/// instead, since there is nothing to tie a response to.
pub fn decode_error_response(request_id: String, err: &ProtocolError) -> DispatchOutcome {
    let response = FormatResponse {
        ok: false,
        error_code: Some(err.error_code().as_str().to_string()),
        message: Some(err.to_string()),
        ..Default::default()
    };
    ok_outcome(Envelope::response(request_id, Command::Error, value_of(&response)))
}

/// Builds a recoverable `error` notification for a frame body that failed
/// to decode and carried no recoverable `requestId`.
pub fn decode_error_notification(err: &ProtocolError) -> Envelope {
    Envelope::notification(
        Command::Error,
        value_of(&ErrorNotification {
            severity: ErrorSeverity::Recoverable,
            error_code: Some(err.error_code().as_str().to_string()),
            message: err.to_string(),
            details: None,
        }),
    )
}

fn invalid_message(request_id: &str, command: Command) -> DispatchOutcome {
    let response = FormatResponse {
        ok: false,
        error_code: Some(ErrorCode::InvalidMessage.as_str().to_string()),
        message: Some(format!("invalid request for command `{}`", command.as_str())),
        ..Default::default()
    };
    ok_outcome(Envelope::response(
        request_id,
        command,
        value_of(&response),
    ))
}

fn handle_initialize(
    state: &mut HostState,
    request_id: &str,
    req: InitializeRequest,
) -> DispatchOutcome {
    let response = InitializeResponse {
        ok: true,
        host_version: Some(state.host_version.clone()),
        roslyn_language_version: req.options.roslyn_language_version.clone(),
        capabilities: Some(HostCapabilities {
            supports_range_formatting: true,
            supports_diagnostics: true,
            supports_telemetry: true,
        }),
        reason: None,
    };

    let notification = Envelope::notification(
        Command::Log,
        value_of(&LogNotification {
            level: LogLevel::Info,
            message: "initialize completed".to_string(),
            trace_token: None,
            context: Some(serde_json::json!({
                "clientVersion": req.client_version,
                "platform": req.platform,
                "hostVersion": state.host_version,
            })),
        }),
    );

    DispatchOutcome {
        response: Envelope::response(request_id, Command::Initialize, value_of(&response)),
        notifications: vec![notification],
        exit_code: None,
    }
}

fn handle_ping(state: &mut HostState, request_id: &str, req: PingRequest) -> DispatchOutcome {
    let timestamp = req.timestamp.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    });
    let response = PingResponse {
        ok: true,
        timestamp,
        uptime_ms: state.uptime_ms(),
        active_requests: state.active_request_count,
    };
    ok_outcome(Envelope::response(request_id, Command::Ping, value_of(&response)))
}

fn handle_shutdown(request_id: &str, _req: ShutdownRequest) -> DispatchOutcome {
    let response = ShutdownResponse { ok: true };
    DispatchOutcome {
        response: Envelope::response(request_id, Command::Shutdown, value_of(&response)),
        notifications: Vec::new(),
        exit_code: Some(0),
    }
}

fn handle_format(
    state: &mut HostState,
    formatter: &dyn Formatter,
    request_id: &str,
    req: FormatRequest,
) -> Result<DispatchOutcome, HostError> {
    state.observe_session(&req.session_id);
    let options = req.options.clamped();

    let range = req.range.filter(|r| r.validate(req.content.len()));
    let (before, target, after) = match range {
        Some(r) if req.content.is_char_boundary(r.start) && req.content.is_char_boundary(r.end) => {
            (&req.content[..r.start], &req.content[r.start..r.end], &req.content[r.end..])
        }
        _ => ("", req.content.as_str(), ""),
    };

    let before_sample = memory::sample()?;

    let outcome = formatter.format(target, &options);

    let mut assembled = String::with_capacity(before.len() + outcome.formatted.len() + after.len());
    assembled.push_str(before);
    assembled.push_str(&outcome.formatted);
    assembled.push_str(after);

    let normalized = postprocess::normalize_line_endings(&assembled, options.end_of_line);
    let diagnostics = postprocess::todo_diagnostics(&normalized);

    let after_sample = memory::sample()?;
    let working_set_mb = after_sample.working_set_mb;
    let working_set_delta_mb = (after_sample.working_set_mb - before_sample.working_set_mb).max(0.0);
    let budget = defaults::memory_budget_mb();

    if working_set_mb > budget {
        memory::force_collection();
        let post_collection = memory::sample()?;

        let details = FormatResponseDetails {
            managed_memory_mb: Some(post_collection.working_set_mb),
            working_set_mb: Some(post_collection.working_set_mb),
            working_set_delta_mb: Some(working_set_delta_mb),
            budget_mb: Some(budget),
        };
        let message = format!(
            "working set {:.1}MB exceeds budget {:.1}MB",
            post_collection.working_set_mb, budget
        );
        let response = FormatResponse {
            ok: false,
            error_code: Some(ErrorCode::MemoryBudgetExceeded.as_str().to_string()),
            message: Some(message.clone()),
            details: Some(details),
            ..Default::default()
        };
        let notification = Envelope::notification(
            Command::Error,
            value_of(&ErrorNotification {
                severity: ErrorSeverity::Fatal,
                error_code: Some(ErrorCode::MemoryBudgetExceeded.as_str().to_string()),
                message,
                details: None,
            }),
        );

        let exit_code = if post_collection.working_set_mb > defaults::POST_COLLECTION_GUARD_RATIO * budget {
            Some(defaults::MEMORY_GUARD_EXIT_CODE)
        } else {
            None
        };

        return Ok(DispatchOutcome {
            response: Envelope::response(request_id, Command::Format, value_of(&response)),
            notifications: vec![notification],
            exit_code,
        });
    }

    let metrics = FormatMetrics {
        elapsed_ms: outcome.elapsed.as_millis() as u64,
        parse_diagnostics: outcome.parse_diagnostic_count,
        managed_memory_mb: Some(working_set_mb),
        working_set_mb: Some(working_set_mb),
        working_set_delta_mb: Some(working_set_delta_mb),
    };
    let response = FormatResponse {
        ok: true,
        formatted: Some(normalized),
        diagnostics: Some(diagnostics),
        metrics: Some(metrics.clone()),
        ..Default::default()
    };
    let notification = Envelope::notification(
        Command::Log,
        value_of(&LogNotification {
            level: LogLevel::Debug,
            message: "format completed".to_string(),
            trace_token: req.trace_token.clone(),
            context: Some(value_of(&metrics)),
        }),
    );

    Ok(DispatchOutcome {
        response: Envelope::response(request_id, Command::Format, value_of(&response)),
        notifications: vec![notification],
        exit_code: None,
    })
}
