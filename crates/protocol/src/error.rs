use thiserror::Error;

/// Error codes that are part of the wire contract (§7 of the design).
///
/// These travel inside error responses/notifications as plain strings, so
/// the enum carries an explicit `as_str` rather than relying on `Display`
/// matching the wire spelling by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidHeaders,
    InvalidMessage,
    InvalidJson,
    UnknownCommand,
    MemoryBudgetExceeded,
    ReadFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidHeaders => "INVALID_HEADERS",
            ErrorCode::InvalidMessage => "INVALID_MESSAGE",
            ErrorCode::InvalidJson => "INVALID_JSON",
            ErrorCode::UnknownCommand => "UNKNOWN_COMMAND",
            ErrorCode::MemoryBudgetExceeded => "MEMORY_BUDGET_EXCEEDED",
            ErrorCode::ReadFailed => "READ_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the frame codec and envelope validators.
///
/// `Fatal` variants mean the underlying byte stream cannot be trusted any
/// further (the codec must not attempt to resync); everything else is
/// scoped to a single frame or message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("missing or non-integer Content-Length header")]
    InvalidHeaders,

    #[error("frame body is not valid UTF-8")]
    InvalidUtf8(#[source] std::str::Utf8Error),

    #[error("frame body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("envelope missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    #[error("envelope type `{envelope_type}` cannot carry command `{command}`")]
    InvalidMessage {
        envelope_type: &'static str,
        command: String,
    },

    #[error("underlying I/O error")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Maps a protocol error onto the wire-level error taxonomy.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            ProtocolError::InvalidHeaders => ErrorCode::InvalidHeaders,
            ProtocolError::InvalidUtf8(_) | ProtocolError::InvalidJson(_) => {
                ErrorCode::InvalidJson
            }
            ProtocolError::MissingField(_) | ProtocolError::InvalidMessage { .. } => {
                ErrorCode::InvalidMessage
            }
            ProtocolError::UnknownCommand(_) => ErrorCode::UnknownCommand,
            ProtocolError::Io(_) => ErrorCode::ReadFailed,
        }
    }
}
