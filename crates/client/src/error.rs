use std::path::PathBuf;

use thiserror::Error;

/// Client-facing error taxonomy. Every variant carries enough context to
/// diagnose the failure without re-deriving it from logs, mirroring the
/// error-enum-per-crate-boundary convention this workspace uses throughout.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no host binary found: tried {tried:?}")]
    HostBinaryNotFound { tried: Vec<PathBuf> },

    #[error("host binary at {path:?} is not executable")]
    HostBinaryNotExecutable { path: PathBuf },

    #[error("failed to spawn host process at {path:?}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake with host timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),

    #[error("request `{command}` timed out after {timeout:?}")]
    RequestTimeout {
        command: &'static str,
        timeout: std::time::Duration,
    },

    #[error("host process exited before responding (code={code:?}, signal={signal:?})")]
    ChildExited {
        code: Option<i32>,
        signal: Option<i32>,
    },

    #[error("host reported a fatal error: {0}")]
    FatalNotification(String),

    #[error("host response exceeded the shared buffer capacity")]
    BufferOverflow,

    #[error("wire protocol error")]
    Protocol(#[from] fmt_protocol::ProtocolError),

    #[error("host returned an error response: {code}: {message}")]
    HostError { code: String, message: String },

    #[error("worker transport is unavailable")]
    TransportUnavailable,

    #[error("I/O error")]
    Io(#[from] std::io::Error),
}
