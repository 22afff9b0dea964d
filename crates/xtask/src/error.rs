use thiserror::Error;

#[derive(Debug, Error)]
pub enum XtaskError {
    #[error("failed to spawn host binary at {path:?}")]
    Spawn {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("wire protocol error")]
    Protocol(#[from] fmt_protocol::ProtocolError),

    #[error("initialize timed out after {0:?}")]
    InitializeTimeout(std::time::Duration),

    #[error("shutdown exit timed out after {0:?}")]
    ShutdownTimeout(std::time::Duration),

    #[error("host emitted an error notification before completing the smoke test: {0}")]
    ErrorNotification(String),

    #[error("host closed its output before responding")]
    UnexpectedEof,

    #[error("host returned ok:false for {command}: {message}")]
    HostRejected { command: &'static str, message: String },

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("could not read manifest at {path:?}")]
    ManifestRead {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest at {path:?} is not valid JSON")]
    ManifestParse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no entry for platform `{0}` in manifest")]
    NoEntryForPlatform(String),

    #[error("manifest lookup requires a known platform key, but this platform has none")]
    UnknownPlatform,
}
