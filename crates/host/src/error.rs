use thiserror::Error;

/// Internal host failures. These never cross the wire directly; the
/// dispatch loop turns them into `error` notifications or response
/// payloads carrying the matching [`fmt_protocol::ErrorCode`].
#[derive(Debug, Error)]
pub enum HostError {
    #[error("wire protocol error")]
    Protocol(#[from] fmt_protocol::ProtocolError),

    #[error("failed to read working-set memory sample")]
    MemorySample(#[source] std::io::Error),

    #[error("standard output is closed")]
    Io(#[from] std::io::Error),
}
