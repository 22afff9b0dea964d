#![forbid(unsafe_code)]
//! Client-side supervisor for the formatter host process: spawns the host,
//! performs the handshake, serializes `format` calls through an isolated
//! worker transport, and exposes the caller-facing [`FormatterClient`].

pub mod builder;
pub mod defaults;
pub mod error;
pub mod facade;
pub mod host_resolve;
pub mod shared_buffer;
pub mod telemetry;
pub mod transport;

pub use builder::FormatterClientBuilder;
pub use error::ClientError;
pub use facade::FormatterClient;

#[cfg(test)]
mod tests;
