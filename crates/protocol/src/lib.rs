#![forbid(unsafe_code)]
//! Wire protocol shared by the formatter host and client: frame codec
//! (`Content-Length`-prefixed UTF-8 JSON) plus the envelope and per-command
//! payload schema described by the formatting bridge's design.
//!
//! This crate has no process-management or I/O-scheduling opinions of its
//! own; it only knows how to turn bytes into envelopes and back.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod manifest;
pub mod payload;

pub use codec::{decode_envelope, encode_frame, FrameReader};
pub use envelope::{Command, Envelope, EnvelopeType, PROTOCOL_VERSION};
pub use error::{ErrorCode, ProtocolError};
pub use manifest::{current_platform_key, BinaryEntry, BinaryManifest};

#[cfg(feature = "tokio")]
pub use codec::tokio_io::{write_frame, AsyncFrameReader};

#[cfg(test)]
mod tests;
