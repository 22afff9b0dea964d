//! `Content-Length`-framed encode/decode for UTF-8 JSON envelopes (§4.1).
//!
//! The codec is split into a buffer-scanning core ([`scan_frame`]) reused by
//! both the synchronous [`FrameReader`] (for plain `std::io::Read` sources,
//! e.g. tests) and the `tokio`-gated [`AsyncFrameReader`] (for the real
//! child-process pipes). Neither variant ever discards a trailing partial
//! frame; both retain it until more bytes arrive.

use std::io::Read;

use crate::envelope::Envelope;
use crate::error::ProtocolError;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const CHUNK_SIZE_BYTES: usize = 8192;

/// Encodes a single envelope as a `Content-Length`-prefixed frame.
pub fn encode_frame(envelope: &Envelope) -> Result<Vec<u8>, ProtocolError> {
    let body = serde_json::to_vec(envelope).map_err(ProtocolError::InvalidJson)?;
    let mut out = Vec::with_capacity(body.len() + 32);
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

pub(crate) enum ScanResult {
    /// Not enough bytes buffered yet to make a decision.
    NeedMoreData,
    /// A header block was found but `Content-Length` was missing or not a
    /// non-negative integer. `consumed` bytes (through the terminator) must
    /// be discarded; the codec does not attempt to resync further.
    InvalidHeaders { consumed: usize },
    /// A complete frame is available. `consumed` is the total number of
    /// bytes (headers + body) to drop from the buffer once the body has
    /// been read out of `body_range`.
    Frame {
        consumed: usize,
        body_range: std::ops::Range<usize>,
    },
}

/// Scans `buf` for one complete frame starting at its front.
pub(crate) fn scan_frame(buf: &[u8]) -> ScanResult {
    let Some(terminator_pos) = find_subslice(buf, HEADER_TERMINATOR) else {
        return ScanResult::NeedMoreData;
    };
    let header_block = &buf[..terminator_pos];
    let header_end = terminator_pos + HEADER_TERMINATOR.len();

    let content_length = match parse_content_length(header_block) {
        Some(len) => len,
        None => {
            return ScanResult::InvalidHeaders {
                consumed: header_end,
            }
        }
    };

    let body_end = header_end + content_length;
    if buf.len() < body_end {
        return ScanResult::NeedMoreData;
    }

    ScanResult::Frame {
        consumed: body_end,
        body_range: header_end..body_end,
    }
}

fn parse_content_length(header_block: &[u8]) -> Option<usize> {
    let text = std::str::from_utf8(header_block).ok()?;
    let mut found = None;
    for line in text.split("\r\n") {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            let value = value.trim();
            if !value.bytes().all(|b| b.is_ascii_digit()) || value.is_empty() {
                return None;
            }
            found = Some(value.parse::<usize>().ok()?);
        }
    }
    found
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Mirrors [`Envelope`]'s shape but keeps `command` as a raw string, so an
/// unrecognized command can be distinguished from a structurally malformed
/// body instead of both collapsing into a JSON deserialization failure.
#[derive(serde::Deserialize)]
struct RawEnvelope {
    version: u32,
    #[serde(rename = "type")]
    envelope_type: crate::envelope::EnvelopeType,
    #[serde(rename = "requestId")]
    request_id: Option<String>,
    command: String,
    payload: serde_json::Value,
}

/// Decodes one frame body into a validated [`Envelope`].
pub fn decode_envelope(body: &[u8]) -> Result<Envelope, ProtocolError> {
    let text = std::str::from_utf8(body).map_err(ProtocolError::InvalidUtf8)?;
    let raw: RawEnvelope = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    let command = crate::envelope::Command::parse(&raw.command)
        .ok_or_else(|| ProtocolError::UnknownCommand(raw.command.clone()))?;
    let envelope = Envelope {
        version: raw.version,
        envelope_type: raw.envelope_type,
        request_id: raw.request_id,
        command,
        payload: raw.payload,
    };
    envelope.validate()?;
    Ok(envelope)
}

/// Incremental, allocation-reusing frame accumulator shared by the sync and
/// async readers. Feed it bytes as they arrive; pull frames out one at a
/// time with [`FrameAccumulator::pop_frame`].
#[derive(Default)]
pub(crate) struct FrameAccumulator {
    buf: Vec<u8>,
}

impl FrameAccumulator {
    pub(crate) fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops the next decoded envelope, if a complete frame is buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed. On `InvalidHeaders`
    /// the malformed header block is discarded and an error returned; the
    /// accumulator remains usable for subsequent frames.
    pub(crate) fn pop_frame(&mut self) -> Result<Option<Envelope>, ProtocolError> {
        match self.pop_frame_bytes()? {
            None => Ok(None),
            Some(body) => Ok(Some(decode_envelope(&body)?)),
        }
    }

    /// Pops the next frame's raw body, if a complete frame is buffered,
    /// without attempting to decode it into an [`Envelope`]. Lets a caller
    /// recover partial information (`requestId`, `command`) from a body
    /// that fails to decode, rather than losing it the instant decoding
    /// fails.
    ///
    /// Framing errors (`InvalidHeaders`) are still returned here; only
    /// envelope decoding is deferred to the caller.
    pub(crate) fn pop_frame_bytes(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        match scan_frame(&self.buf) {
            ScanResult::NeedMoreData => Ok(None),
            ScanResult::InvalidHeaders { consumed } => {
                self.buf.drain(..consumed);
                Err(ProtocolError::InvalidHeaders)
            }
            ScanResult::Frame {
                consumed,
                body_range,
            } => {
                let body = self.buf[body_range].to_vec();
                self.buf.drain(..consumed);
                self.skip_leading_crlf();
                Ok(Some(body))
            }
        }
    }

    fn skip_leading_crlf(&mut self) {
        let mut skip = 0;
        while self.buf.get(skip).is_some_and(|b| *b == b'\r' || *b == b'\n') {
            skip += 1;
        }
        if skip > 0 {
            self.buf.drain(..skip);
        }
    }
}

/// Synchronous frame-by-frame reader over any [`std::io::Read`] source.
///
/// Mirrors the incremental-buffer, never-drop-a-partial-frame shape used
/// elsewhere in this codebase for line-oriented readers, adapted to
/// length-prefixed frames.
pub struct FrameReader<R: Read> {
    reader: R,
    chunk: [u8; CHUNK_SIZE_BYTES],
    accumulator: FrameAccumulator,
    eof: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        FrameReader {
            reader,
            chunk: [0u8; CHUNK_SIZE_BYTES],
            accumulator: FrameAccumulator::default(),
            eof: false,
        }
    }

    /// Reads and decodes the next frame, blocking on the underlying reader
    /// as needed. Returns `Ok(None)` on clean end-of-input.
    pub fn read_frame(&mut self) -> Result<Option<Envelope>, ProtocolError> {
        loop {
            if let Some(envelope) = self.accumulator.pop_frame()? {
                return Ok(Some(envelope));
            }
            if self.eof {
                return Ok(None);
            }
            let n = self.reader.read(&mut self.chunk)?;
            if n == 0 {
                self.eof = true;
                continue;
            }
            self.accumulator.feed(&self.chunk[..n]);
        }
    }
}

#[cfg(feature = "tokio")]
pub mod tokio_io {
    use super::*;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

    /// Async counterpart to [`super::FrameReader`], driven over any
    /// `tokio::io::AsyncRead` (in production, a child process's stdout).
    pub struct AsyncFrameReader<R: AsyncRead + Unpin> {
        reader: R,
        chunk: Box<[u8; CHUNK_SIZE_BYTES]>,
        accumulator: FrameAccumulator,
        eof: bool,
    }

    impl<R: AsyncRead + Unpin> AsyncFrameReader<R> {
        pub fn new(reader: R) -> Self {
            AsyncFrameReader {
                reader,
                chunk: Box::new([0u8; CHUNK_SIZE_BYTES]),
                accumulator: FrameAccumulator::default(),
                eof: false,
            }
        }

        pub async fn read_frame(&mut self) -> Result<Option<Envelope>, ProtocolError> {
            loop {
                if let Some(envelope) = self.accumulator.pop_frame()? {
                    return Ok(Some(envelope));
                }
                if self.eof {
                    return Ok(None);
                }
                let n = self.reader.read(&mut self.chunk[..]).await?;
                if n == 0 {
                    self.eof = true;
                    continue;
                }
                self.accumulator.feed(&self.chunk[..n]);
            }
        }

        /// Reads the next frame's raw body without decoding it into an
        /// [`Envelope`]. `InvalidHeaders` and I/O errors are still fatal to
        /// the stream; envelope decoding (which can fail per-request, e.g.
        /// `UNKNOWN_COMMAND`) is left to the caller.
        pub async fn read_frame_body(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
            loop {
                if let Some(body) = self.accumulator.pop_frame_bytes()? {
                    return Ok(Some(body));
                }
                if self.eof {
                    return Ok(None);
                }
                let n = self.reader.read(&mut self.chunk[..]).await?;
                if n == 0 {
                    self.eof = true;
                    continue;
                }
                self.accumulator.feed(&self.chunk[..n]);
            }
        }
    }

    /// Writes a single encoded frame to an `AsyncWrite` sink and flushes it.
    pub async fn write_frame<W: AsyncWrite + Unpin>(
        writer: &mut W,
        envelope: &Envelope,
    ) -> Result<(), ProtocolError> {
        let bytes = encode_frame(envelope)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}
