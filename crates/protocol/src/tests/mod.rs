use serde_json::json;

use crate::codec::{decode_envelope, encode_frame, scan_frame, FrameReader, ScanResult};
use crate::envelope::{Command, Envelope, EnvelopeType};
use crate::error::ProtocolError;

fn sample_envelope(request_id: &str) -> Envelope {
    Envelope::request(
        request_id,
        Command::Ping,
        json!({ "timestamp": 12345u64 }),
    )
}

#[test]
fn round_trip_preserves_envelope() {
    let original = sample_envelope("req-1");
    let bytes = encode_frame(&original).unwrap();

    let mut reader = FrameReader::new(std::io::Cursor::new(bytes));
    let decoded = reader.read_frame().unwrap().expect("one frame");

    assert_eq!(decoded.version, original.version);
    assert_eq!(decoded.envelope_type, EnvelopeType::Request);
    assert_eq!(decoded.request_id, original.request_id);
    assert_eq!(decoded.command, Command::Ping);
    assert_eq!(decoded.payload, original.payload);
}

#[test]
fn two_frames_in_one_buffer_decode_in_order() {
    let first = sample_envelope("a");
    let second = sample_envelope("b");
    let mut combined = encode_frame(&first).unwrap();
    combined.extend_from_slice(&encode_frame(&second).unwrap());

    let mut reader = FrameReader::new(std::io::Cursor::new(combined));
    let got_first = reader.read_frame().unwrap().unwrap();
    let got_second = reader.read_frame().unwrap().unwrap();
    let got_eof = reader.read_frame().unwrap();

    assert_eq!(got_first.request_id.as_deref(), Some("a"));
    assert_eq!(got_second.request_id.as_deref(), Some("b"));
    assert!(got_eof.is_none());
}

/// A reader that trickles bytes out a handful at a time, to exercise the
/// "single frame split across reads" partial-resilience property.
struct Trickle {
    data: Vec<u8>,
    pos: usize,
    step: usize,
}

impl std::io::Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pos >= self.data.len() {
            return Ok(0);
        }
        let n = self.step.min(buf.len()).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn frame_split_byte_by_byte_still_decodes() {
    let envelope = sample_envelope("trickle");
    let bytes = encode_frame(&envelope).unwrap();

    let mut reader = FrameReader::new(Trickle {
        data: bytes,
        pos: 0,
        step: 3,
    });

    let decoded = reader.read_frame().unwrap().expect("frame eventually completes");
    assert_eq!(decoded.request_id.as_deref(), Some("trickle"));
}

#[test]
fn trailing_partial_frame_is_retained_not_dropped() {
    let complete = sample_envelope("complete");
    let mut buf = encode_frame(&complete).unwrap();
    let dangling = encode_frame(&sample_envelope("dangling")).unwrap();
    buf.extend_from_slice(&dangling[..dangling.len() - 3]);

    let mut reader = FrameReader::new(std::io::Cursor::new(buf));
    let first = reader.read_frame().unwrap().unwrap();
    assert_eq!(first.request_id.as_deref(), Some("complete"));

    // The dangling frame is incomplete; read_frame must report clean EOF
    // rather than an error, and must not have discarded the partial bytes.
    let second = reader.read_frame().unwrap();
    assert!(second.is_none());
}

#[test]
fn non_integer_content_length_is_rejected_without_hanging() {
    let body = b"{}";
    let mut framed = Vec::new();
    framed.extend_from_slice(b"Content-Length: not-a-number\r\n\r\n");
    framed.extend_from_slice(body);

    match scan_frame(&framed) {
        ScanResult::InvalidHeaders { consumed } => {
            assert_eq!(consumed, framed.len() - body.len());
        }
        _ => panic!("expected InvalidHeaders"),
    }
}

#[test]
fn missing_content_length_is_rejected() {
    let framed = b"X-Other: 1\r\n\r\n{}".to_vec();
    match scan_frame(&framed) {
        ScanResult::InvalidHeaders { .. } => {}
        _ => panic!("expected InvalidHeaders"),
    }
}

#[test]
fn notification_cannot_carry_a_request_id() {
    let mut envelope = Envelope::notification(Command::Log, json!({"level": "info", "message": "hi"}));
    envelope.request_id = Some("oops".into());
    assert!(envelope.validate().is_err());
}

#[test]
fn request_must_carry_a_request_id() {
    let mut envelope = sample_envelope("req");
    envelope.request_id = None;
    assert!(envelope.validate().is_err());
}

#[test]
fn unrecognized_command_is_reported_distinctly_from_malformed_json() {
    let body = br#"{"version":1,"type":"request","requestId":"r1","command":"reformat","payload":{}}"#;
    match decode_envelope(body) {
        Err(ProtocolError::UnknownCommand(command)) => assert_eq!(command, "reformat"),
        other => panic!("expected UnknownCommand, got {other:?}"),
    }
}

#[test]
fn truncated_json_body_is_reported_as_invalid_json() {
    let body = br#"{"version":1,"type":"request""#;
    match decode_envelope(body) {
        Err(ProtocolError::InvalidJson(_)) => {}
        other => panic!("expected InvalidJson, got {other:?}"),
    }
}

#[test]
fn response_may_carry_the_error_command() {
    let envelope = Envelope::response("r1", Command::Error, json!({"ok": false}));
    assert!(envelope.validate().is_ok());
}

#[test]
fn request_may_not_carry_the_error_command() {
    let envelope = Envelope::request("r1", Command::Error, json!({}));
    assert!(envelope.validate().is_err());
}
