use fmt_protocol::envelope::{Command, Envelope};
use fmt_protocol::payload::{
    EndOfLine, FormatRequest, FormatResponse, FormattingOptions, InitializeOptions,
    InitializeRequest, InitializeResponse, PingRequest, PingResponse, Range,
};

use fmt_protocol::error::ProtocolError;

use crate::dispatch::{decode_error_notification, decode_error_response, dispatch};
use crate::formatter::PassthroughFormatter;
use crate::postprocess::{normalize_line_endings, todo_diagnostics};
use crate::state::HostState;

fn request(id: &str, command: Command, payload: serde_json::Value) -> Envelope {
    Envelope::request(id, command, payload)
}

#[test]
fn initialize_replies_with_capabilities_and_log_notification() {
    let mut state = HostState::new("1.0.0-test");
    let formatter = PassthroughFormatter;

    let req = InitializeRequest {
        client_version: "0.1.0".into(),
        host_binary_version: "1.0.0".into(),
        platform: "linux-x64".into(),
        options: InitializeOptions {
            roslyn_language_version: None,
            msbuild_sdks_path: None,
        },
    };
    let envelope = request("r1", Command::Initialize, serde_json::to_value(req).unwrap());

    let outcome = dispatch(envelope, &mut state, &formatter).unwrap();
    let response: InitializeResponse = serde_json::from_value(outcome.response.payload).unwrap();

    assert!(response.ok);
    assert_eq!(response.host_version.as_deref(), Some("1.0.0-test"));
    assert!(response.capabilities.unwrap().supports_range_formatting);
    assert_eq!(outcome.notifications.len(), 1);
    assert_eq!(outcome.notifications[0].command, Command::Log);
}

#[test]
fn format_reports_todo_diagnostic_and_trailing_newline() {
    let mut state = HostState::new("1.0.0-test");
    let formatter = PassthroughFormatter;

    let req = FormatRequest {
        file_path: None,
        content: "class Foo { // TODO fix }".to_string(),
        range: None,
        options: FormattingOptions::default(),
        session_id: "session-1".to_string(),
        trace_token: None,
    };
    let envelope = request("r2", Command::Format, serde_json::to_value(req).unwrap());

    let outcome = dispatch(envelope, &mut state, &formatter).unwrap();
    let response: FormatResponse = serde_json::from_value(outcome.response.payload).unwrap();

    assert!(response.ok);
    let formatted = response.formatted.unwrap();
    assert!(formatted.ends_with('\n'));
    assert!(!formatted.ends_with("\n\n"));

    let diagnostics = response.diagnostics.unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].start, Some(15));
    assert_eq!(diagnostics[0].end, Some(19));
    assert_eq!(diagnostics[0].message, "TODO comment detected.");
}

#[test]
fn format_with_range_leaves_untouched_prefix_character_for_character() {
    let mut state = HostState::new("1.0.0-test");
    let formatter = PassthroughFormatter;

    let content = "fn first() {}\nfn second(  ) {}\n";
    let second_start = content.find("fn second").unwrap();
    let req = FormatRequest {
        file_path: None,
        content: content.to_string(),
        range: Some(Range {
            start: second_start,
            end: content.len(),
        }),
        options: FormattingOptions::default(),
        session_id: "session-1".to_string(),
        trace_token: None,
    };
    let envelope = request("r3", Command::Format, serde_json::to_value(req).unwrap());

    let outcome = dispatch(envelope, &mut state, &formatter).unwrap();
    let response: FormatResponse = serde_json::from_value(outcome.response.payload).unwrap();
    let formatted = response.formatted.unwrap();

    assert!(formatted.starts_with("fn first() {}\n"));
}

#[test]
fn format_converts_to_crlf_with_single_trailing_terminator() {
    let mut state = HostState::new("1.0.0-test");
    let formatter = PassthroughFormatter;

    let mut options = FormattingOptions::default();
    options.end_of_line = EndOfLine::Crlf;
    let req = FormatRequest {
        file_path: None,
        content: "a\r\nb\nc".to_string(),
        range: None,
        options,
        session_id: "session-1".to_string(),
        trace_token: None,
    };
    let envelope = request("r4", Command::Format, serde_json::to_value(req).unwrap());

    let outcome = dispatch(envelope, &mut state, &formatter).unwrap();
    let response: FormatResponse = serde_json::from_value(outcome.response.payload).unwrap();
    let formatted = response.formatted.unwrap();

    assert!(formatted.ends_with("\r\n"));
    assert!(!formatted.ends_with("\r\n\r\n"));
    assert_eq!(formatted.matches('\n').count(), formatted.matches("\r\n").count());
}

#[test]
fn ping_uptime_is_monotonic_across_calls() {
    let mut state = HostState::new("1.0.0-test");
    let formatter = PassthroughFormatter;

    let first = dispatch(
        request("p1", Command::Ping, serde_json::to_value(PingRequest::default()).unwrap()),
        &mut state,
        &formatter,
    )
    .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(60));
    let second = dispatch(
        request("p2", Command::Ping, serde_json::to_value(PingRequest::default()).unwrap()),
        &mut state,
        &formatter,
    )
    .unwrap();

    let r1: PingResponse = serde_json::from_value(first.response.payload).unwrap();
    let r2: PingResponse = serde_json::from_value(second.response.payload).unwrap();

    assert!(r2.uptime_ms >= r1.uptime_ms);
    assert!(r2.uptime_ms - r1.uptime_ms >= 40);
}

#[test]
fn normalize_line_endings_unifies_mixed_input() {
    let out = normalize_line_endings("a\r\nb\nc\r\n", EndOfLine::Lf);
    assert_eq!(out, "a\nb\nc\n");
}

#[test]
fn todo_diagnostics_finds_every_occurrence() {
    let diags = todo_diagnostics("TODO one, TODO two");
    assert_eq!(diags.len(), 2);
}

#[test]
fn decode_error_response_ties_the_failure_to_the_recovered_request_id() {
    let outcome = decode_error_response(
        "r1".to_string(),
        &ProtocolError::UnknownCommand("reformat".to_string()),
    );
    assert_eq!(outcome.response.request_id.as_deref(), Some("r1"));
    let response: FormatResponse = serde_json::from_value(outcome.response.payload).unwrap();
    assert!(!response.ok);
    assert_eq!(response.error_code.as_deref(), Some("UNKNOWN_COMMAND"));
}

#[test]
fn decode_error_notification_carries_no_request_id() {
    let notification = decode_error_notification(&ProtocolError::InvalidHeaders);
    assert!(notification.request_id.is_none());
}
