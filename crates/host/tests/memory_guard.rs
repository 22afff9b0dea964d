use fmt_host::defaults;
use fmt_host::dispatch::dispatch;
use fmt_host::formatter::PassthroughFormatter;
use fmt_host::state::HostState;
use fmt_protocol::envelope::{Command, Envelope};
use fmt_protocol::payload::{FormatRequest, FormatResponse, FormattingOptions};

/// With the budget pinned absurdly low, any process's real working set
/// exceeds it, so the format handler must take the memory-guard path:
/// `ok:false`, `MEMORY_BUDGET_EXCEEDED`, and a fatal `error` notification.
#[test]
fn tiny_budget_trips_the_memory_guard() {
    std::env::set_var(defaults::MEMORY_BUDGET_ENV, "0.001");

    let mut state = HostState::new("1.0.0-test");
    let formatter = PassthroughFormatter;
    let req = FormatRequest {
        file_path: None,
        content: "fn x() {}".to_string(),
        range: None,
        options: FormattingOptions::default(),
        session_id: "session-guard".to_string(),
        trace_token: None,
    };
    let envelope = Envelope::request("g1", Command::Format, serde_json::to_value(req).unwrap());

    let outcome = dispatch(envelope, &mut state, &formatter).unwrap();
    let response: FormatResponse = serde_json::from_value(outcome.response.payload).unwrap();

    assert!(!response.ok);
    assert_eq!(response.error_code.as_deref(), Some("MEMORY_BUDGET_EXCEEDED"));
    assert_eq!(outcome.notifications.len(), 1);
    assert_eq!(outcome.notifications[0].command, Command::Error);

    std::env::remove_var(defaults::MEMORY_BUDGET_ENV);
}
