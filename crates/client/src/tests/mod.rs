use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::oneshot;

use fmt_protocol::envelope::{Command as WireCommand, Envelope};

use crate::shared_buffer::{SharedResponseBuffer, STATUS_ERROR, STATUS_OK};
use crate::transport::{handle_incoming, PendingEntry, PendingResolver, PendingTable};

fn empty_pending() -> PendingTable {
    Arc::new(std::sync::Mutex::new(HashMap::new()))
}

#[tokio::test]
async fn response_resolves_matching_oneshot_pending_entry() {
    let pending = empty_pending();
    let (tx, rx) = oneshot::channel();
    pending.lock().unwrap().insert(
        "r1".to_string(),
        PendingEntry {
            resolver: PendingResolver::Oneshot(tx),
        },
    );
    let valid = Arc::new(AtomicBool::new(true));

    let response = Envelope::response("r1", WireCommand::Ping, json!({"ok": true}));
    handle_incoming(response, &pending, &valid);

    let resolved = rx.await.unwrap().unwrap();
    assert_eq!(resolved.request_id.as_deref(), Some("r1"));
    assert!(pending.lock().unwrap().is_empty());
}

#[tokio::test]
async fn fatal_error_notification_rejects_all_pending_and_invalidates() {
    let pending = empty_pending();
    let (tx, rx) = oneshot::channel();
    pending.lock().unwrap().insert(
        "r1".to_string(),
        PendingEntry {
            resolver: PendingResolver::Oneshot(tx),
        },
    );
    let valid = Arc::new(AtomicBool::new(true));

    let notification = Envelope::notification(
        WireCommand::Error,
        json!({"severity": "fatal", "message": "host crashed"}),
    );
    handle_incoming(notification, &pending, &valid);

    assert!(rx.await.unwrap().is_err());
    assert!(!valid.load(Ordering::Acquire));
}

#[tokio::test]
async fn recoverable_error_notification_does_not_invalidate() {
    let pending = empty_pending();
    let valid = Arc::new(AtomicBool::new(true));

    let notification = Envelope::notification(
        WireCommand::Error,
        json!({"severity": "recoverable", "message": "transient hiccup"}),
    );
    handle_incoming(notification, &pending, &valid);

    assert!(valid.load(Ordering::Acquire));
}

#[tokio::test]
async fn format_response_is_delivered_into_shared_buffer() {
    let pending = empty_pending();
    let buffer = Arc::new(SharedResponseBuffer::for_source_len(16));
    pending.lock().unwrap().insert(
        "r1".to_string(),
        PendingEntry {
            resolver: PendingResolver::SharedBuffer(buffer.clone()),
        },
    );
    let valid = Arc::new(AtomicBool::new(true));

    let response = Envelope::response(
        "r1",
        WireCommand::Format,
        json!({"ok": true, "formatted": "fn x() {}\n", "diagnostics": []}),
    );
    handle_incoming(response, &pending, &valid);

    let (status, bytes) = buffer.wait_blocking(std::time::Duration::from_secs(1)).unwrap();
    assert_eq!(status, STATUS_OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.contains("fn x() {}"));
}

#[tokio::test]
async fn format_error_response_is_delivered_as_error_status() {
    let pending = empty_pending();
    let buffer = Arc::new(SharedResponseBuffer::for_source_len(16));
    pending.lock().unwrap().insert(
        "r1".to_string(),
        PendingEntry {
            resolver: PendingResolver::SharedBuffer(buffer.clone()),
        },
    );
    let valid = Arc::new(AtomicBool::new(true));

    let response = Envelope::response(
        "r1",
        WireCommand::Format,
        json!({"ok": false, "errorCode": "INVALID_JSON", "message": "bad body"}),
    );
    handle_incoming(response, &pending, &valid);

    let (status, _bytes) = buffer.wait_blocking(std::time::Duration::from_secs(1)).unwrap();
    assert_eq!(status, STATUS_ERROR);
}
