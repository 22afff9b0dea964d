//! The per-call "shared buffer" hand-off between the worker and the caller
//! (§3, §4.4, and the implementation note in §5.1).
//!
//! The source system hands results across OS threads through a literal
//! shared-memory region with `Atomics.wait`/`notify`. This crate's
//! `#![forbid(unsafe_code)]` rules that out; [`SharedResponseBuffer`]
//! reproduces the same single-writer/single-reader, release/acquire
//! hand-off using a `Mutex<Vec<u8>>` payload guarded by an `AtomicI32`
//! status, paired with a `Condvar` for the wait/notify step. Capacity
//! accounting and overflow behavior are exactly as specified; only the
//! underlying wait primitive differs from a raw memory region.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

pub const STATUS_PENDING: i32 = 0;
pub const STATUS_OK: i32 = 1;
pub const STATUS_ERROR: i32 = 2;

const MIN_CAPACITY_BYTES: usize = 64 * 1024;
const CAPACITY_SLACK_BYTES: usize = 4 * 1024;

/// Computes the buffer capacity formula from §3: `max(64 KiB, 2*len + 4 KiB)`.
pub fn capacity_for_source_len(source_utf8_len: usize) -> usize {
    (2 * source_utf8_len + CAPACITY_SLACK_BYTES).max(MIN_CAPACITY_BYTES)
}

pub struct SharedResponseBuffer {
    capacity: usize,
    status: AtomicI32,
    payload: Mutex<Vec<u8>>,
    signal: Condvar,
    signal_gate: Mutex<()>,
}

impl SharedResponseBuffer {
    pub fn new(capacity: usize) -> Self {
        SharedResponseBuffer {
            capacity,
            status: AtomicI32::new(STATUS_PENDING),
            payload: Mutex::new(Vec::new()),
            signal: Condvar::new(),
            signal_gate: Mutex::new(()),
        }
    }

    pub fn for_source_len(source_utf8_len: usize) -> Self {
        Self::new(capacity_for_source_len(source_utf8_len))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Writes the final result once, as the worker does on response
    /// arrival. If `bytes` exceeds `capacity`, substitutes the overflow
    /// error payload per §4.4 and forces `status = 2` regardless of the
    /// caller-supplied status.
    pub fn deliver(&self, status: i32, bytes: Vec<u8>) {
        let _gate = self.signal_gate.lock().unwrap();

        let (final_status, final_bytes) = if bytes.len() > self.capacity {
            (STATUS_ERROR, overflow_payload())
        } else {
            (status, bytes)
        };

        *self.payload.lock().unwrap() = final_bytes;
        self.status.store(final_status, Ordering::Release);
        self.signal.notify_all();
    }

    /// Blocks the calling thread until a result is delivered or `timeout`
    /// elapses. Returns `None` on timeout, matching the caller's bounded
    /// atomic wait described in §5.
    pub fn wait_blocking(&self, timeout: Duration) -> Option<(i32, Vec<u8>)> {
        let mut gate = self.signal_gate.lock().unwrap();
        let deadline = Instant::now() + timeout;

        loop {
            let status = self.status.load(Ordering::Acquire);
            if status != STATUS_PENDING {
                let payload = self.payload.lock().unwrap().clone();
                return Some((status, payload));
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (next_gate, _timeout_result) =
                self.signal.wait_timeout(gate, deadline - now).unwrap();
            gate = next_gate;
        }
    }
}

fn overflow_payload() -> Vec<u8> {
    serde_json::to_vec(&fmt_protocol::payload::BufferedResult::Error {
        message: Some("Host response exceeded buffer capacity.".to_string()),
        error_code: None,
    })
    .expect("BufferedResult always serializes")
}
