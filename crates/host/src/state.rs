use std::time::Instant;

/// `(uptimeStopwatch, hostVersion, activeRequestCount)` from the data
/// model. The host loop is single-threaded, so `active_request_count` is
/// always `0` or `1`; it exists for the `ping` response contract and to
/// make the invariant explicit rather than implicit.
pub struct HostState {
    started_at: Instant,
    pub host_version: String,
    pub active_request_count: u32,
    pub current_session_id: Option<String>,
}

impl HostState {
    pub fn new(host_version: impl Into<String>) -> Self {
        HostState {
            started_at: Instant::now(),
            host_version: host_version.into(),
            active_request_count: 0,
            current_session_id: None,
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Records the session id accompanying a `format` request. A change in
    /// session id means the client (re)spawned this host; there is no
    /// persistent cache for the new session to invalidate, but callers that
    /// later add one should key it off this transition.
    pub fn observe_session(&mut self, session_id: &str) {
        if self.current_session_id.as_deref() != Some(session_id) {
            self.current_session_id = Some(session_id.to_string());
        }
    }
}
