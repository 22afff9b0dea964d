//! Client facade (C5): the caller-visible `format` operation. Normalizes
//! options/ranges, sizes the shared buffer, retries across host restarts,
//! records telemetry, and degrades to identity output unless strict mode
//! is set (§4.5).

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use fmt_protocol::envelope::Command as WireCommand;
use fmt_protocol::payload::{
    BufferedResult, Diagnostic, FormatMetrics, FormatRequest, FormattingOptions,
    InitializeOptions, InitializeRequest, InitializeResponse, Range,
};

use crate::builder::FormatterClientBuilder;
use crate::defaults;
use crate::error::ClientError;
use crate::shared_buffer::{SharedResponseBuffer, STATUS_OK};
use crate::telemetry::{self, TelemetryRecord};
use crate::transport::Worker;

pub struct FormatterClient {
    client_version: String,
    strict: bool,
    host_retries: u32,
    worker: AsyncMutex<Option<Worker>>,
    session_counter: AtomicU64,
    pressure_hits: AtomicU32,
    guard_hits: AtomicU32,
    pressure_warned: AtomicBool,
    guard_warned: AtomicBool,
    fallback_warned: AtomicBool,
}

/// Result of one successful `format` round-trip, carried far enough out of
/// [`FormatterClient::try_format_once`] to populate telemetry with the
/// metrics the host actually reported.
struct FormatAttempt {
    formatted: String,
    diagnostic_count: usize,
    metrics: Option<FormatMetrics>,
}

impl FormatterClient {
    pub fn builder() -> FormatterClientBuilder {
        FormatterClientBuilder::new()
    }

    pub fn new() -> Self {
        Self::builder().build()
    }

    pub(crate) fn from_builder(client_version: String, strict: bool, host_retries: u32) -> Self {
        FormatterClient {
            client_version,
            strict,
            host_retries,
            worker: AsyncMutex::new(None),
            session_counter: AtomicU64::new(0),
            pressure_hits: AtomicU32::new(0),
            guard_hits: AtomicU32::new(0),
            pressure_warned: AtomicBool::new(false),
            guard_warned: AtomicBool::new(false),
            fallback_warned: AtomicBool::new(false),
        }
    }

    /// Formats `text`, falling back to it unchanged on terminal failure
    /// unless strict mode is enabled (§4.5 step 5).
    pub async fn format(
        &self,
        text: &str,
        options: FormattingOptions,
        range: Option<Range>,
    ) -> Result<String, ClientError> {
        let normalized_options = normalize_options(&options);
        let normalized_range = normalize_range(range, text.len());

        let mut last_err = None;
        for attempt in 0..self.host_retries {
            match self
                .try_format_once(text, &normalized_options, normalized_range)
                .await
            {
                Ok(result) => {
                    self.record_telemetry(
                        true,
                        &normalized_options,
                        normalized_range,
                        None,
                        None,
                        result.diagnostic_count,
                        result.metrics.as_ref(),
                    );
                    return Ok(result.formatted);
                }
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "format attempt failed, will retry");
                    self.invalidate_worker().await;
                    last_err = Some(err);
                }
            }
        }

        let err = last_err.expect("loop runs at least once since host_retries >= 1");
        self.record_telemetry(
            false,
            &normalized_options,
            normalized_range,
            Some(err.to_string()),
            error_code_of(&err),
            0,
            None,
        );

        if self.strict {
            Err(err)
        } else {
            self.warn_identity_fallback_once(&err);
            Ok(text.to_string())
        }
    }

    async fn try_format_once(
        &self,
        text: &str,
        options: &FormattingOptions,
        range: Option<Range>,
    ) -> Result<FormatAttempt, ClientError> {
        self.ensure_worker().await?;

        let guard = self.worker.lock().await;
        let worker = guard.as_ref().ok_or(ClientError::TransportUnavailable)?;

        let request = FormatRequest {
            file_path: None,
            content: text.to_string(),
            range,
            options: options.clone(),
            session_id: worker.session_id.clone(),
            trace_token: None,
        };
        let payload = serde_json::to_value(&request).expect("FormatRequest serializes");

        let buffer = Arc::new(SharedResponseBuffer::for_source_len(text.len()));
        worker.post_format(payload, buffer.clone())?;

        let timeout = defaults::request_timeout()
            + defaults::handshake_timeout()
            + defaults::CALLER_WAIT_SLACK;
        drop(guard);

        let wait_result = tokio::task::spawn_blocking(move || buffer.wait_blocking(timeout))
            .await
            .map_err(|_| ClientError::TransportUnavailable)?;

        let (status, bytes) = wait_result.ok_or(ClientError::RequestTimeout {
            command: WireCommand::Format.as_str(),
            timeout,
        })?;

        let result: BufferedResult = serde_json::from_slice(&bytes).map_err(|err| {
            ClientError::HostError {
                code: "INTERNAL_ERROR".to_string(),
                message: format!("malformed buffered result: {err}"),
            }
        })?;

        match result {
            BufferedResult::Ok {
                formatted,
                diagnostics,
                metrics,
            } if status == STATUS_OK => {
                let diagnostics = diagnostics.unwrap_or_default();
                self.log_diagnostics(&diagnostics);
                self.observe_memory_pressure(metrics.as_ref().and_then(|m| m.working_set_mb));
                Ok(FormatAttempt {
                    formatted,
                    diagnostic_count: diagnostics.len(),
                    metrics,
                })
            }
            BufferedResult::Ok { .. } => Err(ClientError::HostError {
                code: "INTERNAL_ERROR".to_string(),
                message: "buffer reported ok status with an error payload".to_string(),
            }),
            BufferedResult::Error { message, error_code } => {
                if error_code.as_deref() == Some("MEMORY_BUDGET_EXCEEDED") {
                    self.observe_guard_hit();
                }
                Err(ClientError::HostError {
                    code: error_code.unwrap_or_else(|| "INTERNAL_ERROR".to_string()),
                    message: message.unwrap_or_else(|| "host reported an error".to_string()),
                })
            }
        }
    }

    async fn ensure_worker(&self) -> Result<(), ClientError> {
        let needs_spawn = {
            let guard = self.worker.lock().await;
            !matches!(&*guard, Some(worker) if worker.valid())
        };

        if needs_spawn {
            let session_id = format!(
                "session-{}",
                self.session_counter.fetch_add(1, Ordering::Relaxed)
            );
            let worker = Worker::spawn(session_id).await?;
            self.perform_handshake(&worker).await?;

            let mut guard = self.worker.lock().await;
            *guard = Some(worker);
        } else {
            let guard = self.worker.lock().await;
            if let Some(worker) = guard.as_ref() {
                if !worker.is_initialized() {
                    self.perform_handshake(worker).await?;
                }
            }
        }
        Ok(())
    }

    async fn perform_handshake(&self, worker: &Worker) -> Result<(), ClientError> {
        let request = InitializeRequest {
            client_version: self.client_version.clone(),
            host_binary_version: self.client_version.clone(),
            platform: fmt_protocol::current_platform_key().unwrap_or("unknown").to_string(),
            options: InitializeOptions {
                roslyn_language_version: None,
                msbuild_sdks_path: None,
            },
        };
        let payload = serde_json::to_value(&request).expect("InitializeRequest serializes");
        let response_envelope = worker.initialize(payload).await?;
        let response: InitializeResponse = serde_json::from_value(response_envelope.payload)
            .map_err(|_| ClientError::HostError {
                code: "INVALID_MESSAGE".to_string(),
                message: "malformed initialize response".to_string(),
            })?;
        if !response.ok {
            return Err(ClientError::HostError {
                code: "INTERNAL_ERROR".to_string(),
                message: response.reason.unwrap_or_else(|| "initialize failed".to_string()),
            });
        }
        worker.mark_initialized();
        Ok(())
    }

    async fn invalidate_worker(&self) {
        let mut guard = self.worker.lock().await;
        if let Some(worker) = guard.take() {
            worker.shutdown().await;
        }
    }

    fn log_diagnostics(&self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            tracing::debug!(
                severity = ?diagnostic.severity,
                start = ?diagnostic.start,
                end = ?diagnostic.end,
                "{}",
                diagnostic.message
            );
        }
    }

    fn observe_memory_pressure(&self, working_set_mb: Option<f64>) {
        let Some(working_set_mb) = working_set_mb else {
            return;
        };
        let budget = defaults::memory_budget_mb();
        if working_set_mb >= defaults::MEMORY_PRESSURE_RATIO * budget {
            let hits = self.pressure_hits.fetch_add(1, Ordering::Relaxed) + 1;
            if hits >= defaults::MEMORY_PRESSURE_STREAK
                && !self.pressure_warned.swap(true, Ordering::Relaxed)
            {
                tracing::warn!(
                    working_set_mb,
                    budget_mb = budget,
                    "host working set has stayed near budget for {} consecutive responses; consider raising FMT_BRIDGE_HOST_MEMORY_BUDGET_MB",
                    defaults::MEMORY_PRESSURE_STREAK
                );
            }
        } else {
            self.pressure_hits.store(0, Ordering::Relaxed);
        }
    }

    fn observe_guard_hit(&self) {
        let hits = self.guard_hits.fetch_add(1, Ordering::Relaxed) + 1;
        if hits >= defaults::MEMORY_GUARD_STREAK && !self.guard_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "memory budget has been exceeded {} times; review telemetry for a pattern",
                defaults::MEMORY_GUARD_STREAK
            );
        }
    }

    fn warn_identity_fallback_once(&self, err: &ClientError) {
        if !self.fallback_warned.swap(true, Ordering::Relaxed) {
            tracing::warn!(error = %err, "formatting failed; returning input unchanged (identity fallback)");
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record_telemetry(
        &self,
        success: bool,
        options: &FormattingOptions,
        range: Option<Range>,
        error: Option<String>,
        error_code: Option<String>,
        diagnostic_count: usize,
        metrics: Option<&FormatMetrics>,
    ) {
        telemetry::record(&TelemetryRecord {
            timestamp: telemetry::unix_timestamp_ms(),
            success,
            elapsed_ms: metrics.map(|m| m.elapsed_ms).unwrap_or(0),
            diagnostics: diagnostic_count as u32,
            error,
            options: options.clone(),
            range,
            managed_memory_mb: metrics.and_then(|m| m.managed_memory_mb),
            working_set_mb: metrics.and_then(|m| m.working_set_mb),
            working_set_delta_mb: metrics.and_then(|m| m.working_set_delta_mb),
            error_code,
            memory_budget_mb: Some(serde_json::json!(defaults::memory_budget_mb())),
        });
    }
}

impl Default for FormatterClient {
    fn default() -> Self {
        Self::new()
    }
}

fn error_code_of(err: &ClientError) -> Option<String> {
    match err {
        ClientError::HostError { code, .. } => Some(code.clone()),
        _ => None,
    }
}

/// Normalizes caller-supplied options (§4.5 step 1): width floors at 40
/// with an 80-column default, tab width floors at 1, end-of-line defaults
/// to `lf`, `useTabs` is carried through as-is.
fn normalize_options(options: &FormattingOptions) -> FormattingOptions {
    FormattingOptions {
        print_width: options.print_width.max(40),
        tab_width: options.tab_width.max(1),
        use_tabs: options.use_tabs,
        end_of_line: options.end_of_line,
    }
}

/// Normalizes the caller-supplied range (§4.5 step 2): `None` if it covers
/// the whole document, otherwise clamped into `[0, text_len]` with
/// `end > start`.
fn normalize_range(range: Option<Range>, text_len: usize) -> Option<Range> {
    let range = range?;
    if range.start == 0 && range.end >= text_len {
        return None;
    }
    let start = range.start.min(text_len);
    let end = range.end.min(text_len);
    if end <= start {
        return None;
    }
    Some(Range { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_options_floors_print_width_and_tab_width() {
        let options = FormattingOptions {
            print_width: 10,
            tab_width: 0,
            use_tabs: true,
            end_of_line: fmt_protocol::payload::EndOfLine::Crlf,
        };
        let normalized = normalize_options(&options);
        assert_eq!(normalized.print_width, 40);
        assert_eq!(normalized.tab_width, 1);
        assert!(normalized.use_tabs);
    }

    #[test]
    fn normalize_range_collapses_whole_document_to_none() {
        assert!(normalize_range(Some(Range { start: 0, end: 10 }), 10).is_none());
    }

    #[test]
    fn normalize_range_clamps_out_of_bounds_end() {
        let normalized = normalize_range(Some(Range { start: 2, end: 1000 }), 10).unwrap();
        assert_eq!(normalized.start, 2);
        assert_eq!(normalized.end, 10);
    }

    #[test]
    fn record_telemetry_carries_real_metrics_and_diagnostic_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        std::env::set_var(crate::defaults::TELEMETRY_FILE_ENV, &path);

        let client = FormatterClient::new();
        let metrics = FormatMetrics {
            elapsed_ms: 42,
            parse_diagnostics: 1,
            managed_memory_mb: Some(12.5),
            working_set_mb: Some(30.0),
            working_set_delta_mb: Some(5.0),
        };
        client.record_telemetry(
            true,
            &FormattingOptions::default(),
            None,
            None,
            None,
            1,
            Some(&metrics),
        );

        std::env::remove_var(crate::defaults::TELEMETRY_FILE_ENV);

        let written = std::fs::read_to_string(&path).unwrap();
        let record: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(record["diagnostics"].as_u64(), Some(1));
        assert_eq!(record["elapsedMs"].as_u64(), Some(42));
        assert_eq!(record["managedMemoryMb"].as_f64(), Some(12.5));
        assert_eq!(record["workingSetMb"].as_f64(), Some(30.0));
        assert_eq!(record["workingSetDeltaMb"].as_f64(), Some(5.0));
    }
}
