//! Append-only JSONL telemetry sink (§6), written once per `format` call
//! when `FMT_BRIDGE_TELEMETRY_FILE` is set.

use std::io::Write;

use serde::Serialize;
use serde_json::Value;

use fmt_protocol::payload::{FormattingOptions, Range};

use crate::defaults;

#[derive(Debug, Serialize)]
pub struct TelemetryRecord {
    pub timestamp: u64,
    pub success: bool,
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: u64,
    pub diagnostics: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub options: FormattingOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
    #[serde(rename = "managedMemoryMb", skip_serializing_if = "Option::is_none")]
    pub managed_memory_mb: Option<f64>,
    #[serde(rename = "workingSetMb", skip_serializing_if = "Option::is_none")]
    pub working_set_mb: Option<f64>,
    #[serde(rename = "workingSetDeltaMb", skip_serializing_if = "Option::is_none")]
    pub working_set_delta_mb: Option<f64>,
    #[serde(rename = "errorCode", skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(rename = "memoryBudgetMb", skip_serializing_if = "Option::is_none")]
    pub memory_budget_mb: Option<Value>,
}

/// Appends one telemetry line if a sink is configured. Failures to write
/// telemetry are logged, never propagated: telemetry must not affect the
/// caller-visible result of `format`.
pub fn record(entry: &TelemetryRecord) {
    let Some(path) = defaults::telemetry_file() else {
        return;
    };

    let line = match serde_json::to_string(entry) {
        Ok(line) => line,
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize telemetry record");
            return;
        }
    };

    let result = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut file| writeln!(file, "{line}"));

    if let Err(err) = result {
        tracing::warn!(error = %err, path = %path.display(), "failed to append telemetry record");
    }
}

pub fn unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
