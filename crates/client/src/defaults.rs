//! Centralized environment-variable names and defaults for the client,
//! matching the single-namespace convention this workspace uses for its
//! other process wrappers.

use std::time::Duration;

pub const HOST_PATH_ENV: &str = "FMT_BRIDGE_HOST_PATH";
pub const HOST_CACHE_ENV: &str = "FMT_BRIDGE_HOST_CACHE";
pub const HANDSHAKE_TIMEOUT_MS_ENV: &str = "FMT_BRIDGE_HANDSHAKE_TIMEOUT_MS";
pub const REQUEST_TIMEOUT_MS_ENV: &str = "FMT_BRIDGE_REQUEST_TIMEOUT_MS";
pub const HOST_RETRIES_ENV: &str = "FMT_BRIDGE_HOST_RETRIES";
pub const LOG_LEVEL_ENV: &str = "FMT_BRIDGE_LOG_LEVEL";
pub const TELEMETRY_FILE_ENV: &str = "FMT_BRIDGE_TELEMETRY_FILE";
pub const STRICT_HOST_ENV: &str = "FMT_BRIDGE_STRICT_HOST";
pub const MEMORY_BUDGET_ENV: &str = "FMT_BRIDGE_HOST_MEMORY_BUDGET_MB";

pub const DEFAULT_MEMORY_BUDGET_MB: f64 = 512.0;
/// Fraction of the budget that, sustained over three consecutive
/// responses, triggers the one-shot memory-pressure advisory (§4.5).
pub const MEMORY_PRESSURE_RATIO: f64 = 0.85;
pub const MEMORY_PRESSURE_STREAK: u32 = 3;
pub const MEMORY_GUARD_STREAK: u32 = 3;

pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 8_000;
pub const DEFAULT_HOST_RETRIES: u32 = 2;
pub const MIN_HOST_RETRIES: u32 = 1;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Extra slack added on top of request + handshake timeouts before the
/// caller's blocking wait on the shared buffer gives up (§4.5 step 3c).
pub const CALLER_WAIT_SLACK: Duration = Duration::from_secs(1);

pub fn handshake_timeout() -> Duration {
    Duration::from_millis(duration_env_ms(HANDSHAKE_TIMEOUT_MS_ENV, DEFAULT_HANDSHAKE_TIMEOUT_MS))
}

pub fn request_timeout() -> Duration {
    Duration::from_millis(duration_env_ms(REQUEST_TIMEOUT_MS_ENV, DEFAULT_REQUEST_TIMEOUT_MS))
}

pub fn host_retries() -> u32 {
    std::env::var(HOST_RETRIES_ENV)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .map(|v| v.max(MIN_HOST_RETRIES))
        .unwrap_or(DEFAULT_HOST_RETRIES)
}

pub fn strict_host() -> bool {
    std::env::var(STRICT_HOST_ENV).ok().as_deref() == Some("1")
}

pub fn telemetry_file() -> Option<std::path::PathBuf> {
    std::env::var(TELEMETRY_FILE_ENV).ok().map(std::path::PathBuf::from)
}

pub fn host_path_override() -> Option<std::path::PathBuf> {
    std::env::var(HOST_PATH_ENV).ok().map(std::path::PathBuf::from)
}

pub fn host_cache_dir() -> Option<std::path::PathBuf> {
    std::env::var(HOST_CACHE_ENV).ok().map(std::path::PathBuf::from)
}

pub fn default_log_level_value() -> String {
    std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
}

pub fn memory_budget_mb() -> f64 {
    std::env::var(MEMORY_BUDGET_ENV)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .unwrap_or(DEFAULT_MEMORY_BUDGET_MB)
}

fn duration_env_ms(name: &str, default_ms: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default_ms)
}
