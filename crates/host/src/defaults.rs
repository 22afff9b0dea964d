//! Centralized environment-variable names and defaults for the host
//! process, following the one-module-owns-the-namespace convention used
//! throughout this workspace.

pub const MEMORY_BUDGET_ENV: &str = "FMT_BRIDGE_HOST_MEMORY_BUDGET_MB";
pub const LOG_LEVEL_ENV: &str = "FMT_BRIDGE_LOG_LEVEL";

pub const DEFAULT_MEMORY_BUDGET_MB: f64 = 512.0;
pub const DEFAULT_LOG_LEVEL: &str = "warn";

pub const MEMORY_GUARD_EXIT_CODE: i32 = 86;
/// Fraction of the budget that, if still exceeded after a forced
/// collection, trips the hard exit in step 8 of the format handler.
pub const POST_COLLECTION_GUARD_RATIO: f64 = 0.9;

pub fn memory_budget_mb() -> f64 {
    std::env::var(MEMORY_BUDGET_ENV)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .unwrap_or(DEFAULT_MEMORY_BUDGET_MB)
}

pub fn default_log_level_value() -> String {
    std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
}
