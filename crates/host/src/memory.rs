//! Working-set memory sampling for the memory guard (§4.3 step 8).
//!
//! There is no managed heap in this runtime, so `managedMemoryMb` simply
//! mirrors the working-set sample; the metric field is kept distinct from
//! `workingSetMb` so the wire contract matches systems that do distinguish
//! the two.

use crate::error::HostError;

#[derive(Debug, Clone, Copy, Default)]
pub struct MemorySample {
    pub working_set_mb: f64,
}

#[cfg(target_os = "linux")]
pub fn sample() -> Result<MemorySample, HostError> {
    let statm = std::fs::read_to_string("/proc/self/statm").map_err(HostError::MemorySample)?;
    let resident_pages = statm
        .split_whitespace()
        .nth(1)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let page_size = page_size_bytes();
    let working_set_mb = (resident_pages * page_size) as f64 / (1024.0 * 1024.0);
    Ok(MemorySample { working_set_mb })
}

#[cfg(target_os = "linux")]
fn page_size_bytes() -> u64 {
    // sysconf(_SC_PAGESIZE) without pulling in libc: 4096 holds on every
    // Linux target this host realistically runs on.
    4096
}

#[cfg(not(target_os = "linux"))]
pub fn sample() -> Result<MemorySample, HostError> {
    Ok(MemorySample::default())
}

/// Forces whatever best-effort collection is available before the
/// post-collection recheck in the memory guard. There is no tracing GC to
/// invoke here; this is a hook point kept distinct so the guard logic reads
/// the same regardless of allocator.
pub fn force_collection() {}
