//! Host binary resolution (§4.5): explicit env override, then a
//! manifest-derived platform-specific path, then conventional build-output
//! locations. Every candidate must exist and be executable.
//!
//! This implementation always launches the resolved binary directly; there
//! is no managed-runtime host variant in this workspace, so the spec's
//! `.dll`-launched-via-runtime-command branch has no counterpart here.

use std::path::{Path, PathBuf};

use fmt_protocol::BinaryManifest;

use crate::defaults;
use crate::error::ClientError;

const CONVENTIONAL_CANDIDATES: &[&str] = &["target/release/fmt_host", "target/debug/fmt_host"];

pub fn resolve_host_binary() -> Result<PathBuf, ClientError> {
    let mut tried = Vec::new();

    if let Some(path) = defaults::host_path_override() {
        if is_executable(&path) {
            return Ok(path);
        }
        tried.push(path);
    }

    if let Some(path) = manifest_derived_path(&mut tried) {
        return Ok(path);
    }

    for candidate in CONVENTIONAL_CANDIDATES {
        let path = PathBuf::from(candidate);
        if is_executable(&path) {
            return Ok(path);
        }
        tried.push(path);
    }

    Err(ClientError::HostBinaryNotFound { tried })
}

fn manifest_derived_path(tried: &mut Vec<PathBuf>) -> Option<PathBuf> {
    let cache_dir = defaults::host_cache_dir()?;
    let manifest_path = cache_dir.join("manifest.json");
    let manifest_text = std::fs::read_to_string(&manifest_path).ok()?;
    let manifest: BinaryManifest = serde_json::from_str(&manifest_text).ok()?;
    let platform_key = fmt_protocol::current_platform_key()?;
    let entry = manifest.entry_for(platform_key)?;
    let candidate = cache_dir.join(&entry.path);

    if is_executable(&candidate) {
        Some(candidate)
    } else {
        tried.push(candidate);
        None
    }
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::metadata(path)
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}
