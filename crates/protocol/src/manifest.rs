//! Binary distribution manifest shape (§6). The core only consumes this
//! format (to resolve a host executable); it is produced by packaging
//! tooling outside this workspace.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Canonical platform keys used by the manifest.
pub const PLATFORM_KEYS: &[&str] = &["linux-x64", "linux-arm64", "osx-x64", "osx-arm64", "win-x64"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryEntry {
    pub path: String,
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryManifest {
    pub version: String,
    pub binaries: HashMap<String, BinaryEntry>,
}

impl BinaryManifest {
    pub fn entry_for(&self, platform_key: &str) -> Option<&BinaryEntry> {
        self.binaries.get(platform_key)
    }
}

/// Best-effort canonical platform key for the machine this process runs on.
/// Returns `None` for targets the manifest format has no key for.
pub fn current_platform_key() -> Option<&'static str> {
    match (std::env::consts::OS, std::env::consts::ARCH) {
        ("linux", "x86_64") => Some("linux-x64"),
        ("linux", "aarch64") => Some("linux-arm64"),
        ("macos", "x86_64") => Some("osx-x64"),
        ("macos", "aarch64") => Some("osx-arm64"),
        ("windows", "x86_64") => Some("win-x64"),
        _ => None,
    }
}
