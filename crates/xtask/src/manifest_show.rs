//! Manifest-consuming helper (§6): resolves and prints the binary entry
//! for this platform from a packaging manifest, without installing or
//! verifying anything. Useful for diagnosing a failed host resolution.

use std::path::PathBuf;

use clap::Args;
use fmt_protocol::BinaryManifest;

use crate::error::XtaskError;

#[derive(Debug, Args)]
pub struct ManifestShowArgs {
    /// Directory containing `manifest.json`.
    #[arg(long)]
    pub cache_dir: PathBuf,
}

pub fn run(args: ManifestShowArgs) -> Result<(), XtaskError> {
    let manifest_path = args.cache_dir.join("manifest.json");
    let text = std::fs::read_to_string(&manifest_path).map_err(|source| XtaskError::ManifestRead {
        path: manifest_path.clone(),
        source,
    })?;
    let manifest: BinaryManifest =
        serde_json::from_str(&text).map_err(|source| XtaskError::ManifestParse {
            path: manifest_path,
            source,
        })?;

    let platform_key = fmt_protocol::current_platform_key().ok_or(XtaskError::UnknownPlatform)?;
    let entry = manifest
        .entry_for(platform_key)
        .ok_or_else(|| XtaskError::NoEntryForPlatform(platform_key.to_string()))?;

    println!("manifest version: {}", manifest.version);
    println!("platform:         {platform_key}");
    println!("path:             {}", entry.path);
    println!("sha256:           {}", entry.sha256);
    println!("size:             {} bytes", entry.size);
    Ok(())
}
