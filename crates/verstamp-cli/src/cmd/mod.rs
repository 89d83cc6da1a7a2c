//! Command modules - one file per CLI command

pub mod build;
pub mod completions;
pub mod if_changed;
pub mod sdist;
pub mod stamp;
pub mod version;

use std::path::Path;

use anyhow::Result;
use verstamp_core::should_abort_build;
use verstamp_schema::ResolvedVersion;

/// Run the if-changed gate for a build stage. Returns `true` when the stage
/// should be skipped.
fn gate_stops_build(version: &ResolvedVersion, cache_file: Option<&Path>) -> Result<bool> {
    if should_abort_build(cache_file, version)? {
        println!("Version {version} not changed. Build stopped, remove '--if-changed' to force.");
        return Ok(true);
    }
    Ok(false)
}
