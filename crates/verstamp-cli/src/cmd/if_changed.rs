//! If-changed command: the gate on its own, for pipelines that run their
//! own build steps afterwards.

use std::path::Path;

use anyhow::Result;
use verstamp_core::LastBuiltVersion;

use crate::Project;

/// Compare the resolved version against the recorded one and report.
///
/// Both outcomes succeed; only a missing cache path or an unreadable cache
/// file is an error.
pub fn if_changed(project: &Project, cache_file: Option<&Path>) -> Result<()> {
    let version = project.resolve()?;
    let cache_file = project.cache_file(cache_file);

    if super::gate_stops_build(&version, cache_file.as_deref())? {
        return Ok(());
    }

    let last = match cache_file.as_deref() {
        Some(path) => LastBuiltVersion::load(path)?,
        None => None,
    };
    match last {
        Some(last) => println!("Version changed: {last} -> {version}"),
        None => println!("No previous build recorded, version is {version}"),
    }
    Ok(())
}
