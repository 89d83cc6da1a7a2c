//! Skip-if-unchanged gate.
//!
//! The last successfully built version is kept in a plain-text cache file.
//! Before a full build, the freshly resolved version is compared with it; a
//! match means the build would produce nothing new.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info};
use verstamp_schema::ResolvedVersion;

use crate::error::{Result, StampError};
use crate::rewrite::write_atomic;

/// The version recorded by the previous successful build.
#[derive(Debug)]
pub struct LastBuiltVersion;

impl LastBuiltVersion {
    /// Read the cached version, trimmed. A missing file is `None`.
    ///
    /// # Errors
    ///
    /// [`StampError::Io`] for any failure other than the file not existing.
    pub fn load(path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StampError::io(path, e)),
        }
    }

    /// Record `version` as the last built version, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// [`StampError::Io`] if the directory or file cannot be written.
    pub fn store(path: &Path, version: &ResolvedVersion) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StampError::io(parent, e))?;
        }
        write_atomic(path, format!("{version}\n").as_bytes())?;
        debug!(path = %path.display(), %version, "Recorded last built version");
        Ok(())
    }
}

/// Whether the build can stop because `version` was already built.
///
/// # Errors
///
/// [`StampError::ConfigurationError`] when no cache path is configured: the
/// gate is opt-in and must not silently pass when asked for. Read failures
/// other than a missing file are [`StampError::Io`].
pub fn should_abort_build(cache_file: Option<&Path>, version: &ResolvedVersion) -> Result<bool> {
    let cache_file = cache_file.ok_or_else(|| {
        StampError::config("the if-changed gate requires a cache file path (--cache-file)")
    })?;

    let Some(last) = LastBuiltVersion::load(cache_file)? else {
        info!(cache = %cache_file.display(), "No previously built version recorded");
        return Ok(false);
    };

    if last == version.as_str() {
        info!(%version, "Version not changed");
        Ok(true)
    } else {
        info!(from = %last, to = %version, "Version changed");
        Ok(false)
    }
}
