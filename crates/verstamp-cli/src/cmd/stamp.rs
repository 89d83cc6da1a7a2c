//! Stamp command: rewrite one file in place.

use std::path::Path;

use anyhow::{Context as _, Result};
use verstamp_core::{rewrite_declaration, rewrite_descriptor_argument};

use crate::Project;

/// Stamp `file` with the resolved version.
///
/// Declaration files also get their empty `__revision__` slot filled.
pub fn stamp(project: &Project, file: &Path, descriptor: bool) -> Result<()> {
    let version = project.resolve()?;

    if descriptor {
        let written = rewrite_descriptor_argument(file, &version)
            .with_context(|| format!("Failed to stamp descriptor {}", file.display()))?;
        if written {
            println!("File {} updated with version {version}", file.display());
        } else {
            println!("File {} already at version {version}", file.display());
        }
        return Ok(());
    }

    let formatter = project.formatter();
    let outcome = rewrite_declaration(file, &version, || formatter.revision())
        .with_context(|| format!("Failed to stamp {}", file.display()))?;
    if outcome.written {
        println!("File {} updated with version {version}", file.display());
    } else {
        println!("File {} already at version {version}", file.display());
    }
    Ok(())
}
