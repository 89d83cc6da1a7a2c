//! Default actions of the host build stages.
//!
//! These stand in for the packaging toolchain's own work: the copy stage
//! materialises the package tree under the build output root, and the
//! archive stage lays out a release tree. Stamping hooks run afterwards
//! against whatever these produced. Both only ever read the source tree.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, StampError};

/// Copy every non-hidden file below `src_root` to the same relative path
/// below `dest_root`, skipping anything inside `exclude`.
///
/// This is where package-path remapping happens: `src/demo/_version.py`
/// with `src_root = src` lands at `<dest_root>/demo/_version.py`.
///
/// Returns the number of files copied.
///
/// # Errors
///
/// [`StampError::Io`] if the tree cannot be walked or a file cannot be
/// copied.
pub fn copy_tree(src_root: &Path, dest_root: &Path, exclude: &[PathBuf]) -> Result<usize> {
    // The destination may live inside the source (package root "."), so it
    // must exist before exclusions are resolved.
    fs::create_dir_all(dest_root).map_err(|e| StampError::io(dest_root, e))?;
    let exclude: Vec<PathBuf> = exclude
        .iter()
        .map(PathBuf::as_path)
        .chain(std::iter::once(dest_root))
        .filter_map(|p| p.canonicalize().ok())
        .collect();
    let mut copied = 0;

    let walker = WalkDir::new(src_root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let excluded = entry
            .path()
            .canonicalize()
            .is_ok_and(|abs| exclude.iter().any(|ex| abs.starts_with(ex)));
        !hidden && !excluded
    });

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src_root).to_path_buf();
            StampError::io(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(src_root)
            .unwrap_or_else(|_| entry.path());
        let dest = dest_root.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| StampError::io(parent, e))?;
        }
        fs::copy(entry.path(), &dest).map_err(|e| StampError::io(entry.path(), e))?;
        debug!(from = %entry.path().display(), to = %dest.display(), "Copied");
        copied += 1;
    }

    Ok(copied)
}

/// Lay out a release tree at `<dist_dir>/<name>-<version>/`.
///
/// The tree mirrors the project layout: the package root keeps its path
/// relative to `project_root`, and each `include` entry (file or directory)
/// is copied alongside. An existing tree of the same name is replaced.
///
/// Returns the release tree root.
///
/// # Errors
///
/// [`StampError::Io`] if anything cannot be read, removed or copied.
pub fn materialize_release_tree(
    project_root: &Path,
    package_root: &Path,
    include: &[PathBuf],
    dist_dir: &Path,
    base_name: &str,
) -> Result<PathBuf> {
    let release = dist_dir.join(base_name);
    if release.exists() {
        fs::remove_dir_all(&release).map_err(|e| StampError::io(&release, e))?;
    }
    fs::create_dir_all(&release).map_err(|e| StampError::io(&release, e))?;

    let package_rel = package_root.strip_prefix(project_root).unwrap_or(package_root);
    let excluded = [dist_dir.to_path_buf()];
    let files = copy_tree(package_root, &release.join(package_rel), &excluded)?;

    for item in include {
        let src = project_root.join(item);
        let dest = release.join(item);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| StampError::io(parent, e))?;
        }
        if src.is_dir() {
            fs_extra::dir::copy(
                &src,
                &dest,
                &fs_extra::dir::CopyOptions::new()
                    .content_only(true)
                    .overwrite(true),
            )
            .map_err(|e| StampError::io(&src, std::io::Error::other(e.to_string())))?;
        } else {
            fs::copy(&src, &dest).map_err(|e| StampError::io(&src, e))?;
        }
    }

    info!(release = %release.display(), files, "Release tree created");
    Ok(release)
}
