//! Sdist command: lay out a release tree and stamp it.

use std::path::{Path, PathBuf};

use anyhow::Result;
use verstamp_core::hooks::register_stamp_hooks;
use verstamp_core::{Stage, StagePipeline, host};

use crate::{Project, StageArgs};

/// Materialise `<dist>/<name>-<version>/` and stamp the declaration file
/// and packaging descriptor inside it.
pub fn sdist(project: &Project, dist_dir: Option<&Path>, stage: &StageArgs) -> Result<()> {
    let version = project.resolve()?;
    let cache_file = project.cache_file(stage.cache_file.as_deref());
    if stage.if_changed && super::gate_stops_build(&version, cache_file.as_deref())? {
        return Ok(());
    }

    let config = project.config();
    let dist = dist_dir.map_or_else(|| config.dist_dir(), Path::to_path_buf);
    let base_name = format!("{}-{version}", config.package.name);
    let release = dist.join(&base_name);
    let package_root = config.package_root();

    // The descriptor has to be in the tree for the archive hook to stamp it.
    let mut include: Vec<PathBuf> = config.package.include.clone();
    if let Some(descriptor) = config
        .descriptor()
        .filter(|d| !include.iter().any(|p| p.as_path() == *d))
    {
        include.push(descriptor.to_path_buf());
    }

    let ctx = project.stamp_context(version, cache_file);
    let mut pipeline = StagePipeline::new();
    register_stamp_hooks(&mut pipeline, &ctx);

    pipeline.run_stage(Stage::Archive, &release, |_| {
        host::materialize_release_tree(config.root(), &package_root, &include, &dist, &base_name)
            .map(|_| ())
    })?;

    println!("Created release tree {}", release.display());
    Ok(())
}
