//! Build command: the host copy stage with stamping attached.

use std::path::Path;

use anyhow::Result;
use verstamp_core::hooks::register_stamp_hooks;
use verstamp_core::{Stage, StagePipeline, host};

use crate::{Project, StageArgs};

/// Copy the package tree into the build output root and stamp the copy.
pub fn build(project: &Project, build_lib: Option<&Path>, stage: &StageArgs) -> Result<()> {
    let version = project.resolve()?;
    let cache_file = project.cache_file(stage.cache_file.as_deref());
    if stage.if_changed && super::gate_stops_build(&version, cache_file.as_deref())? {
        return Ok(());
    }

    let config = project.config();
    let build_root = build_lib.map_or_else(|| config.build_lib(), Path::to_path_buf);
    let package_root = config.package_root();
    let exclude = [config.dist_dir()];

    let ctx = project.stamp_context(version, cache_file);
    let mut pipeline = StagePipeline::new();
    register_stamp_hooks(&mut pipeline, &ctx);

    pipeline.run_stage(Stage::Copy, &build_root, |root| {
        host::copy_tree(&package_root, root, &exclude).map(|_| ())
    })?;

    println!(
        "Built {} {} into {}",
        config.package.name,
        ctx.version,
        build_root.display()
    );
    Ok(())
}
