//! Post-stage hooks on the host build pipeline.
//!
//! The host exposes an ordered list of callbacks per stage. A stage always
//! runs its default action first and then each hook in registration order,
//! so stamping sees the files the host has just materialised.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;
use verstamp_schema::{ResolvedVersion, VersionSpec};

use crate::error::Result;
use crate::gate::LastBuiltVersion;
use crate::rewrite;

/// Pipeline stages that accept post-stage hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Source modules are copied into the build output root.
    Copy,
    /// A release tree is laid out for distribution.
    Archive,
}

impl Stage {
    /// Stage name for logs.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Copy => "copy",
            Stage::Archive => "archive",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A post-stage callback; receives the stage's output root.
pub type Hook<'a> = Box<dyn Fn(&Path) -> Result<()> + 'a>;

struct Registered<'a> {
    stage: Stage,
    name: String,
    hook: Hook<'a>,
}

/// Ordered post-stage callbacks.
#[derive(Default)]
pub struct StagePipeline<'a> {
    hooks: Vec<Registered<'a>>,
}

impl fmt::Debug for StagePipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| (h.stage, &h.name)))
            .finish()
    }
}

impl<'a> StagePipeline<'a> {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `hook` to `stage` under `name`.
    ///
    /// Registering the same name on the same stage again is a no-op and
    /// returns `false`.
    pub fn register(
        &mut self,
        stage: Stage,
        name: impl Into<String>,
        hook: impl Fn(&Path) -> Result<()> + 'a,
    ) -> bool {
        let name = name.into();
        if self.is_registered(stage, &name) {
            return false;
        }
        self.hooks.push(Registered {
            stage,
            name,
            hook: Box::new(hook),
        });
        true
    }

    /// Whether `name` is already attached to `stage`.
    pub fn is_registered(&self, stage: Stage, name: &str) -> bool {
        self.hooks
            .iter()
            .any(|h| h.stage == stage && h.name == name)
    }

    /// Names of the hooks attached to `stage`, in run order.
    pub fn hook_names(&self, stage: Stage) -> Vec<&str> {
        self.hooks
            .iter()
            .filter(|h| h.stage == stage)
            .map(|h| h.name.as_str())
            .collect()
    }

    /// Run `default_action`, then every hook of `stage`, against
    /// `output_root`.
    ///
    /// # Errors
    ///
    /// The default action's error, or the first hook error; later hooks do
    /// not run.
    pub fn run_stage(
        &self,
        stage: Stage,
        output_root: &Path,
        default_action: impl FnOnce(&Path) -> Result<()>,
    ) -> Result<()> {
        info!(%stage, root = %output_root.display(), "Running stage");
        default_action(output_root)?;
        for registered in self.hooks.iter().filter(|h| h.stage == stage) {
            info!(%stage, hook = %registered.name, "Running post-stage hook");
            (registered.hook)(output_root)?;
        }
        Ok(())
    }
}

/// Computes the revision stamped into empty `__revision__` slots.
pub type RevisionFn<'a> = Box<dyn Fn() -> Result<String> + 'a>;

/// Everything the stamping hooks need, resolved once per invocation.
pub struct StampContext<'a> {
    /// The version to stamp.
    pub version: ResolvedVersion,
    /// Where the version template was declared.
    pub spec: VersionSpec,
    /// Packaging descriptor path relative to a release tree root.
    pub descriptor: Option<PathBuf>,
    /// Last built version record, if recording is enabled.
    pub cache_file: Option<PathBuf>,
    revision: RevisionFn<'a>,
}

impl fmt::Debug for StampContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StampContext")
            .field("version", &self.version)
            .field("spec", &self.spec)
            .field("descriptor", &self.descriptor)
            .field("cache_file", &self.cache_file)
            .finish_non_exhaustive()
    }
}

impl<'a> StampContext<'a> {
    /// Bundle a resolved version with its declaration and revision lookup.
    pub fn new(
        version: ResolvedVersion,
        spec: VersionSpec,
        revision: impl Fn() -> Result<String> + 'a,
    ) -> Self {
        Self {
            version,
            spec,
            descriptor: None,
            cache_file: None,
            revision: Box::new(revision),
        }
    }

    /// Also stamp this descriptor in release trees.
    pub fn with_descriptor(mut self, descriptor: Option<PathBuf>) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Record the version here after each successful stamping stage.
    pub fn with_cache_file(mut self, cache_file: Option<PathBuf>) -> Self {
        self.cache_file = cache_file;
        self
    }

    fn stamp_declaration(&self, path: &Path) -> Result<()> {
        let outcome = rewrite::rewrite_declaration(path, &self.version, || (self.revision)())?;
        info!(
            path = %path.display(),
            version = %self.version,
            previous = %outcome.previous_version,
            revision = outcome.revision.as_deref().unwrap_or("-"),
            "File updated with version"
        );
        Ok(())
    }

    fn record(&self) -> Result<()> {
        if let Some(cache) = &self.cache_file {
            LastBuiltVersion::store(cache, &self.version)?;
        }
        Ok(())
    }
}

/// Stamp the build-output copy of the declaration file, then record the
/// version if a cache file is configured.
///
/// With a plain template version there is no declaration file; only the
/// recording step runs.
///
/// # Errors
///
/// Any [`rewrite::rewrite_declaration`] or [`LastBuiltVersion::store`] error.
pub fn post_copy_hook(ctx: &StampContext<'_>, build_root: &Path) -> Result<()> {
    if let Some(rel) = ctx.spec.build_file() {
        ctx.stamp_declaration(&build_root.join(rel))?;
    }
    ctx.record()
}

/// Stamp the declaration file and the packaging descriptor inside a release
/// tree, then record the version if a cache file is configured.
///
/// The release tree mirrors the project layout, so the declaration is found
/// at its source-tree path.
///
/// # Errors
///
/// Any rewrite or [`LastBuiltVersion::store`] error.
pub fn post_archive_hook(ctx: &StampContext<'_>, release_root: &Path) -> Result<()> {
    if let Some(rel) = ctx.spec.source_file() {
        ctx.stamp_declaration(&release_root.join(rel))?;
    }
    if let Some(descriptor) = &ctx.descriptor {
        rewrite::rewrite_descriptor_argument(&release_root.join(descriptor), &ctx.version)?;
    }
    ctx.record()
}

/// Name under which the stamping hooks are registered.
pub const STAMP_HOOK: &str = "stamp-version";

/// Attach [`post_copy_hook`] and [`post_archive_hook`] to `pipeline`.
/// Calling this more than once has no further effect.
pub fn register_stamp_hooks<'a>(pipeline: &mut StagePipeline<'a>, ctx: &'a StampContext<'a>) {
    pipeline.register(Stage::Copy, STAMP_HOOK, move |root| post_copy_hook(ctx, root));
    pipeline.register(Stage::Archive, STAMP_HOOK, move |root| {
        post_archive_hook(ctx, root)
    });
}
