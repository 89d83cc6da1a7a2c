//! Per-invocation project context.
//!
//! Groups the loaded configuration and the repository-backed version source
//! so commands do not each rediscover them.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use tracing::debug;
use verstamp_core::hooks::StampContext;
use verstamp_core::{CONFIG_FILE, GitSource, StampConfig, VersionFormatter};
use verstamp_schema::ResolvedVersion;

/// A loaded project.
pub struct Project {
    config: StampConfig,
    source: GitSource,
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.config.root())
            .field("name", &self.config.package.name)
            .finish_non_exhaustive()
    }
}

impl Project {
    /// Load `config` if given, otherwise search upwards from the current
    /// directory for `verstamp.toml`.
    pub fn open(config: Option<&Path>) -> Result<Self> {
        let path = match config {
            Some(path) => path.to_path_buf(),
            None => {
                let cwd = std::env::current_dir().context("Failed to read current directory")?;
                let Some(found) = StampConfig::discover(&cwd) else {
                    bail!(
                        "No {CONFIG_FILE} found in {} or any parent directory",
                        cwd.display()
                    );
                };
                found
            }
        };
        debug!(config = %path.display(), "Loading configuration");
        let config = StampConfig::load(&path)?;
        Ok(Self::from_config(config))
    }

    /// Wrap an already parsed configuration.
    pub fn from_config(config: StampConfig) -> Self {
        let source = config.git_source();
        Self { config, source }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &StampConfig {
        &self.config
    }

    /// A formatter over this project's repository.
    pub fn formatter(&self) -> VersionFormatter<'_, GitSource> {
        VersionFormatter::new(&self.source)
    }

    /// Resolve the configured version once.
    pub fn resolve(&self) -> Result<ResolvedVersion> {
        let version = self
            .formatter()
            .resolve(&self.config.package.version, self.config.root())?;
        Ok(version)
    }

    /// The cache file to use: a command-line override (relative to the
    /// current directory) wins over `build.cache_file`.
    pub fn cache_file(&self, cli_override: Option<&Path>) -> Option<PathBuf> {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.config.cache_file())
    }

    /// Stamping context for `version`, with the revision looked up lazily
    /// through this project's repository.
    pub fn stamp_context(
        &self,
        version: ResolvedVersion,
        cache_file: Option<PathBuf>,
    ) -> StampContext<'_> {
        let formatter = self.formatter();
        StampContext::new(version, self.config.package.version.clone(), move || {
            formatter.revision()
        })
        .with_descriptor(self.config.descriptor().map(Path::to_path_buf))
        .with_cache_file(cache_file)
    }
}
