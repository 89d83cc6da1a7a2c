//! Project configuration parsed from `verstamp.toml`.
//!
//! All relative paths are resolved against the directory holding the
//! configuration file, never against the process working directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use verstamp_schema::VersionSpec;

use crate::error::{Result, StampError};
use crate::source::{DEFAULT_BUILD_NUMBER_VAR, GitSource};

/// Conventional configuration file name.
pub const CONFIG_FILE: &str = "verstamp.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StampConfig {
    /// What is being versioned and where its markers live.
    pub package: PackageSection,
    /// Build output locations.
    #[serde(default)]
    pub build: BuildSection,
    /// Version-control query settings.
    #[serde(default)]
    pub vcs: VcsSection,
    #[serde(skip)]
    root: PathBuf,
}

/// The `[package]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageSection {
    /// Package name, used for the release tree directory.
    pub name: String,
    /// Template string or declaration file pair.
    pub version: VersionSpec,
    /// Source directory whose contents map onto the build output root.
    #[serde(default = "default_package_root")]
    pub package_root: PathBuf,
    /// Packaging descriptor stamped inside release trees.
    pub descriptor: Option<PathBuf>,
    /// Extra project files copied into release trees.
    #[serde(default)]
    pub include: Vec<PathBuf>,
}

/// The `[build]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Output root of the copy stage.
    #[serde(default = "default_build_lib")]
    pub build_lib: PathBuf,
    /// Directory receiving release trees.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,
    /// Where the last built version is recorded, if anywhere.
    pub cache_file: Option<PathBuf>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            build_lib: default_build_lib(),
            dist_dir: default_dist_dir(),
            cache_file: None,
        }
    }
}

/// The `[vcs]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VcsSection {
    /// Path scope for commit-count, revision and dirty queries.
    #[serde(default = "default_scope")]
    pub scope: PathBuf,
    /// Upper bound for each `git` invocation.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Environment variable carrying the CI build number.
    #[serde(default = "default_build_number_var")]
    pub build_number_var: String,
}

impl Default for VcsSection {
    fn default() -> Self {
        Self {
            scope: default_scope(),
            timeout_secs: default_timeout_secs(),
            build_number_var: default_build_number_var(),
        }
    }
}

fn default_package_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_build_lib() -> PathBuf {
    PathBuf::from("build/lib")
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_scope() -> PathBuf {
    PathBuf::from(".")
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_build_number_var() -> String {
    DEFAULT_BUILD_NUMBER_VAR.to_string()
}

impl StampConfig {
    /// Load and parse a configuration file.
    ///
    /// # Errors
    ///
    /// [`StampError::Io`] if the file cannot be read and
    /// [`StampError::ConfigurationError`] if it is not valid.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StampError::io(path, e))?;
        let root = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::parse(&content, root)
            .map_err(|e| StampError::config(format!("{}: {e}", path.display())))
    }

    /// Parse configuration text, resolving paths against `root`.
    ///
    /// # Errors
    ///
    /// [`StampError::ConfigurationError`] on malformed TOML, unknown keys or
    /// an out-of-range timeout.
    pub fn parse(content: &str, root: &Path) -> Result<Self> {
        let mut config: StampConfig =
            toml::from_str(content).map_err(|e| StampError::config(e.message()))?;
        if config.vcs.timeout_secs == 0 {
            return Err(StampError::config("vcs.timeout_secs must be at least 1"));
        }
        config.root = root.to_path_buf();
        Ok(config)
    }

    /// Walk up from `start` looking for [`CONFIG_FILE`].
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Directory the configuration was loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a configured path against the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Absolute-ish package root in the source tree.
    pub fn package_root(&self) -> PathBuf {
        self.resolve(&self.package.package_root)
    }

    /// Copy-stage output root.
    pub fn build_lib(&self) -> PathBuf {
        self.resolve(&self.build.build_lib)
    }

    /// Release-tree parent directory.
    pub fn dist_dir(&self) -> PathBuf {
        self.resolve(&self.build.dist_dir)
    }

    /// Configured [`crate::LastBuiltVersion`] location, if any.
    pub fn cache_file(&self) -> Option<PathBuf> {
        self.build.cache_file.as_deref().map(|p| self.resolve(p))
    }

    /// Packaging descriptor in the source tree, if any.
    pub fn descriptor(&self) -> Option<&Path> {
        self.package.descriptor.as_deref()
    }

    /// Construct the repository-backed source described by `[vcs]`.
    pub fn git_source(&self) -> GitSource {
        GitSource::new(&self.root)
            .with_scope(&self.vcs.scope)
            .with_timeout(Duration::from_secs(self.vcs.timeout_secs))
            .with_build_number_var(&self.vcs.build_number_var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[package]
name = "demo"
version = { source = "src/demo/_version.py", build = "demo/_version.py" }
package_root = "src"
descriptor = "setup.py"
include = ["setup.py", "README.md"]

[build]
build_lib = "out/lib"
dist_dir = "out/dist"
cache_file = ".cache/last"

[vcs]
scope = "src/demo"
timeout_secs = 5
build_number_var = "CI_BUILD"
"#;

    #[test]
    fn test_parse_full() {
        let config = StampConfig::parse(FULL, Path::new("/proj")).unwrap();
        assert_eq!(config.package.name, "demo");
        assert_eq!(
            config.package.version.build_file(),
            Some(Path::new("demo/_version.py"))
        );
        assert_eq!(config.package_root(), PathBuf::from("/proj/src"));
        assert_eq!(config.build_lib(), PathBuf::from("/proj/out/lib"));
        assert_eq!(config.dist_dir(), PathBuf::from("/proj/out/dist"));
        assert_eq!(config.cache_file(), Some(PathBuf::from("/proj/.cache/last")));
        assert_eq!(config.descriptor(), Some(Path::new("setup.py")));
        assert_eq!(config.vcs.timeout_secs, 5);
        assert_eq!(config.package.include.len(), 2);
    }

    #[test]
    fn test_defaults() {
        let config = StampConfig::parse(
            "[package]\nname = \"demo\"\nversion = \"{tag}\"\n",
            Path::new("/proj"),
        )
        .unwrap();
        assert_eq!(config.package_root(), PathBuf::from("/proj/."));
        assert_eq!(config.build_lib(), PathBuf::from("/proj/build/lib"));
        assert_eq!(config.dist_dir(), PathBuf::from("/proj/dist"));
        assert_eq!(config.cache_file(), None);
        assert_eq!(config.vcs.build_number_var, "BUILD_NUMBER");
        assert_eq!(config.vcs.timeout_secs, 30);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = StampConfig::parse(
            "[package]\nname = \"d\"\nversion = \"1\"\nversoin_file = \"x\"\n",
            Path::new("."),
        )
        .unwrap_err();
        assert!(matches!(err, StampError::ConfigurationError(_)));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = StampConfig::parse(
            "[package]\nname = \"d\"\nversion = \"1\"\n[vcs]\ntimeout_secs = 0\n",
            Path::new("."),
        )
        .unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn test_load_names_file_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[package]\nname = 3\n").unwrap();
        let err = StampConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains(CONFIG_FILE));
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "").unwrap();

        assert_eq!(
            StampConfig::discover(&nested),
            Some(dir.path().join(CONFIG_FILE))
        );
    }
}
