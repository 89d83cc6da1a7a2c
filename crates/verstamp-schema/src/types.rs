//! The resolved version string and the declaration-file spec shared by the
//! core library and the CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The version computed once per build invocation.
///
/// Produced by the formatter and handed, unchanged, to every stage that
/// stamps or records it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedVersion(String);

impl ResolvedVersion {
    /// Wrap an already rendered version string.
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Return the version as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for ResolvedVersion {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for ResolvedVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResolvedVersion {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ResolvedVersion {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where the version template of a package is declared.
///
/// In `verstamp.toml` this is either a bare string or a table:
///
/// ```toml
/// version = "{tag}"
/// # or
/// version = { source = "src/demo/_version.py", build = "demo/_version.py" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VersionSpec {
    /// The template is given inline; no declaration file is stamped.
    Template(String),

    /// The template lives in a declaration file.
    File {
        /// Declaration file in the source tree; its `__version__` value is
        /// the template.
        source: PathBuf,
        /// Location of the copied declaration file relative to the build
        /// output root.
        build: PathBuf,
    },
}

impl VersionSpec {
    /// Declaration file in the source tree, if any.
    pub fn source_file(&self) -> Option<&Path> {
        match self {
            Self::Template(_) => None,
            Self::File { source, .. } => Some(source),
        }
    }

    /// Declaration file relative to a build output root, if any.
    pub fn build_file(&self) -> Option<&Path> {
        match self {
            Self::Template(_) => None,
            Self::File { build, .. } => Some(build),
        }
    }
}
