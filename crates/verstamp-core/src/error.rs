//! Error taxonomy for resolution and stamping.
//!
//! None of these are recovered locally. Each one aborts the stage that
//! raised it and surfaces to the invoking pipeline.

use std::path::PathBuf;
use thiserror::Error;
use verstamp_schema::TemplateError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StampError>;

/// Everything that can stop a version from being resolved or stamped.
#[derive(Error, Debug)]
pub enum StampError {
    /// The version-control query could not run: not a repository, missing
    /// tool, non-zero exit or timeout.
    #[error("version control unavailable while running `{command}`: {reason}")]
    VcsUnavailable {
        /// The command line that was attempted.
        command: String,
        /// Why it failed.
        reason: String,
    },

    /// A referenced placeholder needs an environment variable that is unset.
    #[error("environment variable {variable} is not set (required by the {{{placeholder}}} placeholder)")]
    MissingEnvironment {
        /// Name of the missing variable.
        variable: String,
        /// Placeholder that asked for it.
        placeholder: &'static str,
    },

    /// The expected declaration is absent from a file.
    #[error("no match for pattern `{pattern}` in {}", .path.display())]
    NoDeclarationFound {
        /// File that was searched.
        path: PathBuf,
        /// The pattern that did not match.
        pattern: &'static str,
    },

    /// A required option was not supplied.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// A descriptor `version=` argument whose value is not a single-line
    /// literal, tuple or flat call.
    #[error(
        "unsupported version argument in {} at line {line}; use a single-line literal",
        .path.display()
    )]
    UnsupportedDescriptor {
        /// Descriptor file.
        path: PathBuf,
        /// 1-based line of the `version=` keyword.
        line: usize,
    },

    /// The version template itself is malformed.
    #[error("invalid version template: {0}")]
    Template(#[from] TemplateError),

    /// File-system failure on a specific path.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl StampError {
    /// Wrap an I/O error with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`StampError::ConfigurationError`] from any message.
    pub fn config(msg: impl std::fmt::Display) -> Self {
        Self::ConfigurationError(msg.to_string())
    }
}
