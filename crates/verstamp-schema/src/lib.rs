//! Shared types for verstamp.
//!
//! Everything in this crate is pure: no process spawning, no file access.
//! The core crate feeds repository state into these types and gets back the
//! strings it stamps into build outputs.

pub mod describe;
pub mod template;
pub mod types;

// Re-exports
pub use describe::TagDescription;
pub use template::{Placeholder, Segment, TemplateError, VersionTemplate};
pub use types::*;

/// Delimiter between the fields of a `git describe` style tag description.
pub const DESCRIBE_DELIMITER: char = '-';

/// Final describe segment emitted when the working tree has local changes.
pub const DIRTY_MARKER: &str = "dirty";

/// Suffix appended to the minor component of a version built from a dirty tree.
pub const DIRTY_SUFFIX: &str = "dev";
