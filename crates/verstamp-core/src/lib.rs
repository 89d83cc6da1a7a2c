//! Core library for verstamp.
//!
//! Resolves a build version from repository state and stamps it into the
//! copies of a package that the host build pipeline produces.
//!
//! # Flow
//!
//! ```text
//! GitSource ──► VersionFormatter ──► ResolvedVersion (once per invocation)
//!                                         │
//!                     should_abort_build ◄┤ (optional short-circuit)
//!                                         ▼
//!     StagePipeline::run_stage(Copy | Archive) ──► post_*_hook ──► rewrite
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod gate;
pub mod hooks;
pub mod host;
pub mod rewrite;
pub mod source;

pub use config::{CONFIG_FILE, StampConfig};
pub use error::{Result, StampError};
pub use format::VersionFormatter;
pub use gate::{LastBuiltVersion, should_abort_build};
pub use hooks::{Stage, StagePipeline, StampContext, post_archive_hook, post_copy_hook};
pub use rewrite::{RewriteOutcome, rewrite_declaration, rewrite_descriptor_argument};
pub use source::{GitSource, VersionSource};
