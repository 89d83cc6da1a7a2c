//! verstamp - stamp git-derived versions into build outputs
//!
//! The binary plays the host build pipeline: it copies the package into a
//! build output root or lays out a release tree, and the core's stamping
//! hooks run after each of those stages.
//!
//! # Project layout
//!
//! ```text
//! project/
//! ├── verstamp.toml          # [package] / [build] / [vcs]
//! ├── setup.py               # packaging descriptor (version=...)
//! ├── src/demo/_version.py   # __version__ = "{tag}" / __revision__ = ""
//! ├── build/lib/             # copy stage output (stamped)
//! └── dist/demo-1.4/         # archive stage output (stamped)
//! ```

#![allow(clippy::missing_errors_doc)]

pub mod cmd;
pub mod context;

pub use context::Project;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "verstamp")]
#[command(author, version = env!("VERSTAMP_VERSION"), about = "Stamp git-derived versions into build outputs")]
pub struct Cli {
    /// Path to verstamp.toml (default: search upwards from the current directory)
    #[arg(long, global = true, env = "VERSTAMP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the resolved version
    Version,
    /// Copy the package into the build output and stamp it
    Build {
        /// Copy-stage output root (overrides `build.build_lib`)
        #[arg(long)]
        build_lib: Option<PathBuf>,
        /// Gate and cache options
        #[command(flatten)]
        stage: StageArgs,
    },
    /// Lay out a release tree and stamp it
    Sdist {
        /// Release-tree parent directory (overrides `build.dist_dir`)
        #[arg(long)]
        dist_dir: Option<PathBuf>,
        /// Gate and cache options
        #[command(flatten)]
        stage: StageArgs,
    },
    /// Report whether the version changed since the last recorded build
    #[command(name = "if-changed")]
    IfChanged {
        /// Last built version cache file (overrides `build.cache_file`)
        #[arg(long)]
        cache_file: Option<PathBuf>,
    },
    /// Stamp a single file with the resolved version
    Stamp {
        /// File to rewrite in place
        file: PathBuf,
        /// Treat the file as a packaging descriptor (rewrite `version=`)
        #[arg(long)]
        descriptor: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// Options shared by the build stages.
#[derive(Debug, Clone, Args)]
pub struct StageArgs {
    /// Stop early if the version matches the last recorded build
    #[arg(long)]
    pub if_changed: bool,

    /// Last built version cache file (overrides `build.cache_file`)
    #[arg(long)]
    pub cache_file: Option<PathBuf>,
}
