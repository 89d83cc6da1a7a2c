//! verstamp - stamp git-derived versions into build outputs

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use verstamp_cli::cmd;
use verstamp_cli::{Cli, Commands, Project};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise warnings only, or debug with --verbose
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        cmd::completions::completions(shell);
        return Ok(());
    }

    let project = Project::open(cli.config.as_deref())?;

    match cli.command {
        Commands::Version => cmd::version::version(&project),
        Commands::Build { build_lib, stage } => {
            cmd::build::build(&project, build_lib.as_deref(), &stage)
        }
        Commands::Sdist { dist_dir, stage } => {
            cmd::sdist::sdist(&project, dist_dir.as_deref(), &stage)
        }
        Commands::IfChanged { cache_file } => {
            cmd::if_changed::if_changed(&project, cache_file.as_deref())
        }
        Commands::Stamp { file, descriptor } => cmd::stamp::stamp(&project, &file, descriptor),
        Commands::Completions { .. } => Ok(()),
    }
}
