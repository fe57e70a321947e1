use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::commands::download::DownloadCommand;
use crate::commands::releases::{list::ListCommand, show::ShowCommand};

#[derive(Parser)]
#[command(name = "relfetch")]
#[command(about = "Browse a GitLab project's releases and download their assets")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global_args: GlobalArgs,
}

#[derive(clap::Args, Clone)]
pub struct GlobalArgs {
    /// Use a different location for relfetch's data, where relfetch.toml and downloads are kept
    #[arg(long, global = true)]
    pub datadir: Option<PathBuf>,

    /// Fully qualified releases endpoint, e.g. https://gitlab.com/api/v4/projects/group%2Fapp/releases
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Directory downloaded assets are written to
    #[arg(long, global = true)]
    pub download_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Browse releases
    #[command(subcommand)]
    Releases(ReleasesCommands),

    /// Download one asset of a release
    #[command(alias = "get")]
    Download(DownloadCommand),
}

#[derive(Subcommand)]
pub enum ReleasesCommands {
    /// List all releases
    #[command(alias = "ls")]
    List(ListCommand),

    /// Show one release and its assets
    Show(ShowCommand),
}

impl Cli {
    pub async fn run(self) -> Result<ExitCode> {
        match self.command {
            Commands::Releases(releases_command) => match releases_command {
                ReleasesCommands::List(cmd) => cmd.run(self.global_args).await,
                ReleasesCommands::Show(cmd) => cmd.run(self.global_args).await,
            },
            Commands::Download(cmd) => cmd.run(self.global_args).await,
        }
    }
}
