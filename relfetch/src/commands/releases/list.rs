use crate::cli::GlobalArgs;
use crate::commands::{load_config, load_releases, print_no_releases};
use crate::ui;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use relfetch_lib::gitlab::GitLabClient;
use relfetch_lib::release::Release;
use std::process::ExitCode;

#[derive(Args)]
pub struct ListCommand {
    /// Print the releases as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl ListCommand {
    pub async fn run(self, global_args: GlobalArgs) -> Result<ExitCode> {
        let config = load_config(&global_args)?;
        let client = GitLabClient::new()?;
        let releases = load_releases(&config, &client).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&releases)?);
            return Ok(ExitCode::SUCCESS);
        }

        if releases.is_empty() {
            print_no_releases();
            return Ok(ExitCode::SUCCESS);
        }

        ui::info(&format!("{}", "Releases:".underline().green()));
        Self::print_releases(&releases);

        ui::blank_line();
        ui::tip("Use `relfetch releases show <tag|index>` to see a release's assets");
        ui::tip("Use `relfetch download <tag|index> [asset]` to download an asset");
        Ok(ExitCode::SUCCESS)
    }

    fn print_releases(releases: &[Release]) {
        let tag_width = releases.iter().map(|r| r.tag.len()).max().unwrap_or(0);
        let name_width = releases
            .iter()
            .map(|r| r.display_name.len())
            .max()
            .unwrap_or(0);
        let index_width = releases.len().to_string().len();

        for (index, release) in releases.iter().enumerate() {
            let assets = match release.assets.len() {
                0 => "no assets".dimmed(),
                1 => "1 asset".normal(),
                n => format!("{n} assets").normal(),
            };
            ui::info(
                format!(
                    "{:>index_width$}  {}  {:name_width$}  {}  {}",
                    index,
                    format!("{:tag_width$}", release.tag).bold(),
                    release.display_name,
                    ui::format_created_at(&release.created_at).dimmed(),
                    assets,
                )
                .trim_end(),
            );
        }
    }
}
