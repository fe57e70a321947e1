use crate::cli::GlobalArgs;
use crate::commands::{load_config, load_releases, print_no_releases};
use crate::ui;
use anyhow::{Result, anyhow};
use clap::Args;
use colored::Colorize;
use relfetch_lib::gitlab::GitLabClient;
use relfetch_lib::release::{Release, ReleasePager};
use std::process::ExitCode;

#[derive(Args)]
pub struct ShowCommand {
    /// Release tag or zero-based index (defaults to the newest release)
    pub release: Option<String>,
}

impl ShowCommand {
    pub async fn run(self, global_args: GlobalArgs) -> Result<ExitCode> {
        let config = load_config(&global_args)?;
        let client = GitLabClient::new()?;
        let releases = load_releases(&config, &client).await?;

        if releases.is_empty() {
            print_no_releases();
            return Ok(ExitCode::SUCCESS);
        }

        let mut pager = ReleasePager::new(&releases);
        if let Some(query) = &self.release {
            pager
                .select(query)
                .ok_or_else(|| anyhow!("Release '{}' not found", query))?;
        }

        let position = pager.position();
        if let Some(release) = pager.current() {
            Self::print_release(release, position, pager.len());
        }

        ui::blank_line();
        if pager.len() > 1 {
            let previous = pager.previous_page().map(|r| r.tag.clone());
            pager.next_page();
            let next = pager.next_page().map(|r| r.tag.clone());
            ui::tip(&format!(
                "Previous: `relfetch releases show {}`, next: `relfetch releases show {}`",
                previous.unwrap_or_default(),
                next.unwrap_or_default()
            ));
        }
        ui::tip("Use `relfetch download <tag|index> [asset]` to download an asset");
        Ok(ExitCode::SUCCESS)
    }

    fn print_release(release: &Release, index: usize, total: usize) {
        ui::info(&format!("Release {} of {}", index + 1, total).underline().green().to_string());
        ui::blank_line();
        ui::info(&format!("Tag:    {}", release.tag.bold()));
        ui::info(&format!("Name:   {}", release.display_name));
        ui::info(&format!("Commit: {}", release.commit_id));
        ui::info(&format!("Date:   {}", ui::format_created_at(&release.created_at)));

        if !release.description.is_empty() {
            ui::blank_line();
            ui::info(&release.description);
        }

        ui::blank_line();
        if release.has_assets() {
            ui::info("Assets:");
            for (index, asset) in release.assets.iter().enumerate() {
                ui::info(&format!("  {index}. {}", asset.name()));
            }
        } else {
            ui::warning("No assets available for this release.");
        }
    }
}
