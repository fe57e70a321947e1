use crate::cli::GlobalArgs;
use crate::commands::{load_config, load_releases, print_no_releases};
use crate::progress::SpanProgress;
use crate::ui;
use anyhow::{Result, anyhow};
use clap::Args;
use indicatif::HumanBytes;
use relfetch_lib::config::Config;
use relfetch_lib::gitlab::GitLabClient;
use relfetch_lib::release::{Asset, ReleasePager};
use relfetch_lib::supervisor::{TransferSummary, TransferSupervisor};
use relfetch_lib::transfer::TransferOutcome;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::instrument;

#[derive(Args)]
pub struct DownloadCommand {
    /// Release tag or zero-based index
    pub release: String,

    /// Asset name or zero-based index within the release (defaults to the first asset)
    pub asset: Option<String>,
}

impl DownloadCommand {
    pub async fn run(self, global_args: GlobalArgs) -> Result<ExitCode> {
        let config = load_config(&global_args)?;
        let client = GitLabClient::new()?;
        let releases = load_releases(&config, &client).await?;

        if releases.is_empty() {
            print_no_releases();
            return Ok(ExitCode::FAILURE);
        }

        let mut pager = ReleasePager::new(&releases);
        let release = pager
            .select(&self.release)
            .ok_or_else(|| anyhow!("Release '{}' not found", self.release))?;

        let asset = match &self.asset {
            Some(query) => release.find_asset(query).ok_or_else(|| {
                anyhow!("Asset '{}' not found in release {}", query, release.tag)
            })?,
            None => release
                .assets
                .first()
                .ok_or_else(|| anyhow!("Release {} has no assets", release.tag))?,
        };

        let cancel = Arc::new(AtomicBool::new(false));
        let signal = Arc::clone(&cancel);
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal.store(true, Ordering::Release);
            }
        });

        ui::info(&format!("Downloading: {}", asset.name()));
        ui::info("Press Ctrl-C to cancel.");
        let summary = supervise(&config, client, asset, &cancel).await;
        ctrl_c.abort();

        Ok(report(&summary))
    }
}

#[instrument(skip_all)]
async fn supervise(
    config: &Config,
    client: GitLabClient,
    asset: &Asset,
    cancel: &Arc<AtomicBool>,
) -> TransferSummary {
    let mut reporter = SpanProgress::new(tracing::Span::current());
    TransferSupervisor::new(client, &config.download_dir)
        .with_poll_interval(config.poll_interval)
        .run(asset, &config.credential, cancel, &mut reporter)
        .await
}

fn report(summary: &TransferSummary) -> ExitCode {
    match summary.outcome {
        TransferOutcome::Succeeded => {
            ui::success(&format!("Successfully downloaded: {}", summary.asset.name()));
            ui::info(&format!(
                "Saved {} to {}",
                HumanBytes(summary.progress.bytes_transferred),
                summary.destination.display()
            ));
            ExitCode::SUCCESS
        }
        TransferOutcome::Cancelled => {
            ui::warning("Download cancelled.");
            ExitCode::FAILURE
        }
        TransferOutcome::Failed => {
            let reason = match &summary.error {
                Some(e) => e.to_string(),
                None if summary.progress.bytes_total == 0 => {
                    "the server did not announce the file size".to_string()
                }
                None => format!(
                    "received {} of {}",
                    HumanBytes(summary.progress.bytes_transferred),
                    HumanBytes(summary.progress.bytes_total)
                ),
            };
            ui::error(&format!(
                "Download failed: {} ({reason})",
                summary.asset.name()
            ));
            ExitCode::FAILURE
        }
    }
}
