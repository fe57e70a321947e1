pub mod download;
pub mod releases;

use crate::cli::GlobalArgs;
use crate::ui;
use anyhow::{Context, Result};
use relfetch_lib::config::Config;
use relfetch_lib::error::ReleaseError;
use relfetch_lib::gitlab::{GitLabClient, fetch_releases};
use relfetch_lib::release::Release;

/// Builds the effective config: data dir file and environment, then command line flags.
pub fn load_config(global_args: &GlobalArgs) -> Result<Config> {
    let config = Config::setup(global_args.datadir.as_deref())?
        .with_endpoint(global_args.endpoint.clone())
        .with_download_dir(global_args.download_dir.clone());
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Fetches the release list. A malformed response is reported and treated as
/// an empty list; transport failures abort the command.
pub async fn load_releases(config: &Config, client: &GitLabClient) -> Result<Vec<Release>> {
    let endpoint = config.releases_endpoint()?;
    match fetch_releases(client, endpoint, &config.credential).await {
        Ok(releases) => Ok(releases),
        Err(ReleaseError::MalformedResponse(detail)) => {
            ui::warning(&format!("The server sent an unreadable release list: {detail}"));
            Ok(Vec::new())
        }
        Err(e) => Err(e).context("Could not load releases"),
    }
}

pub fn print_no_releases() {
    ui::warning("No releases found.");
    ui::tip("Check --endpoint, or set GITLAB_PRIVATE_TOKEN for private projects.");
}
