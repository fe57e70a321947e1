use crate::supervisor::DEFAULT_POLL_INTERVAL;
use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "relfetch.toml";
pub const TOKEN_ENV_VAR: &str = "GITLAB_PRIVATE_TOKEN";
const DEFAULT_HOST: &str = "gitlab.com";

#[derive(Clone)]
pub struct Config {
    /// Root directory for relfetch data (config file, downloads)
    pub data_dir: PathBuf,

    /// Directory downloaded assets are written to, created on demand
    pub download_dir: PathBuf,

    /// Fully qualified releases endpoint, if one is configured
    pub endpoint: Option<String>,

    /// Value of the `PRIVATE-TOKEN` header; empty means unauthenticated
    pub credential: String,

    /// How often a running download is polled for progress and cancellation
    pub poll_interval: Duration,
}

/// `relfetch.toml` contents. Every key is optional.
#[derive(Deserialize, Debug, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub host: Option<String>,
    pub project: Option<String>,
    pub endpoint: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub per_page: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub token: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field("download_dir", &self.download_dir)
            .field("endpoint", &self.endpoint)
            .field(
                "credential",
                &if self.credential.is_empty() { "<none>" } else { "<redacted>" },
            )
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Config {
    pub fn new_for_path(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            download_dir: data_dir.join("downloads"),
            endpoint: None,
            credential: String::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Sets up a Config for the given data directory, reading `relfetch.toml`
    /// from it and the credential from the environment.
    /// See also [Self::default_data_dir].
    pub fn setup(data_dir: Option<&Path>) -> Result<Self> {
        let data_dir = data_dir
            .map(|d| d.to_path_buf())
            .unwrap_or_else(Self::default_data_dir);

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;

        let config_path = data_dir.join(CONFIG_FILE_NAME);
        let file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<ConfigFile>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            ConfigFile::default()
        };

        let env_token = std::env::var(TOKEN_ENV_VAR).ok();
        Ok(Self::from_sources(&data_dir, file, env_token))
    }

    /// Layers the config file and the environment token over the defaults.
    /// A non-empty environment token beats the file's `token`.
    pub fn from_sources(data_dir: &Path, file: ConfigFile, env_token: Option<String>) -> Self {
        let mut config = Self::new_for_path(data_dir);

        config.endpoint = file.endpoint.filter(|e| !e.is_empty()).or_else(|| {
            file.project.as_deref().filter(|p| !p.is_empty()).map(|project| {
                releases_endpoint(
                    file.host.as_deref().unwrap_or(DEFAULT_HOST),
                    project,
                    file.per_page,
                )
            })
        });

        if let Some(download_dir) = file.download_dir {
            config.download_dir = if download_dir.is_absolute() {
                download_dir
            } else {
                data_dir.join(download_dir)
            };
        }

        if let Some(ms) = file.poll_interval_ms.filter(|ms| *ms > 0) {
            config.poll_interval = Duration::from_millis(ms);
        }

        config.credential = env_token
            .filter(|t| !t.is_empty())
            .or(file.token)
            .unwrap_or_default();

        config
    }

    pub fn with_endpoint(self, endpoint: Option<String>) -> Self {
        Self {
            endpoint: endpoint.or(self.endpoint),
            ..self
        }
    }

    pub fn with_download_dir(self, download_dir: Option<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.unwrap_or(self.download_dir),
            ..self
        }
    }

    pub fn releases_endpoint(&self) -> Result<&str> {
        self.endpoint.as_deref().ok_or_else(|| {
            anyhow!(
                "No releases endpoint configured. Pass --endpoint or set `project` in {}",
                self.data_dir.join(CONFIG_FILE_NAME).display()
            )
        })
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"))
            .join("relfetch")
    }
}

/// `https://<host>/api/v4/projects/<project>/releases` with the project path
/// URL-encoded as a single segment.
pub fn releases_endpoint(host: &str, project: &str, per_page: Option<u32>) -> String {
    let project: String = url::form_urlencoded::byte_serialize(project.as_bytes()).collect();
    let host = host.trim_end_matches('/');
    let base = if host.contains("://") {
        format!("{host}/api/v4/projects/{project}/releases")
    } else {
        format!("https://{host}/api/v4/projects/{project}/releases")
    };
    match per_page {
        Some(per_page) => format!("{base}?per_page={per_page}"),
        None => base,
    }
}
