//! Configuration from flags, environment variables and platform defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use directories::ProjectDirs;

use wellbands_core::ApiUrl;
use wellbands_file::StorageLayout;
use wellbands_http::{ClientConfig, DEFAULT_API_URL};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// API base URL
    #[arg(long, global = true, env = "WELLBANDS_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Directory for durable storage (cookies, local storage)
    #[arg(long, global = true, env = "WELLBANDS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory for session-scoped storage
    #[arg(long, global = true, env = "WELLBANDS_SESSION_DIR")]
    pub session_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub client: ClientConfig,
    pub layout: StorageLayout,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<Config> {
        let api_url = ApiUrl::new(&self.api_url).context("Invalid API URL")?;
        let client = ClientConfig::new(api_url).with_timeout(Duration::from_secs(self.timeout));

        let dirs = ProjectDirs::from("com", "wellbands", "wellbands");

        let data_dir = match (&self.data_dir, &dirs) {
            (Some(dir), _) => dir.clone(),
            (None, Some(dirs)) => dirs.data_dir().to_path_buf(),
            (None, None) => anyhow::bail!(
                "Could not determine data directory; set WELLBANDS_DATA_DIR"
            ),
        };

        // The runtime dir is cleared when the user's login session ends,
        // which is the closest match to browser session storage.
        let session_dir = self
            .session_dir
            .clone()
            .or_else(|| dirs.as_ref()?.runtime_dir().map(|d| d.to_path_buf()))
            .unwrap_or_else(|| std::env::temp_dir().join("wellbands-session"));

        tracing::debug!(
            data_dir = %data_dir.display(),
            session_dir = %session_dir.display(),
            "Resolved storage"
        );

        Ok(Config {
            client,
            layout: StorageLayout::new(data_dir, session_dir),
        })
    }
}
