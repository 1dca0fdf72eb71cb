//! Wiring between the CLI and the library session types.

use std::sync::Arc;

use anyhow::{Context, Result};

use wellbands_core::{AccessToken, AuthContext, TokenManager};
use wellbands_http::{ApiClient, AuthApi};

use crate::config::Config;

/// Everything a command needs to talk to the API on behalf of the user.
pub struct CliSession {
    pub auth: AuthApi,
    pub context: AuthContext,
    config: Config,
}

impl CliSession {
    /// Open storage and build the auth stack. Nothing is read yet.
    pub fn open(config: &Config) -> Result<Self> {
        let auth = AuthApi::new(config.client.clone()).context("Failed to create HTTP client")?;
        let storage = Arc::new(config.layout.open());
        let manager = Arc::new(TokenManager::new(storage, Arc::new(auth.clone())));

        Ok(Self {
            auth,
            context: AuthContext::new(manager),
            config: config.clone(),
        })
    }

    pub fn manager(&self) -> &Arc<TokenManager> {
        self.context.manager()
    }

    /// Load the stored session, renewing it if needed.
    pub async fn require_login(&self) -> Result<AccessToken> {
        self.context
            .restore()
            .await
            .context("Not logged in. Run 'wellbands login' first.")
    }

    /// An API client for the restored session.
    pub async fn api_client(&self) -> Result<ApiClient> {
        self.require_login().await?;
        ApiClient::from_context(&self.context, self.config.client.clone())
            .context("Failed to create API client")
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
