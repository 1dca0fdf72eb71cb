//! Bearer-authenticated API client with automatic 401 recovery.

use std::sync::{Arc, RwLock};

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use wellbands_core::error::AuthError;
use wellbands_core::{AccessToken, AuthContext, Result, SessionEvent, SignOutReason, TokenManager};

use crate::client::{ClientConfig, HttpClient};
use crate::endpoints::*;

/// An HTTP client bound to a bearer token.
///
/// When a request comes back 401 the client asks the [`TokenManager`] for a
/// valid token and retries that request once. If no token can be had, the
/// stored credentials are cleared and the call fails with
/// [`AuthError::LoginRequired`]. A 401 on the retry is returned as is.
#[derive(Debug)]
pub struct ApiClient {
    http: HttpClient,
    manager: Arc<TokenManager>,
    token: RwLock<Option<AccessToken>>,
}

/// Build an [`ApiClient`] for `token`.
pub fn create_api_client(
    config: ClientConfig,
    token: Option<AccessToken>,
    manager: Arc<TokenManager>,
) -> Result<ApiClient> {
    ApiClient::new(config, token, manager)
}

impl ApiClient {
    pub fn new(
        config: ClientConfig,
        token: Option<AccessToken>,
        manager: Arc<TokenManager>,
    ) -> Result<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
            manager,
            token: RwLock::new(token),
        })
    }

    /// A client using the context's current token and token manager.
    pub fn from_context(context: &AuthContext, config: ClientConfig) -> Result<Self> {
        Self::new(config, context.state().token, context.manager().clone())
    }

    /// The token the next request will carry.
    pub fn token(&self) -> Option<AccessToken> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_token(&self, token: AccessToken) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    // ========================================================================
    // Endpoints
    // ========================================================================

    /// Check the current token and fetch the account summary.
    pub async fn validate(&self) -> Result<ValidateResponse> {
        self.send::<(), _>(Method::GET, VALIDATE, None).await
    }

    pub async fn subscription_status(&self) -> Result<SubscriptionStatus> {
        self.send::<(), _>(Method::GET, SUBSCRIPTION_STATUS, None).await
    }

    /// Start a checkout for `plan`. Works without a token too.
    pub async fn create_checkout_session(&self, plan: &str) -> Result<RedirectUrl> {
        self.send(
            Method::POST,
            CREATE_CHECKOUT_SESSION,
            Some(&CheckoutRequest { plan }),
        )
        .await
    }

    /// Open the billing portal.
    pub async fn create_portal_session(&self) -> Result<RedirectUrl> {
        self.send(
            Method::POST,
            CREATE_PORTAL_SESSION,
            Some(&serde_json::json!({})),
        )
        .await
    }

    pub async fn reset_portal(&self) -> Result<ResetPortal> {
        self.send::<(), _>(Method::GET, RESET, None).await
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    /// Send a request with the current token, recovering once from a 401.
    #[instrument(skip(self, body))]
    pub async fn send<B, R>(&self, method: Method, path: &str, body: Option<&B>) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let token = self.token();
        match self
            .http
            .send(method.clone(), path, body, token.as_ref())
            .await
        {
            Err(e) if e.is_unauthorized() => {
                let fresh = self.recover().await?;
                debug!("Retrying with renewed token");
                self.http.send(method, path, body, Some(&fresh)).await
            }
            other => other,
        }
    }

    /// Ask the token manager for a usable token after a 401.
    ///
    /// If the manager already signed out while trying, its event stands;
    /// otherwise the credentials are cleared here with `LoginRequired`.
    async fn recover(&self) -> Result<AccessToken> {
        let mut events = self.manager.subscribe();

        match self.manager.get_token().await {
            Some(token) => {
                self.set_token(token.clone());
                Ok(token)
            }
            None => {
                warn!("Unauthorized and no token available");
                let signed_out = std::iter::from_fn(|| events.try_recv().ok())
                    .any(|event| matches!(event, SessionEvent::SignedOut { .. }));
                if !signed_out {
                    self.manager.sign_out(SignOutReason::LoginRequired);
                }
                *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
                info!("Login required");
                Err(AuthError::LoginRequired.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use wellbands_core::{ApiUrl, MultiStorage, RefreshToken, TokenGrant, TokenRefresher};

    struct NoRefresh;

    #[async_trait]
    impl TokenRefresher for NoRefresh {
        async fn refresh(&self, _refresh_token: &RefreshToken) -> Result<TokenGrant> {
            Err(AuthError::RefreshTokenInvalid.into())
        }
    }

    fn manager() -> Arc<TokenManager> {
        Arc::new(TokenManager::new(
            Arc::new(MultiStorage::in_memory()),
            Arc::new(NoRefresh),
        ))
    }

    fn config() -> ClientConfig {
        ClientConfig::new(ApiUrl::new("https://api.wellbands.com").unwrap())
    }

    #[test]
    fn factory_binds_token() {
        let client = create_api_client(config(), Some(AccessToken::new("T1")), manager()).unwrap();
        assert_eq!(client.token(), Some(AccessToken::new("T1")));
    }

    #[test]
    fn from_context_uses_current_state() {
        let context = AuthContext::new(manager());
        let client = ApiClient::from_context(&context, config()).unwrap();
        assert!(client.token().is_none());
    }

    #[tokio::test]
    async fn recover_without_credentials_requires_login() {
        let client = create_api_client(config(), Some(AccessToken::new("T1")), manager()).unwrap();
        let err = client.recover().await.unwrap_err();
        assert!(matches!(
            err,
            wellbands_core::Error::Auth(AuthError::LoginRequired)
        ));
        assert!(client.token().is_none());
    }
}
