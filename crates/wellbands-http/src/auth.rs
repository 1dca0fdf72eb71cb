//! Unauthenticated auth endpoints.

use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, instrument};

use wellbands_core::error::{AuthError, Error};
use wellbands_core::traits::{Authenticator, TokenRefresher};
use wellbands_core::{Credentials, RefreshToken, Registration, Result, TokenGrant};

use crate::client::{ClientConfig, HttpClient};
use crate::endpoints::*;

/// Calls the endpoints that need no bearer token: login, registration,
/// token refresh, password reset and anonymous checkout.
#[derive(Debug, Clone)]
pub struct AuthApi {
    client: HttpClient,
}

impl AuthApi {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(config)?,
        })
    }

    pub fn from_client(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Ask for a password reset email.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        debug!("Requesting password reset");
        self.client
            .send_no_response(
                Method::POST,
                PASSWORD_RESET_REQUEST,
                Some(&PasswordResetRequest { email }),
                None,
            )
            .await
    }

    /// Start a checkout for a visitor who is not signed in.
    #[instrument(skip(self))]
    pub async fn create_checkout_session(&self, plan: &str) -> Result<RedirectUrl> {
        self.client
            .send(
                Method::POST,
                CREATE_CHECKOUT_SESSION,
                Some(&CheckoutRequest { plan }),
                None,
            )
            .await
    }
}

#[async_trait]
impl Authenticator for AuthApi {
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant> {
        let request = LoginRequest {
            email: credentials.email(),
            password: credentials.password(),
            remember_me: credentials.is_remembered(),
        };

        let response: TokenResponse = self
            .client
            .send(Method::POST, LOGIN, Some(&request), None)
            .await?;

        debug!(expires_in = response.expires_in, "Logged in");
        Ok(response.into())
    }

    #[instrument(skip(self, registration), fields(email = %registration.email()))]
    async fn register(&self, registration: &Registration) -> Result<TokenGrant> {
        let request = RegisterRequest {
            email: registration.email(),
            password: registration.password(),
            session_id: registration.session_id(),
        };

        let response: TokenResponse = self
            .client
            .send(Method::POST, REGISTER, Some(&request), None)
            .await?;

        debug!("Registered account");
        Ok(response.into())
    }
}

#[async_trait]
impl TokenRefresher for AuthApi {
    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenGrant> {
        let request = RefreshTokenRequest {
            refresh_token: refresh_token.as_str(),
        };

        let response: TokenResponse = self
            .client
            .send(Method::POST, REFRESH_TOKEN, Some(&request), None)
            .await
            .map_err(|e| match e {
                Error::Protocol(p) if p.is_auth_error() => {
                    debug!(status = p.status, "Refresh token rejected");
                    AuthError::RefreshTokenInvalid.into()
                }
                other => other,
            })?;

        Ok(response.into())
    }
}
