//! Low-level HTTP client for the Wellbands backend.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use wellbands_core::error::{Error, InvalidInputError, ProtocolError, TransportError};
use wellbands_core::{AccessToken, ApiUrl, Result};

use crate::endpoints::ErrorResponse;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings shared by every client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: ApiUrl,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: ApiUrl) -> Self {
        Self {
            api_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// HTTP client bound to a base URL. Requests carry a bearer token only
/// when one is passed.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpClient {
    /// Create a client for the configured backend.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("wellbands/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Http {
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send a request and decode a JSON response.
    #[instrument(skip(self, body, bearer), fields(api = %self.config.api_url))]
    pub async fn send<B, R>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&AccessToken>,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.execute(method, path, body, bearer).await?;
        let status = response.status();
        trace!(%status, "Response");

        if status.is_success() {
            response.json::<R>().await.map_err(|e| self.map_error(e))
        } else {
            Err(Error::Protocol(Self::parse_error_response(response).await))
        }
    }

    /// Send a request whose response body is not needed.
    #[instrument(skip(self, body, bearer), fields(api = %self.config.api_url))]
    pub async fn send_no_response<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&AccessToken>,
    ) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self.execute(method, path, body, bearer).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Error::Protocol(Self::parse_error_response(response).await))
        }
    }

    async fn execute<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        bearer: Option<&AccessToken>,
    ) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.config.api_url.endpoint(path);
        debug!(%method, path, authed = bearer.is_some(), "Request");

        let mut request = self.client.request(method, &url);
        if let Some(token) = bearer {
            request = request.header(AUTHORIZATION, bearer_header(token)?);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| self.map_error(e))
    }

    fn map_error(&self, err: reqwest::Error) -> Error {
        let transport = if err.is_timeout() {
            TransportError::Timeout {
                duration_ms: self.config.timeout.as_millis() as u64,
            }
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        };
        Error::Transport(transport)
    }

    /// Parse an error body, tolerating anything that is not the usual JSON.
    async fn parse_error_response(response: reqwest::Response) -> ProtocolError {
        let status = response.status().as_u16();

        match response.json::<ErrorResponse>().await {
            Ok(body) => ProtocolError::new(status, body.error, body.message),
            Err(_) => ProtocolError::new(status, None, None),
        }
    }
}

/// `Authorization: Bearer <token>`.
fn bearer_header(token: &AccessToken) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_str())).map_err(|_| {
        InvalidInputError::Header {
            reason: "access token contains characters not allowed in a header".to_string(),
        }
    })?;
    value.set_sensitive(true);
    Ok(value)
}
