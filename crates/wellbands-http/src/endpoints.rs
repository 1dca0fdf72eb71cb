//! Endpoint paths and request/response types.

use serde::{Deserialize, Serialize};

use wellbands_core::{AccessToken, RefreshToken, TokenGrant};

// ============================================================================
// Endpoint Paths
// ============================================================================

pub const LOGIN: &str = "/api/auth/login";

pub const REGISTER: &str = "/api/auth/register";

pub const REFRESH_TOKEN: &str = "/api/auth/refresh-token";

pub const VALIDATE: &str = "/api/auth/validate";

pub const PASSWORD_RESET_REQUEST: &str = "/api/users/password-reset-request";

pub const SUBSCRIPTION_STATUS: &str = "/api/user/subscription-status";

pub const CREATE_CHECKOUT_SESSION: &str = "/api/create-checkout-session";

pub const CREATE_PORTAL_SESSION: &str = "/api/create-portal-session";

/// The reset portal landing data.
pub const RESET: &str = "/api/reset";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for login.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub remember_me: bool,
}

/// Request body for registration.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub session_id: &'a str,
}

/// Request body for refresh-token.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

/// Response from login, register and refresh-token.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: u64,
}

impl From<TokenResponse> for TokenGrant {
    fn from(response: TokenResponse) -> Self {
        TokenGrant {
            access_token: AccessToken::new(response.token),
            refresh_token: response.refresh_token.map(RefreshToken::new),
            expires_in: response.expires_in,
        }
    }
}

/// Request body for password-reset-request.
#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

/// Request body for create-checkout-session.
#[derive(Debug, Serialize)]
pub(crate) struct CheckoutRequest<'a> {
    pub plan: &'a str,
}

/// Response from validate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(default)]
    pub plan: Option<String>,
    /// Any further account fields the backend includes.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response from subscription-status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    pub subscription_status: String,
    #[serde(default)]
    pub has_purchased_basic: bool,
    #[serde(default)]
    pub trial_end_date: Option<String>,
}

/// Response from create-checkout-session and create-portal-session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectUrl {
    pub url: String,
}

/// Response from the reset portal endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPortal {
    pub email: String,
}

/// Error body returned by the backend.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: Option<String>,
    pub message: Option<String>,
}
