//! wellbands-http - HTTP client for the Wellbands backend.
//!
//! [`AuthApi`] covers the unauthenticated endpoints and renews tokens for
//! the [`TokenManager`](wellbands_core::TokenManager). [`ApiClient`] calls
//! the bearer endpoints and recovers once from a 401.

mod api;
mod auth;
mod client;
pub mod endpoints;

pub use api::{ApiClient, create_api_client};
pub use auth::AuthApi;
pub use client::{ClientConfig, DEFAULT_TIMEOUT, HttpClient};
pub use endpoints::{RedirectUrl, ResetPortal, SubscriptionStatus, ValidateResponse};

/// Default production API.
pub const DEFAULT_API_URL: &str = "https://api.wellbands.com";
