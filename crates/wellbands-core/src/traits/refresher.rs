//! Token refresher trait.

use async_trait::async_trait;

use crate::{RefreshToken, Result, TokenGrant};

/// Exchanges a refresh token for a new token set.
///
/// Implementations make exactly one attempt per call; retrying is the
/// caller's decision.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Request a rotated token set for the given refresh token.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenGrant>;
}
