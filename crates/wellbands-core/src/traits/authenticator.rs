//! Login/registration trait.

use async_trait::async_trait;

use crate::{Credentials, Registration, Result, TokenGrant};

/// Obtains a first token set from the backend.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Exchange an email and password for tokens.
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant>;

    /// Create an account tied to a completed checkout session.
    async fn register(&self, registration: &Registration) -> Result<TokenGrant>;
}
