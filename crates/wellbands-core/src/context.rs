//! Observable authentication state.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use crate::events::{SessionEvent, SignOutReason};
use crate::manager::TokenManager;
use crate::storage::{CREDENTIAL_KEYS, LEGACY_TOKEN_KEY};
use crate::traits::Authenticator;
use crate::{AccessToken, Credentials, Registration, Result};

/// A snapshot of who is signed in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub token: Option<AccessToken>,
    pub remembered: bool,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Holds the current session in memory and keeps it in step with storage.
///
/// Cheap to clone; clones share the same state. Consumers watch the state
/// through [`AuthContext::subscribe`].
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    manager: Arc<TokenManager>,
    state: watch::Sender<AuthState>,
}

impl AuthContext {
    pub fn new(manager: Arc<TokenManager>) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        Self {
            inner: Arc::new(ContextInner { manager, state }),
        }
    }

    pub fn manager(&self) -> &Arc<TokenManager> {
        &self.inner.manager
    }

    /// The current state.
    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Watch for state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    /// Load the stored session, renewing it if needed.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Option<AccessToken> {
        let token = self.inner.manager.get_token().await;
        self.publish(token.clone());
        debug!(authenticated = token.is_some(), "Restored session");
        token
    }

    /// Log in and persist the issued tokens.
    ///
    /// # Errors
    ///
    /// Returns the backend's error unchanged (e.g. invalid credentials), so
    /// it can be shown next to the form.
    #[instrument(skip(self, auth, credentials), fields(email = %credentials.email()))]
    pub async fn login(
        &self,
        auth: &dyn Authenticator,
        credentials: &Credentials,
    ) -> Result<AccessToken> {
        let grant = auth.login(credentials).await?;
        self.inner
            .manager
            .sign_in(&grant, credentials.is_remembered());
        self.publish(Some(grant.access_token.clone()));
        Ok(grant.access_token)
    }

    /// Register an account after checkout and sign in with it.
    ///
    /// Registration sessions are always remembered.
    #[instrument(skip(self, auth, registration), fields(email = %registration.email()))]
    pub async fn register(
        &self,
        auth: &dyn Authenticator,
        registration: &Registration,
    ) -> Result<AccessToken> {
        let grant = auth.register(registration).await?;
        self.inner.manager.sign_in(&grant, true);
        self.publish(Some(grant.access_token.clone()));
        Ok(grant.access_token)
    }

    /// Forget the session everywhere.
    pub fn logout(&self) {
        self.inner.manager.storage().remove_item(LEGACY_TOKEN_KEY);
        self.inner.manager.sign_out(SignOutReason::Logout);
        self.publish(None);
        info!("Logged out");
    }

    /// Re-read the credential after another process changed storage.
    ///
    /// Cached copies are dropped first so the shared backends are
    /// consulted. No renewal happens here; the last writer wins.
    pub fn sync_from_storage(&self) -> Option<AccessToken> {
        let storage = self.inner.manager.storage();
        for key in CREDENTIAL_KEYS {
            storage.evict_cached(key);
        }
        let token = self.inner.manager.load().access_token;
        if self.state().token != token {
            debug!(authenticated = token.is_some(), "Session changed in storage");
        }
        self.publish(token.clone());
        token
    }

    /// Follow [`SessionEvent`]s from the token manager until it goes away.
    pub fn spawn_event_listener(&self) -> JoinHandle<()> {
        let context = self.clone();
        let mut events = self.inner.manager.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::SignedOut { .. }) => context.publish(None),
                    Ok(SessionEvent::SignedIn { .. } | SessionEvent::Refreshed) => {
                        let token = context.inner.manager.load().access_token;
                        context.publish(token);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Session events lagged, resyncing");
                        context.sync_from_storage();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn publish(&self, token: Option<AccessToken>) {
        let remembered = token.is_some() && self.inner.manager.is_remembered();
        self.inner
            .state
            .send_replace(AuthState { token, remembered });
    }
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("authenticated", &self.state().is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{AuthError, ProtocolError};
    use crate::storage::{MemoryStorage, MultiStorage, TOKEN_KEY};
    use crate::traits::{ManualClock, TokenRefresher};
    use crate::{RefreshToken, TokenGrant};

    struct FakeBackend;

    #[async_trait]
    impl Authenticator for FakeBackend {
        async fn login(&self, credentials: &Credentials) -> Result<TokenGrant> {
            if credentials.password() != "x" {
                return Err(ProtocolError::new(
                    401,
                    None,
                    Some("Invalid email or password".to_string()),
                )
                .into());
            }
            Ok(TokenGrant {
                access_token: AccessToken::new("T1"),
                refresh_token: Some(RefreshToken::new("R1")),
                expires_in: 3600,
            })
        }

        async fn register(&self, _registration: &Registration) -> Result<TokenGrant> {
            Ok(TokenGrant {
                access_token: AccessToken::new("REG"),
                refresh_token: Some(RefreshToken::new("REG-R")),
                expires_in: 3600,
            })
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeBackend {
        async fn refresh(&self, _refresh_token: &RefreshToken) -> Result<TokenGrant> {
            Err(AuthError::RefreshTokenInvalid.into())
        }
    }

    fn context() -> (AuthContext, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let storage = Arc::new(MultiStorage::new(vec![Arc::new(MemoryStorage::new())]));
        let manager = TokenManager::new(storage, Arc::new(FakeBackend))
            .with_clock(Arc::new(clock.clone()));
        (AuthContext::new(Arc::new(manager)), clock)
    }

    #[tokio::test]
    async fn login_updates_state() {
        let (context, _) = context();
        let mut rx = context.subscribe();
        let creds = Credentials::new("a@b.com", "x").unwrap().remember_me(true);

        let token = context.login(&FakeBackend, &creds).await.unwrap();

        assert_eq!(token, AccessToken::new("T1"));
        rx.changed().await.unwrap();
        let state = rx.borrow().clone();
        assert!(state.is_authenticated());
        assert!(state.remembered);
    }

    #[tokio::test]
    async fn failed_login_leaves_state_untouched() {
        let (context, _) = context();
        let creds = Credentials::new("a@b.com", "wrong").unwrap();

        let err = context.login(&FakeBackend, &creds).await.unwrap_err();

        assert!(err.to_string().contains("Invalid email or password"));
        assert!(!context.state().is_authenticated());
    }

    #[tokio::test]
    async fn register_is_remembered() {
        let (context, _) = context();
        let reg = Registration::new("a@b.com", "x", "cs_test_1").unwrap();

        context.register(&FakeBackend, &reg).await.unwrap();

        assert!(context.manager().is_remembered());
        assert!(context.state().remembered);
    }

    #[tokio::test]
    async fn logout_clears_legacy_key() {
        let (context, _) = context();
        context
            .manager()
            .storage()
            .set_item(LEGACY_TOKEN_KEY, "old", true);
        let creds = Credentials::new("a@b.com", "x").unwrap();
        context.login(&FakeBackend, &creds).await.unwrap();

        context.logout();

        assert!(!context.state().is_authenticated());
        assert!(
            context
                .manager()
                .storage()
                .get_item(LEGACY_TOKEN_KEY)
                .is_none()
        );
        assert!(context.manager().load().access_token.is_none());
    }

    #[tokio::test]
    async fn restore_after_failed_refresh_is_signed_out() {
        let (context, clock) = context();
        let creds = Credentials::new("a@b.com", "x").unwrap().remember_me(true);
        context.login(&FakeBackend, &creds).await.unwrap();

        clock.advance(Duration::from_secs(3600));

        assert!(context.restore().await.is_none());
        assert!(!context.state().is_authenticated());
    }

    #[tokio::test]
    async fn sync_picks_up_external_write() {
        let (context, _) = context();
        context
            .manager()
            .storage()
            .set_item(TOKEN_KEY, "FROM-OTHER-TAB", false);

        let token = context.sync_from_storage();

        assert_eq!(token, Some(AccessToken::new("FROM-OTHER-TAB")));
        assert!(context.state().is_authenticated());
    }

    #[tokio::test]
    async fn event_listener_follows_sign_out() {
        let (context, _) = context();
        let creds = Credentials::new("a@b.com", "x").unwrap();
        context.login(&FakeBackend, &creds).await.unwrap();
        let listener = context.spawn_event_listener();
        let mut rx = context.subscribe();

        context.manager().sign_out(SignOutReason::LoginRequired);

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!context.state().is_authenticated());
        listener.abort();
    }
}
