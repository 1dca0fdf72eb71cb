//! Token lifecycle: storage, expiry tracking and renewal.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::events::{SessionEvent, SignOutReason};
use crate::storage::{
    CREDENTIAL_KEYS, EXPIRY_KEY, MultiStorage, REFRESH_TOKEN_KEY, REMEMBER_ME_KEY, StorageOp,
    TOKEN_KEY,
};
use crate::traits::{Clock, SystemClock, TokenRefresher};
use crate::{AccessToken, RefreshToken, TokenGrant};

/// Tokens are renewed this long before they actually expire.
pub const RENEWAL_BUFFER_MS: i64 = 5 * 60 * 1000;

const EVENT_CAPACITY: usize = 16;

/// The credential as currently persisted.
#[derive(Debug, Clone, Default)]
pub struct StoredCredential {
    pub access_token: Option<AccessToken>,
    pub refresh_token: Option<RefreshToken>,
    pub expiry_ms: Option<i64>,
    pub remember_me: bool,
}

impl StoredCredential {
    /// The access token expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expiry_ms.and_then(DateTime::from_timestamp_millis)
    }
}

/// Persists the session credential and renews it on demand.
///
/// All four credential keys are written and read as one batch, so
/// concurrent callers never observe a partially written set. Renewal is
/// not deduplicated: concurrent callers that both find the token inside
/// the renewal window each call the refresh endpoint, and the response
/// that lands last is the one that stays stored.
pub struct TokenManager {
    storage: Arc<MultiStorage>,
    refresher: Arc<dyn TokenRefresher>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<SessionEvent>,
}

impl TokenManager {
    pub fn new(storage: Arc<MultiStorage>, refresher: Arc<dyn TokenRefresher>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            storage,
            refresher,
            clock: Arc::new(SystemClock),
            events,
        }
    }

    /// Use a different clock (tests drive expiry with a manual one).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn storage(&self) -> &Arc<MultiStorage> {
        &self.storage
    }

    /// Subscribe to session lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Persist a token set.
    ///
    /// The expiry is computed from the current time. The refresh token is
    /// stored only when `remember_me` is set; otherwise any previously
    /// stored refresh token is removed.
    pub fn set_tokens(
        &self,
        access_token: &AccessToken,
        refresh_token: Option<&RefreshToken>,
        expires_in_secs: u64,
        remember_me: bool,
    ) {
        let lifetime_ms = i64::try_from(expires_in_secs)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let expiry_ms = self.clock.now_ms().saturating_add(lifetime_ms);
        let expiry = expiry_ms.to_string();
        let remember = remember_me.to_string();

        let refresh_op = match refresh_token {
            Some(token) if remember_me => StorageOp::Set(REFRESH_TOKEN_KEY, token.as_str()),
            _ => StorageOp::Remove(REFRESH_TOKEN_KEY),
        };

        self.storage.apply(
            &[
                StorageOp::Set(TOKEN_KEY, access_token.as_str()),
                StorageOp::Set(EXPIRY_KEY, &expiry),
                StorageOp::Set(REMEMBER_ME_KEY, &remember),
                refresh_op,
            ],
            remember_me,
        );

        debug!(expiry_ms, remember_me, "Stored tokens");
    }

    /// Persist a freshly issued grant from a login or registration.
    pub fn sign_in(&self, grant: &TokenGrant, remember_me: bool) {
        self.set_tokens(
            &grant.access_token,
            grant.refresh_token.as_ref(),
            grant.expires_in,
            remember_me,
        );
        info!(remember_me, "Signed in");
        self.publish(SessionEvent::SignedIn {
            remembered: remember_me,
        });
    }

    /// Return a currently valid access token, renewing it when it is within
    /// [`RENEWAL_BUFFER_MS`] of expiry.
    ///
    /// Returns `None`, after clearing all stored credentials, when renewal
    /// is needed but impossible or fails.
    #[instrument(skip(self))]
    pub async fn get_token(&self) -> Option<AccessToken> {
        let stored = self.load();
        let access_token = stored.access_token?;

        let now = self.clock.now_ms();
        if let Some(expiry) = stored.expiry_ms
            && now + RENEWAL_BUFFER_MS < expiry
        {
            return Some(access_token);
        }

        debug!(now, expiry = ?stored.expiry_ms, "Access token needs renewal");

        match stored.refresh_token {
            Some(refresh_token) if stored.remember_me => self.refresh_token(&refresh_token).await,
            _ => {
                info!("No refresh token stored, discarding expired session");
                self.sign_out(SignOutReason::SessionExpired);
                None
            }
        }
    }

    /// Exchange a refresh token for a new token set.
    ///
    /// One attempt only. On success the new set is stored with the
    /// previously recorded "remember me" flag; on failure every stored
    /// credential is cleared.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_token(&self, refresh_token: &RefreshToken) -> Option<AccessToken> {
        let remember_me = self.is_remembered();

        match self.refresher.refresh(refresh_token).await {
            Ok(grant) => {
                // Keep the presented token if the backend did not rotate it.
                let next_refresh = grant
                    .refresh_token
                    .clone()
                    .unwrap_or_else(|| refresh_token.clone());
                self.set_tokens(
                    &grant.access_token,
                    Some(&next_refresh),
                    grant.expires_in,
                    remember_me,
                );
                info!("Access token refreshed");
                self.publish(SessionEvent::Refreshed);
                Some(grant.access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.sign_out(SignOutReason::RefreshFailed);
                None
            }
        }
    }

    /// Remove all four credential keys from every backend.
    pub fn clear_tokens(&self) {
        let ops = CREDENTIAL_KEYS.map(StorageOp::Remove);
        self.storage.apply(&ops, false);
        debug!("Cleared stored tokens");
    }

    /// Clear the credential and tell subscribers why.
    pub fn sign_out(&self, reason: SignOutReason) {
        self.clear_tokens();
        info!(%reason, "Signed out");
        self.publish(SessionEvent::SignedOut { reason });
    }

    /// The persisted "remember me" flag.
    pub fn is_remembered(&self) -> bool {
        self.storage.get_item(REMEMBER_ME_KEY).as_deref() == Some("true")
    }

    /// Read the stored credential without renewing it.
    pub fn load(&self) -> StoredCredential {
        let values = self.storage.get_items(&CREDENTIAL_KEYS);
        let [token, refresh, expiry, remember]: [Option<String>; 4] = values
            .try_into()
            .unwrap_or_else(|_| Default::default());

        StoredCredential {
            access_token: token.map(AccessToken::new),
            refresh_token: refresh.map(RefreshToken::new),
            expiry_ms: expiry.and_then(|e| e.parse().ok()),
            remember_me: remember.as_deref() == Some("true"),
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("storage", &self.storage)
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::Result;
    use crate::error::{AuthError, ProtocolError};
    use crate::storage::MemoryStorage;
    use crate::traits::{BackendKind, ManualClock, StorageBackend};

    const START_MS: i64 = 1_700_000_000_000;

    /// Hands out scripted responses and counts calls.
    #[derive(Default)]
    struct ScriptedRefresher {
        responses: Mutex<Vec<Result<TokenGrant>>>,
        calls: AtomicUsize,
    }

    impl ScriptedRefresher {
        fn with(responses: Vec<Result<TokenGrant>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for ScriptedRefresher {
        async fn refresh(&self, _refresh_token: &RefreshToken) -> Result<TokenGrant> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(AuthError::RefreshTokenInvalid.into());
            }
            responses.remove(0)
        }
    }

    fn grant(access: &str, refresh: &str, expires_in: u64) -> Result<TokenGrant> {
        Ok(TokenGrant {
            access_token: AccessToken::new(access),
            refresh_token: Some(RefreshToken::new(refresh)),
            expires_in,
        })
    }

    fn manager(refresher: Arc<ScriptedRefresher>) -> (TokenManager, ManualClock) {
        let clock = ManualClock::new(START_MS);
        let storage = Arc::new(MultiStorage::new(vec![Arc::new(MemoryStorage::new())]));
        let manager = TokenManager::new(storage, refresher).with_clock(Arc::new(clock.clone()));
        (manager, clock)
    }

    #[test]
    fn set_tokens_computes_expiry() {
        let (manager, _) = manager(ScriptedRefresher::with(vec![]));
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            3600,
            true,
        );

        let stored = manager.load();
        assert_eq!(stored.access_token, Some(AccessToken::new("T1")));
        assert_eq!(stored.refresh_token, Some(RefreshToken::new("R1")));
        assert_eq!(stored.expiry_ms, Some(START_MS + 3_600_000));
        assert!(stored.remember_me);
        assert!(manager.is_remembered());
    }

    #[tokio::test]
    async fn oversized_lifetime_saturates() {
        let refresher = ScriptedRefresher::with(vec![]);
        let (manager, _) = manager(refresher.clone());
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            u64::MAX,
            true,
        );

        assert_eq!(manager.load().expiry_ms, Some(i64::MAX));
        assert_eq!(manager.get_token().await, Some(AccessToken::new("T1")));
        assert_eq!(refresher.calls(), 0);
    }

    #[test]
    fn refresh_token_dropped_without_remember_me() {
        let (manager, _) = manager(ScriptedRefresher::with(vec![]));
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            3600,
            false,
        );

        let stored = manager.load();
        assert!(stored.refresh_token.is_none());
        assert!(!manager.is_remembered());
    }

    #[tokio::test]
    async fn fresh_token_does_not_refresh() {
        let refresher = ScriptedRefresher::with(vec![grant("T2", "R2", 3600)]);
        let (manager, clock) = manager(refresher.clone());
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            3600,
            true,
        );

        clock.advance(Duration::from_secs(3600 - 301));
        assert_eq!(manager.get_token().await, Some(AccessToken::new("T1")));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn token_inside_buffer_is_refreshed() {
        let refresher = ScriptedRefresher::with(vec![grant("T2", "R2", 3600)]);
        let (manager, clock) = manager(refresher.clone());
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            3600,
            true,
        );
        assert_eq!(manager.get_token().await, Some(AccessToken::new("T1")));

        clock.advance(Duration::from_secs(3600 - 250));
        assert_eq!(manager.get_token().await, Some(AccessToken::new("T2")));
        assert_eq!(refresher.calls(), 1);

        let stored = manager.load();
        assert_eq!(stored.refresh_token, Some(RefreshToken::new("R2")));
        assert!(stored.remember_me);
        assert_eq!(stored.expiry_ms, Some(clock.now_ms() + 3_600_000));
    }

    #[tokio::test]
    async fn exact_buffer_boundary_refreshes() {
        let refresher = ScriptedRefresher::with(vec![grant("T2", "R2", 3600)]);
        let (manager, clock) = manager(refresher.clone());
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            3600,
            true,
        );

        clock.advance(Duration::from_secs(3600 - 300));
        assert_eq!(manager.get_token().await, Some(AccessToken::new("T2")));
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn expired_without_refresh_token_clears() {
        let refresher = ScriptedRefresher::with(vec![grant("T2", "R2", 3600)]);
        let (manager, clock) = manager(refresher.clone());
        let mut events = manager.subscribe();
        manager.set_tokens(&AccessToken::new("T1"), None, 3600, false);

        clock.advance(Duration::from_secs(3600));
        assert!(manager.get_token().await.is_none());
        assert_eq!(refresher.calls(), 0);
        assert!(manager.load().access_token.is_none());
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedOut {
                reason: SignOutReason::SessionExpired
            }
        );
    }

    #[tokio::test]
    async fn failed_refresh_clears_every_key() {
        let refresher = ScriptedRefresher::with(vec![Err(
            ProtocolError::new(401, None, None).into()
        )]);
        let (manager, clock) = manager(refresher.clone());
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            60,
            true,
        );

        clock.advance(Duration::from_secs(61));
        assert!(manager.get_token().await.is_none());
        assert_eq!(refresher.calls(), 1);

        let memory = manager.storage().backend(BackendKind::Memory).unwrap();
        for key in CREDENTIAL_KEYS {
            assert!(memory.get(key).unwrap().is_none(), "{key} left behind");
        }
    }

    #[tokio::test]
    async fn missing_expiry_counts_as_expired() {
        let refresher = ScriptedRefresher::with(vec![]);
        let (manager, _) = manager(refresher.clone());
        manager.storage().set_item(TOKEN_KEY, "T1", false);

        assert!(manager.get_token().await.is_none());
        assert!(manager.load().access_token.is_none());
    }

    #[tokio::test]
    async fn no_token_returns_none_without_side_effects() {
        let refresher = ScriptedRefresher::with(vec![]);
        let (manager, _) = manager(refresher.clone());
        manager.storage().set_item(REMEMBER_ME_KEY, "true", true);

        assert!(manager.get_token().await.is_none());
        assert!(manager.is_remembered());
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn refresh_keeps_presented_token_when_not_rotated() {
        let refresher = ScriptedRefresher::with(vec![Ok(TokenGrant {
            access_token: AccessToken::new("T2"),
            refresh_token: None,
            expires_in: 3600,
        })]);
        let (manager, _) = manager(refresher);
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            3600,
            true,
        );

        let token = manager.refresh_token(&RefreshToken::new("R1")).await;
        assert_eq!(token, Some(AccessToken::new("T2")));
        assert_eq!(manager.load().refresh_token, Some(RefreshToken::new("R1")));
    }

    #[tokio::test]
    async fn concurrent_renewals_leave_a_complete_set() {
        let refresher = ScriptedRefresher::with(vec![
            grant("T2", "R2", 3600),
            grant("T3", "R3", 7200),
        ]);
        let (manager, clock) = manager(refresher.clone());
        manager.set_tokens(
            &AccessToken::new("T1"),
            Some(&RefreshToken::new("R1")),
            3600,
            true,
        );
        clock.advance(Duration::from_secs(3600 - 100));

        let (a, b) = tokio::join!(manager.get_token(), manager.get_token());
        assert!(a.is_some());
        assert!(b.is_some());

        let stored = manager.load();
        let pair = (
            stored.access_token.unwrap(),
            stored.refresh_token.unwrap(),
            stored.expiry_ms.unwrap(),
        );
        let now = clock.now_ms();
        assert!(
            pair == (AccessToken::new("T2"), RefreshToken::new("R2"), now + 3_600_000)
                || pair == (AccessToken::new("T3"), RefreshToken::new("R3"), now + 7_200_000)
        );
    }

    #[tokio::test]
    async fn sign_in_publishes_event() {
        let (manager, _) = manager(ScriptedRefresher::with(vec![]));
        let mut events = manager.subscribe();

        manager.sign_in(&grant("T1", "R1", 3600).unwrap(), true);

        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::SignedIn { remembered: true }
        );
    }

    #[test]
    fn debug_redacts_tokens() {
        let (manager, _) = manager(ScriptedRefresher::with(vec![]));
        manager.set_tokens(&AccessToken::new("secret-T1"), None, 3600, false);
        let debug = format!("{:?}", manager);
        assert!(!debug.contains("secret-T1"));
    }
}
