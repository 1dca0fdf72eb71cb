//! Cookie jar backend.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use wellbands_core::Result;
use wellbands_core::error::StorageError;
use wellbands_core::traits::{BackendKind, Clock, Persistence, StorageBackend, SystemClock};

use crate::store::JsonFileStore;

/// File name of the cookie jar inside the data directory.
pub const COOKIE_JAR_FILE: &str = "cookies.json";

/// Lifetime of a cookie written for a session that is not remembered.
pub const SESSION_COOKIE_DAYS: i64 = 1;

/// Lifetime of a cookie written for a remembered session.
pub const PERSISTENT_COOKIE_DAYS: i64 = 30;

/// A stored cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub value: String,
    pub expires: DateTime<Utc>,
}

impl Cookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }
}

/// A cookie jar that takes every write.
///
/// Remembered values get a 30-day cookie that is saved to the jar file.
/// Other values get a 1-day cookie that is held only by this jar instance
/// and never touches disk, like a browser session cookie. Expired cookies
/// are never returned.
pub struct CookieJar {
    store: JsonFileStore<Cookie>,
    session: RwLock<HashMap<String, Cookie>>,
    clock: Arc<dyn Clock>,
}

impl CookieJar {
    /// Open the cookie jar in the given data directory.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            store: JsonFileStore::new(data_dir.as_ref().join(COOKIE_JAR_FILE)),
            session: RwLock::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different clock for cookie expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.clock.now_ms()).unwrap_or_else(Utc::now)
    }

    /// The full cookie for a key, including its expiry.
    pub fn cookie(&self, key: &str) -> Result<Option<Cookie>> {
        let now = self.now();

        let session = self.session.read().map_err(|_| StorageError::Poisoned)?;
        if let Some(cookie) = session.get(key).filter(|c| !c.is_expired(now)) {
            return Ok(Some(cookie.clone()));
        }
        drop(session);

        let cookies = self.store.read()?;
        match cookies.get(key) {
            Some(cookie) if !cookie.is_expired(now) => Ok(Some(cookie.clone())),
            Some(_) => {
                debug!(key, "Dropping expired cookie");
                self.store.update(|map| map.remove(key))?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

impl StorageBackend for CookieJar {
    fn kind(&self) -> BackendKind {
        BackendKind::Cookie
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cookie(key)?.map(|c| c.value))
    }

    fn set(&self, key: &str, value: &str, persistence: Persistence) -> Result<()> {
        let days = match persistence {
            Persistence::Durable => PERSISTENT_COOKIE_DAYS,
            Persistence::Ephemeral => SESSION_COOKIE_DAYS,
        };
        let cookie = Cookie {
            value: value.to_string(),
            expires: self.now() + Duration::days(days),
        };

        let mut session = self.session.write().map_err(|_| StorageError::Poisoned)?;
        match persistence {
            Persistence::Durable => {
                session.remove(key);
                drop(session);
                self.store
                    .update(|map| map.insert(key.to_string(), cookie))?;
            }
            Persistence::Ephemeral => {
                session.insert(key.to_string(), cookie);
                drop(session);
                if self.store.path().exists() {
                    self.store.update(|map| map.remove(key))?;
                }
            }
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.session
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .remove(key);
        if self.store.path().exists() {
            self.store.update(|map| map.remove(key))?;
        }
        Ok(())
    }

    /// Session cookies are this process's own; the jar file is shared.
    fn evict(&self, key: &str) -> Result<()> {
        self.session
            .write()
            .map_err(|_| StorageError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

impl std::fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieJar")
            .field("path", &self.store.path())
            .finish()
    }
}
