//! File-backed local and session storage.

use std::path::Path;

use wellbands_core::Result;
use wellbands_core::traits::{BackendKind, Persistence, StorageBackend};

use crate::store::JsonFileStore;

/// File name of the local storage map inside the data directory.
pub const LOCAL_STORAGE_FILE: &str = "local-storage.json";

/// File name of the session storage map inside the session directory.
pub const SESSION_STORAGE_FILE: &str = "session-storage.json";

/// Durable key/value storage that survives restarts.
///
/// Only takes [`Persistence::Durable`] writes.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    store: JsonFileStore<String>,
}

impl LocalStorage {
    /// Open local storage in the given data directory.
    pub fn open(data_dir: impl AsRef<Path>) -> Self {
        Self {
            store: JsonFileStore::new(data_dir.as_ref().join(LOCAL_STORAGE_FILE)),
        }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }
}

impl StorageBackend for LocalStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, _persistence: Persistence) -> Result<()> {
        self.store
            .update(|map| map.insert(key.to_string(), value.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        // Avoid creating the file just to remove from it.
        if !self.store.path().exists() {
            return Ok(());
        }
        self.store.update(|map| map.remove(key))?;
        Ok(())
    }

    fn accepts(&self, persistence: Persistence) -> bool {
        persistence.is_durable()
    }
}

/// Storage scoped to one login session.
///
/// Lives in a session directory that is expected to be discarded when
/// the session ends (a runtime or temporary directory). Only takes
/// [`Persistence::Ephemeral`] writes.
#[derive(Debug, Clone)]
pub struct SessionStorage {
    store: JsonFileStore<String>,
}

impl SessionStorage {
    /// Open session storage in the given session directory.
    pub fn open(session_dir: impl AsRef<Path>) -> Self {
        Self {
            store: JsonFileStore::new(session_dir.as_ref().join(SESSION_STORAGE_FILE)),
        }
    }

    pub fn path(&self) -> &Path {
        self.store.path()
    }
}

impl StorageBackend for SessionStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Session
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.read()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, _persistence: Persistence) -> Result<()> {
        self.store
            .update(|map| map.insert(key.to_string(), value.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        if !self.store.path().exists() {
            return Ok(());
        }
        self.store.update(|map| map.remove(key))?;
        Ok(())
    }

    fn accepts(&self, persistence: Persistence) -> bool {
        !persistence.is_durable()
    }
}
