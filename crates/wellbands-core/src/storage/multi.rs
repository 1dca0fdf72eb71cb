//! Ranked, redundant storage over several backends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, trace, warn};

use crate::Result;
use crate::traits::{BackendKind, Persistence, StorageBackend};

use super::memory::MemoryStorage;

const CHECK_PREFIX: &str = "__wellbands_check";
const CHECK_VALUE: &str = "1";

static CHECK_SEQ: AtomicU64 = AtomicU64::new(0);

/// One write in a batch applied by [`MultiStorage::apply`].
#[derive(Debug, Clone, Copy)]
pub enum StorageOp<'a> {
    Set(&'a str, &'a str),
    Remove(&'a str),
}

/// Writes every value to all backends that accept it and reads from the
/// highest-priority backend that has it.
///
/// Backends are ordered memory, cookie, local, session. A backend that
/// fails its write/read/delete check at construction is dropped for the
/// lifetime of this value. Errors from a single backend at runtime are
/// logged and skipped.
#[derive(Debug)]
pub struct MultiStorage {
    backends: Vec<Arc<dyn StorageBackend>>,
    // Serializes batches so a group of keys is never observed half-written.
    batch: Mutex<()>,
}

impl MultiStorage {
    /// Check the given backends and keep the available ones in priority order.
    pub fn new(backends: Vec<Arc<dyn StorageBackend>>) -> Self {
        let mut available: Vec<Arc<dyn StorageBackend>> = backends
            .into_iter()
            .filter(|backend| match check_available(backend.as_ref()) {
                Ok(()) => true,
                Err(e) => {
                    warn!(backend = %backend.kind(), error = %e, "Storage backend unavailable");
                    false
                }
            })
            .collect();

        available.sort_by_key(|backend| backend.kind());

        debug!(
            backends = ?available.iter().map(|b| b.kind()).collect::<Vec<_>>(),
            "Storage initialized"
        );

        Self {
            backends: available,
            batch: Mutex::new(()),
        }
    }

    /// Storage with only an in-process memory backend.
    pub fn in_memory() -> Self {
        Self::new(vec![Arc::new(MemoryStorage::new())])
    }

    /// The available backends in priority order.
    pub fn backends(&self) -> impl Iterator<Item = &Arc<dyn StorageBackend>> {
        self.backends.iter()
    }

    /// The available backend of the given kind, if any.
    pub fn backend(&self, kind: BackendKind) -> Option<&Arc<dyn StorageBackend>> {
        self.backends.iter().find(|b| b.kind() == kind)
    }

    /// Write a value to every backend that accepts it.
    ///
    /// Backends that do not accept this persistence have the key removed,
    /// so an older copy written with a different persistence cannot
    /// outlive this write.
    pub fn set_item(&self, key: &str, value: &str, persistent: bool) {
        let _guard = self.lock();
        self.set_unlocked(key, value, Persistence::from_remember_me(persistent));
    }

    /// Read a value from the highest-priority backend that holds it.
    pub fn get_item(&self, key: &str) -> Option<String> {
        let _guard = self.lock();
        self.get_unlocked(key)
    }

    /// Remove a value from every backend.
    pub fn remove_item(&self, key: &str) {
        let _guard = self.lock();
        self.remove_unlocked(key);
    }

    /// Apply a group of writes as one unit with respect to other batches.
    pub fn apply(&self, ops: &[StorageOp<'_>], persistent: bool) {
        let persistence = Persistence::from_remember_me(persistent);
        let _guard = self.lock();
        for op in ops {
            match *op {
                StorageOp::Set(key, value) => self.set_unlocked(key, value, persistence),
                StorageOp::Remove(key) => self.remove_unlocked(key),
            }
        }
    }

    /// Read a group of keys as one unit with respect to batches.
    pub fn get_items(&self, keys: &[&str]) -> Vec<Option<String>> {
        let _guard = self.lock();
        keys.iter().map(|key| self.get_unlocked(key)).collect()
    }

    /// Drop every process-local copy of a key so the next read consults
    /// the backends shared with other processes.
    pub fn evict_cached(&self, key: &str) {
        let _guard = self.lock();
        for backend in &self.backends {
            if let Err(e) = backend.evict(key) {
                warn!(backend = %backend.kind(), key, error = %e, "Failed to evict cached value");
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, so a poisoned lock is still usable.
        self.batch.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_unlocked(&self, key: &str, value: &str, persistence: Persistence) {
        for backend in &self.backends {
            let result = if backend.accepts(persistence) {
                backend.set(key, value, persistence)
            } else {
                backend.remove(key)
            };
            if let Err(e) = result {
                warn!(backend = %backend.kind(), key, error = %e, "Storage write failed");
            }
        }
        trace!(key, ?persistence, "Stored value");
    }

    fn get_unlocked(&self, key: &str) -> Option<String> {
        for backend in &self.backends {
            match backend.get(key) {
                Ok(Some(value)) => {
                    if backend.kind() != BackendKind::Memory {
                        self.backfill_memory(key, &value);
                    }
                    trace!(backend = %backend.kind(), key, "Storage hit");
                    return Some(value);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(backend = %backend.kind(), key, error = %e, "Storage read failed");
                }
            }
        }
        None
    }

    fn remove_unlocked(&self, key: &str) {
        for backend in &self.backends {
            if let Err(e) = backend.remove(key) {
                warn!(backend = %backend.kind(), key, error = %e, "Storage remove failed");
            }
        }
    }

    fn backfill_memory(&self, key: &str, value: &str) {
        if let Some(memory) = self.backend(BackendKind::Memory)
            && let Err(e) = memory.set(key, value, Persistence::Ephemeral)
        {
            warn!(key, error = %e, "Failed to backfill memory storage");
        }
    }
}

/// A key no other process or check uses, so concurrent checks of a shared
/// backend cannot delete each other's writes.
fn check_key() -> String {
    let seq = CHECK_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}_{}__", CHECK_PREFIX, std::process::id(), seq)
}

/// Write, read back and delete a scratch key.
fn check_available(backend: &dyn StorageBackend) -> Result<()> {
    let persistence = if backend.accepts(Persistence::Durable) {
        Persistence::Durable
    } else {
        Persistence::Ephemeral
    };

    let key = check_key();
    backend.set(&key, CHECK_VALUE, persistence)?;
    let read = backend.get(&key)?;
    backend.remove(&key)?;

    if read.as_deref() == Some(CHECK_VALUE) {
        Ok(())
    } else {
        Err(crate::error::StorageError::Unavailable {
            backend: backend.kind().to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;

    /// A memory map posing as another backend kind.
    #[derive(Debug)]
    struct FakeBackend {
        kind: BackendKind,
        only: Option<Persistence>,
        broken: bool,
        // Holds values in this process only, like session cookies.
        process_local: bool,
        inner: MemoryStorage,
    }

    impl FakeBackend {
        fn new(kind: BackendKind, only: Option<Persistence>) -> Arc<Self> {
            Arc::new(Self {
                kind,
                only,
                broken: false,
                process_local: false,
                inner: MemoryStorage::new(),
            })
        }

        fn process_local(kind: BackendKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                only: None,
                broken: false,
                process_local: true,
                inner: MemoryStorage::new(),
            })
        }

        fn broken(kind: BackendKind) -> Arc<Self> {
            Arc::new(Self {
                kind,
                only: None,
                broken: true,
                process_local: false,
                inner: MemoryStorage::new(),
            })
        }
    }

    impl StorageBackend for FakeBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn get(&self, key: &str) -> Result<Option<String>> {
            if self.broken {
                return Err(StorageError::Unavailable {
                    backend: self.kind.to_string(),
                }
                .into());
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str, persistence: Persistence) -> Result<()> {
            if self.broken {
                return Err(StorageError::Unavailable {
                    backend: self.kind.to_string(),
                }
                .into());
            }
            self.inner.set(key, value, persistence)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }

        fn evict(&self, key: &str) -> Result<()> {
            if self.process_local {
                self.inner.remove(key)?;
            }
            Ok(())
        }

        fn accepts(&self, persistence: Persistence) -> bool {
            self.only.is_none_or(|only| only == persistence)
        }
    }

    struct Fixture {
        memory: Arc<MemoryStorage>,
        cookie: Arc<FakeBackend>,
        local: Arc<FakeBackend>,
        session: Arc<FakeBackend>,
        storage: MultiStorage,
    }

    fn fixture() -> Fixture {
        let memory = Arc::new(MemoryStorage::new());
        let cookie = FakeBackend::new(BackendKind::Cookie, None);
        let local = FakeBackend::new(BackendKind::Local, Some(Persistence::Durable));
        let session = FakeBackend::new(BackendKind::Session, Some(Persistence::Ephemeral));
        // Deliberately out of order; construction sorts by priority.
        let storage = MultiStorage::new(vec![
            session.clone(),
            local.clone(),
            memory.clone(),
            cookie.clone(),
        ]);
        Fixture {
            memory,
            cookie,
            local,
            session,
            storage,
        }
    }

    #[test]
    fn backends_are_sorted_by_priority() {
        let f = fixture();
        let kinds: Vec<_> = f.storage.backends().map(|b| b.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                BackendKind::Memory,
                BackendKind::Cookie,
                BackendKind::Local,
                BackendKind::Session
            ]
        );
    }

    #[test]
    fn persistent_write_skips_session_storage() {
        let f = fixture();
        f.storage.set_item("k", "v", true);

        assert_eq!(f.memory.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(f.cookie.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(f.local.get("k").unwrap().as_deref(), Some("v"));
        assert!(f.session.get("k").unwrap().is_none());
    }

    #[test]
    fn ephemeral_write_skips_local_storage() {
        let f = fixture();
        f.storage.set_item("k", "v", false);

        assert_eq!(f.cookie.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(f.session.get("k").unwrap().as_deref(), Some("v"));
        assert!(f.local.get("k").unwrap().is_none());
    }

    #[test]
    fn ephemeral_write_replaces_stale_durable_copy() {
        let f = fixture();
        f.storage.set_item("k", "old", true);
        f.storage.set_item("k", "new", false);

        assert!(f.local.get("k").unwrap().is_none());
        assert_eq!(f.storage.get_item("k").as_deref(), Some("new"));
    }

    #[test]
    fn read_falls_through_and_backfills_memory() {
        let f = fixture();
        f.local.set("k", "from-local", Persistence::Durable).unwrap();

        assert_eq!(f.storage.get_item("k").as_deref(), Some("from-local"));
        assert_eq!(f.memory.get("k").unwrap().as_deref(), Some("from-local"));
    }

    #[test]
    fn read_prefers_higher_priority_backend() {
        let f = fixture();
        f.session.set("k", "session", Persistence::Ephemeral).unwrap();
        f.cookie.set("k", "cookie", Persistence::Ephemeral).unwrap();

        assert_eq!(f.storage.get_item("k").as_deref(), Some("cookie"));
    }

    #[test]
    fn remove_clears_every_backend() {
        let f = fixture();
        f.storage.set_item("k", "v", true);
        f.session.set("k", "v", Persistence::Ephemeral).unwrap();

        f.storage.remove_item("k");

        assert!(f.memory.get("k").unwrap().is_none());
        assert!(f.cookie.get("k").unwrap().is_none());
        assert!(f.local.get("k").unwrap().is_none());
        assert!(f.session.get("k").unwrap().is_none());
    }

    #[test]
    fn broken_backend_is_dropped_at_construction() {
        let memory = Arc::new(MemoryStorage::new());
        let storage = MultiStorage::new(vec![memory, FakeBackend::broken(BackendKind::Cookie)]);

        assert!(storage.backend(BackendKind::Cookie).is_none());
        storage.set_item("k", "v", true);
        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
    }

    #[test]
    fn check_key_is_not_left_behind() {
        let f = fixture();
        assert!(f.memory.is_empty());
        assert!(f.local.inner.is_empty());
        assert!(f.cookie.inner.is_empty());
    }

    #[test]
    fn apply_writes_and_removes_in_one_batch() {
        let f = fixture();
        f.storage.set_item("gone", "x", true);
        f.storage.apply(
            &[StorageOp::Set("a", "1"), StorageOp::Remove("gone")],
            true,
        );

        assert_eq!(
            f.storage.get_items(&["a", "gone"]),
            vec![Some("1".to_string()), None]
        );
    }

    #[test]
    fn evict_cached_rereads_shared_backends() {
        let f = fixture();
        f.storage.set_item("k", "mine", true);
        // Another process rewrites the shared backend.
        f.local.set("k", "theirs", Persistence::Durable).unwrap();
        f.cookie.remove("k").unwrap();

        assert_eq!(f.storage.get_item("k").as_deref(), Some("mine"));
        f.storage.evict_cached("k");
        assert_eq!(f.storage.get_item("k").as_deref(), Some("theirs"));
    }

    #[test]
    fn evict_cached_drops_process_local_copies() {
        let memory = Arc::new(MemoryStorage::new());
        let jar = FakeBackend::process_local(BackendKind::Cookie);
        let shared = FakeBackend::new(BackendKind::Session, None);
        let storage = MultiStorage::new(vec![memory.clone(), jar.clone(), shared.clone()]);

        storage.set_item("k", "v", false);
        // Another process clears the shared backend.
        shared.remove("k").unwrap();

        assert_eq!(storage.get_item("k").as_deref(), Some("v"));
        storage.evict_cached("k");
        assert!(jar.get("k").unwrap().is_none());
        assert!(storage.get_item("k").is_none());
    }

    #[test]
    fn check_keys_are_unique_per_process_and_call() {
        let first = check_key();
        let second = check_key();
        assert_ne!(first, second);
        assert!(first.contains(&std::process::id().to_string()));
    }
}
