//! wellbands-file - Filesystem-backed storage backends.
//!
//! Stand-ins for the browser's cookie jar, `localStorage` and
//! `sessionStorage`, plus a watcher that reports when another process
//! changes the shared files.

mod cookie;
mod store;
mod watcher;
mod web_storage;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use wellbands_core::{MemoryStorage, MultiStorage, StorageBackend};

pub use cookie::{COOKIE_JAR_FILE, Cookie, CookieJar, PERSISTENT_COOKIE_DAYS, SESSION_COOKIE_DAYS};
pub use watcher::{StorageChange, StorageWatcher};
pub use web_storage::{LOCAL_STORAGE_FILE, LocalStorage, SESSION_STORAGE_FILE, SessionStorage};

/// Where the file-backed backends live.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    data_dir: PathBuf,
    session_dir: PathBuf,
}

impl StorageLayout {
    /// Durable files go in `data_dir`, session-scoped files in `session_dir`.
    pub fn new(data_dir: impl AsRef<Path>, session_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            session_dir: session_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// A fresh memory backend plus the three file backends.
    pub fn backends(&self) -> Vec<Arc<dyn StorageBackend>> {
        vec![
            Arc::new(MemoryStorage::new()),
            Arc::new(CookieJar::open(&self.data_dir)),
            Arc::new(LocalStorage::open(&self.data_dir)),
            Arc::new(SessionStorage::open(&self.session_dir)),
        ]
    }

    /// Check the backends and combine them.
    pub fn open(&self) -> MultiStorage {
        MultiStorage::new(self.backends())
    }

    /// Files shared with other processes, for [`StorageWatcher`].
    ///
    /// The session file is shared by every process using the same
    /// session directory.
    pub fn shared_files(&self) -> Vec<PathBuf> {
        vec![
            self.data_dir.join(COOKIE_JAR_FILE),
            self.data_dir.join(LOCAL_STORAGE_FILE),
            self.session_dir.join(SESSION_STORAGE_FILE),
        ]
    }
}
