//! Change notifications for storage files written by other processes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime};

use futures_util::Stream;
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use wellbands_core::Result;
use wellbands_core::error::{Error, StorageError};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A storage file changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub path: PathBuf,
}

/// Modification time and length; `None` while the file does not exist.
type Fingerprint = Option<(SystemTime, u64)>;

type Fingerprints = Arc<Mutex<HashMap<PathBuf, Fingerprint>>>;

/// Stream of [`StorageChange`]s for a set of files.
///
/// Filesystem events trigger a check immediately; a poll every 500 ms
/// catches anything the platform watcher misses. A change is reported
/// once per distinct file state, whichever path noticed it.
///
/// Dropping the watcher stops its background task and the platform watcher.
pub struct StorageWatcher {
    inner: Pin<Box<dyn Stream<Item = StorageChange> + Send>>,
    task: JoinHandle<()>,
}

impl StorageWatcher {
    /// Watch the given files. Their parent directories are created if
    /// needed so the watcher can be attached before the first write.
    pub fn watch(files: Vec<PathBuf>) -> Result<Self> {
        let fingerprints: Fingerprints = Arc::new(Mutex::new(
            files
                .iter()
                .map(|path| (path.clone(), fingerprint(path)))
                .collect(),
        ));

        let mut dirs: Vec<PathBuf> = files
            .iter()
            .filter_map(|p| p.parent().map(Path::to_path_buf))
            .collect();
        dirs.sort();
        dirs.dedup();

        for dir in &dirs {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::Storage(StorageError::Io {
                    path: dir.display().to_string(),
                    message: e.to_string(),
                })
            })?;
        }

        let (tx, mut rx) = mpsc::channel::<StorageChange>(100);

        let fingerprints_notify = fingerprints.clone();
        let tx_notify = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                trace!(kind = ?event.kind, paths = ?event.paths, "Filesystem event");
                for change in detect_changes(&fingerprints_notify) {
                    let _ = tx_notify.blocking_send(change);
                }
            }
        })
        .map_err(|e| watch_error(format!("failed to create file watcher: {}", e)))?;

        for dir in &dirs {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| watch_error(format!("failed to watch {}: {}", dir.display(), e)))?;
        }

        debug!(files = ?files, "Watching storage files");

        let task = tokio::spawn(async move {
            let _watcher = watcher;
            let mut interval = tokio::time::interval(POLL_INTERVAL);

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = interval.tick() => {}
                }
                for change in detect_changes(&fingerprints) {
                    if tx.send(change).await.is_err() {
                        return;
                    }
                }
            }
            debug!("Storage watcher stopped");
        });

        let stream = async_stream::stream! {
            while let Some(change) = rx.recv().await {
                yield change;
            }
        };

        Ok(Self {
            inner: Box::pin(stream),
            task,
        })
    }
}

impl Stream for StorageWatcher {
    type Item = StorageChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for StorageWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn fingerprint(path: &Path) -> Fingerprint {
    let meta = std::fs::metadata(path).ok()?;
    Some((meta.modified().ok()?, meta.len()))
}

fn detect_changes(fingerprints: &Fingerprints) -> Vec<StorageChange> {
    let Ok(mut known) = fingerprints.lock() else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    for (path, last) in known.iter_mut() {
        let current = fingerprint(path);
        if current != *last {
            *last = current;
            changes.push(StorageChange { path: path.clone() });
        }
    }
    changes
}

fn watch_error(message: String) -> Error {
    Error::Storage(StorageError::Io {
        path: "<watcher>".to_string(),
        message,
    })
}
