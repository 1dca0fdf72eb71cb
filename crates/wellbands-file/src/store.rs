//! Locked JSON map files shared between processes.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{trace, warn};

use wellbands_core::Result;
use wellbands_core::error::{Error, StorageError};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub(crate) fn map_io(path: &Path, err: std::io::Error) -> Error {
    Error::Storage(StorageError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// A JSON object file guarded by an advisory lock file.
///
/// Reads take a shared lock, updates take an exclusive lock and replace
/// the file through a rename, so other processes never see a torn write.
#[derive(Debug, Clone)]
pub(crate) struct JsonFileStore<T> {
    path: PathBuf,
    lock_path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub(crate) fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let lock_path = path.with_extension("lock");
        Self {
            path,
            lock_path,
            _marker: PhantomData,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole map. A missing file is an empty map.
    pub(crate) fn read(&self) -> Result<BTreeMap<String, T>> {
        let lock = self.open_lock()?;
        lock.lock_shared().map_err(|e| map_io(&self.lock_path, e))?;
        let result = self.read_unlocked();
        lock.unlock().map_err(|e| map_io(&self.lock_path, e))?;
        result
    }

    /// Read, modify and write back the map under an exclusive lock.
    ///
    /// A corrupt file is replaced rather than left to fail every update.
    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut BTreeMap<String, T>) -> R) -> Result<R> {
        let lock = self.open_lock()?;
        lock.lock_exclusive().map_err(|e| map_io(&self.lock_path, e))?;

        let result = self.update_unlocked(f);

        lock.unlock().map_err(|e| map_io(&self.lock_path, e))?;
        result
    }

    fn update_unlocked<R>(&self, f: impl FnOnce(&mut BTreeMap<String, T>) -> R) -> Result<R> {
        let mut map = match self.read_unlocked() {
            Ok(map) => map,
            Err(Error::Storage(StorageError::Corrupt { path, message })) => {
                warn!(%path, %message, "Replacing corrupt storage file");
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        let result = f(&mut map);
        self.write_unlocked(&map)?;
        Ok(result)
    }

    fn read_unlocked(&self) -> Result<BTreeMap<String, T>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| map_io(&self.path, e))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::Storage(StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
        })
    }

    fn write_unlocked(&self, map: &BTreeMap<String, T>) -> Result<()> {
        let content = serde_json::to_string_pretty(map).map_err(|e| {
            Error::Storage(StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })
        })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, content).map_err(|e| map_io(&tmp_path, e))?;

        // Credentials live here; keep them private to the user (Unix only)
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&tmp_path)
                .map_err(|e| map_io(&tmp_path, e))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&tmp_path, perms).map_err(|e| map_io(&tmp_path, e))?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| map_io(&self.path, e))?;
        trace!(path = %self.path.display(), entries = map.len(), "Wrote storage file");
        Ok(())
    }

    fn open_lock(&self) -> Result<fs::File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| map_io(parent, e))?;
        }

        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| map_io(&self.lock_path, e))
    }
}
