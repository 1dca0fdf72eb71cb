//! In-process storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::Result;
use crate::error::StorageError;
use crate::traits::{BackendKind, Persistence, StorageBackend};

/// A process-local map. Always the first backend consulted.
#[derive(Default)]
pub struct MemoryStorage {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Values are credentials; show only how many there are.
impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("len", &self.len())
            .finish()
    }
}

impl StorageBackend for MemoryStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.read().map_err(|_| StorageError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str, _persistence: Persistence) -> Result<()> {
        let mut values = self.values.write().map_err(|_| StorageError::Poisoned)?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.write().map_err(|_| StorageError::Poisoned)?;
        values.remove(key);
        Ok(())
    }

    fn evict(&self, key: &str) -> Result<()> {
        self.remove(key)
    }
}
