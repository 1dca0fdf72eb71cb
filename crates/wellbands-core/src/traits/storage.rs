//! Storage backend trait.

use std::fmt;

use crate::Result;

/// How long a written value should survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persistence {
    /// Lives for the current session only.
    Ephemeral,
    /// Survives process exit and restarts.
    Durable,
}

impl Persistence {
    /// Map the "remember me" flag onto a persistence level.
    pub fn from_remember_me(remember_me: bool) -> Self {
        if remember_me {
            Persistence::Durable
        } else {
            Persistence::Ephemeral
        }
    }

    pub fn is_durable(self) -> bool {
        self == Persistence::Durable
    }
}

/// The kinds of backend, in read-priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BackendKind {
    Memory,
    Cookie,
    Local,
    Session,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Memory => "memory",
            BackendKind::Cookie => "cookie",
            BackendKind::Local => "local",
            BackendKind::Session => "session",
        };
        f.write_str(name)
    }
}

/// A key/value persistence backend.
///
/// Backends are synchronous; each call is expected to complete quickly
/// (an in-process map or a small file).
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Which kind of backend this is.
    fn kind(&self) -> BackendKind;

    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value with the given persistence.
    fn set(&self, key: &str, value: &str, persistence: Persistence) -> Result<()>;

    /// Remove a value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    /// Drop any copy of `key` held only by this process, leaving shared
    /// storage untouched.
    fn evict(&self, key: &str) -> Result<()> {
        let _ = key;
        Ok(())
    }

    /// Whether writes of this persistence belong in this backend.
    fn accepts(&self, persistence: Persistence) -> bool {
        let _ = persistence;
        true
    }
}
