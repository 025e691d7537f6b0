//! Key-value store abstraction used by the queue engine.
//!
//! The engine requires only get/set/remove semantics, no transactions.
//! Implementations must surface oversized values as
//! [`StoreError::ValueTooLarge`] so the engine can distinguish them from
//! ordinary backend failures and clear the offending key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Errors surfaced by a [`KvStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The value under `key` exceeds the store's size limit.
    #[error("value for key `{key}` exceeds size limit ({size} > {limit} bytes)")]
    ValueTooLarge {
        /// Offending key.
        key: String,
        /// Observed value size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Any other backend failure (I/O, quota, corruption at the driver level).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// A string-keyed blob store with get/set/remove semantics.
pub trait KvStore: Send {
    /// Read the value under `key`, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the stored value exceeds
    /// the size limit.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or `value` exceeds the size
    /// limit.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the value under `key`. Removing an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// In-memory store backed by a shared map.
///
/// Clones share the same underlying map, so a test can hand one handle to
/// an engine and keep another to inspect or corrupt the persisted state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.lock().remove(key);
        Ok(())
    }
}
