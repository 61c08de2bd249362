//! Key-value storage abstraction for trace records.
//!
//! This module provides a trait-based, TTL-capable key-value store with
//! pluggable backends. The relay only needs string values; records are
//! serialized to JSON before they reach the store.

mod memory;

pub use memory::InMemoryKeyValueStore;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// The backend could not be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// TTL-capable key-value store.
///
/// Mirrors the small command set the relay needs from an external store
/// such as Redis: `GET`, `SET`, `EXPIRE`, `DEL` and `GETDEL`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get the value of `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Set `key` to `value`, clearing any previous expiry.
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Expire `key` after `ttl`. Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StorageError>;

    /// Delete `key`. Returns false when the key did not exist.
    async fn del(&self, key: &str) -> Result<bool, StorageError>;

    /// Get and delete `key`.
    ///
    /// The default implementation is a `get` followed by a `del` and is
    /// not atomic: two concurrent callers may both observe the value.
    /// Backends with an atomic primitive should override it.
    async fn take(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self.get(key).await?;
        if value.is_some() {
            self.del(key).await?;
        }
        Ok(value)
    }
}
