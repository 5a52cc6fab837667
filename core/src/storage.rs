//! Key-value store trait and related types for cart persistence.
//!
//! This module defines the core abstraction over durable device-local
//! storage: an asynchronous byte-string store keyed by string identifiers,
//! surviving process restarts.
//!
//! # Design
//!
//! The `KvStore` trait is deliberately minimal. It provides exactly what
//! write-through persistence needs:
//!
//! - Read the payload stored under a key (absent keys are `None`, not errors)
//! - Replace the payload stored under a key (last write wins)
//!
//! There is no scan, no delete, no transaction. The cart owns one key and
//! overwrites it wholesale.
//!
//! # Implementations
//!
//! - `FileKv` (in `trolley-storage-fs` crate): one file per key on disk
//! - `MemoryKv` / `FailingKv` (in `trolley-testing` crate): deterministic testing
//!
//! # Dyn Compatibility
//!
//! The trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` to enable trait object usage (`Arc<dyn KvStore>`). This is
//! required for the effect system where reducers create effects that
//! capture the store.
//!
//! # Example
//!
//! ```no_run
//! use trolley_core::storage::{KvError, KvStore, StorageKey};
//!
//! async fn example<S: KvStore>(store: &S) -> Result<(), KvError> {
//!     let key = StorageKey::new("@GoMarketPlace");
//!
//!     store.set(key.clone(), b"[]".to_vec()).await?;
//!
//!     let payload = store.get(key).await?;
//!     assert!(payload.is_some());
//!
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during key-value store operations.
#[derive(Error, Debug)]
pub enum KvError {
    /// Storage backend failure (engine error, permissions, corruption).
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// General I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Namespace key identifying a value in a [`KvStore`].
///
/// Keys are stable, human-readable compatibility constants: the persisted
/// data under a key must stay decodable across versions, so a key must not
/// change without a migration path.
///
/// # Examples
///
/// ```
/// use trolley_core::storage::StorageKey;
///
/// let key = StorageKey::new("@GoMarketPlace");
/// assert_eq!(key.as_str(), "@GoMarketPlace");
/// assert_eq!(key.to_string(), "@GoMarketPlace");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKey(String);

impl StorageKey {
    /// Create a new storage key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for StorageKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for StorageKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Asynchronous byte-string store keyed by string identifiers.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be safely shared across tasks
/// as `Arc<dyn KvStore>`.
///
/// # Semantics
///
/// - `get` on an absent key returns `Ok(None)`; only backend failures are
///   errors.
/// - `set` replaces any existing value under the key. Last write wins; the
///   ordering of concurrent writers is the caller's concern (the runtime
///   serializes writes per key through a single-writer queue).
pub trait KvStore: Send + Sync {
    /// Read the payload stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))`: the stored payload
    /// - `Ok(None)`: nothing stored under this key
    ///
    /// # Errors
    ///
    /// - [`KvError::Backend`]: the storage engine failed
    /// - [`KvError::Io`]: reading the payload failed
    fn get(
        &self,
        key: StorageKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, KvError>> + Send + '_>>;

    /// Write `value` under `key`, replacing any existing payload.
    ///
    /// # Errors
    ///
    /// - [`KvError::Backend`]: the storage engine failed
    /// - [`KvError::Io`]: writing the payload failed
    fn set(
        &self,
        key: StorageKey,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), KvError>> + Send + '_>>;
}
