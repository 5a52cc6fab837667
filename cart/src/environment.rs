//! Cart environment.
//!
//! This module defines the environment type for dependency injection in
//! the cart reducer: the storage backend and the namespace key the cart
//! persists under.

use std::sync::Arc;

use trolley_core::storage::{KvStore, StorageKey};

/// Cart environment.
///
/// Contains the external dependencies the cart reducer needs. The reducer
/// never touches the store directly; it only *describes* reads and writes
/// against these handles, and the runtime performs them.
#[derive(Clone)]
pub struct CartEnvironment {
    /// Durable key-value store holding the serialized cart.
    pub storage: Arc<dyn KvStore>,

    /// Namespace key the cart lives under.
    pub key: StorageKey,
}

impl CartEnvironment {
    /// Create an environment persisting under [`CART_STORAGE_KEY`](crate::CART_STORAGE_KEY).
    #[must_use]
    pub fn new(storage: Arc<dyn KvStore>) -> Self {
        Self {
            storage,
            key: StorageKey::new(crate::CART_STORAGE_KEY),
        }
    }

    /// Create an environment persisting under a custom key.
    ///
    /// Useful for tests and for running several carts against one backend.
    #[must_use]
    pub const fn with_key(storage: Arc<dyn KvStore>, key: StorageKey) -> Self {
        Self { storage, key }
    }
}
