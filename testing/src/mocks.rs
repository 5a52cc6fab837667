//! Mock storage backends
//!
//! In-memory [`KvStore`] implementations for exercising reducers, stores,
//! and write queues without touching a real backend.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use trolley_core::storage::{KvError, KvStore, StorageKey};

/// In-memory key-value store that records every write
///
/// Values live in a `HashMap`; every successful `set` is also appended to a
/// write log so tests can assert on write *order*, not just final content.
///
/// Cloning is cheap and clones share the same underlying map and log, so a
/// test can hand the store to an environment and keep a handle for
/// assertions.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use trolley_testing::MemoryKv;
/// use trolley_core::storage::{KvStore, StorageKey};
///
/// let kv = Arc::new(MemoryKv::new());
///
/// tokio_test::block_on(async {
///     kv.set(StorageKey::new("cart"), b"v1".to_vec()).await.unwrap();
///     kv.set(StorageKey::new("cart"), b"v2".to_vec()).await.unwrap();
///
///     let stored = kv.get(StorageKey::new("cart")).await.unwrap();
///     assert_eq!(stored, Some(b"v2".to_vec()));
/// });
///
/// assert_eq!(kv.write_log().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    write_log: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl MemoryKv {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every (key, value) pair ever written, in arrival order
    #[must_use]
    pub fn write_log(&self) -> Vec<(String, Vec<u8>)> {
        self.write_log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of distinct keys currently stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check whether the store holds no keys
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemoryKv {
    fn get(
        &self,
        key: StorageKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, KvError>> + Send + '_>> {
        Box::pin(async move {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(entries.get(key.as_str()).cloned())
        })
    }

    fn set(
        &self,
        key: StorageKey,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), KvError>> + Send + '_>> {
        Box::pin(async move {
            let key = key.into_inner();
            self.entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.clone(), value.clone());
            self.write_log
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((key, value));
            Ok(())
        })
    }
}

/// Wrapper around [`MemoryKv`] that fails a configured number of operations
///
/// Failures are injected at call time: each `get` or `set` consumes one unit
/// of the matching budget and returns [`KvError::Backend`] until the budget
/// is exhausted, then delegates to the inner store. Pass `usize::MAX` for a
/// store that never recovers.
///
/// Useful for driving retry, dead-letter, and hydration-failure paths.
///
/// # Example
///
/// ```
/// use trolley_testing::FailingKv;
/// use trolley_core::storage::{KvStore, StorageKey};
///
/// let kv = FailingKv::failing_sets(1);
///
/// tokio_test::block_on(async {
///     // First write fails, second succeeds
///     assert!(kv.set(StorageKey::new("cart"), b"v".to_vec()).await.is_err());
///     assert!(kv.set(StorageKey::new("cart"), b"v".to_vec()).await.is_ok());
/// });
/// ```
#[derive(Debug, Default)]
pub struct FailingKv {
    inner: MemoryKv,
    failing_gets: AtomicUsize,
    failing_sets: AtomicUsize,
}

impl FailingKv {
    /// Fail the next `n` get operations (`usize::MAX` fails forever)
    #[must_use]
    pub fn failing_gets(n: usize) -> Self {
        Self {
            inner: MemoryKv::new(),
            failing_gets: AtomicUsize::new(n),
            failing_sets: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` set operations (`usize::MAX` fails forever)
    #[must_use]
    pub fn failing_sets(n: usize) -> Self {
        Self {
            inner: MemoryKv::new(),
            failing_gets: AtomicUsize::new(0),
            failing_sets: AtomicUsize::new(n),
        }
    }

    /// The wrapped in-memory store, for seeding values and assertions
    #[must_use]
    pub fn inner(&self) -> &MemoryKv {
        &self.inner
    }

    /// Consume one unit of failure budget, returning true if the call
    /// should fail. A budget of `usize::MAX` never decrements.
    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| match n {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok()
    }
}

impl KvStore for FailingKv {
    fn get(
        &self,
        key: StorageKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Vec<u8>>, KvError>> + Send + '_>> {
        if Self::take_failure(&self.failing_gets) {
            return Box::pin(async { Err(KvError::Backend("injected failure".to_string())) });
        }
        self.inner.get(key)
    }

    fn set(
        &self,
        key: StorageKey,
        value: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<(), KvError>> + Send + '_>> {
        if Self::take_failure(&self.failing_sets) {
            return Box::pin(async { Err(KvError::Backend("injected failure".to_string())) });
        }
        self.inner.set(key, value)
    }
}
