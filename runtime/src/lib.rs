//! # Trolley Runtime
//!
//! Runtime implementation for the Trolley cart architecture.
//!
//! This crate provides the Store runtime that coordinates reducer execution,
//! storage effect handling, and the per-key write queues that serialize
//! persistence.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Writer Pool**: Per-key single-writer queues for serialized storage writes
//! - **Effect Executor**: Executes effect descriptions and feeds actions back to reducers
//!
//! ## Example
//!
//! ```ignore
//! use trolley_runtime::Store;
//! use trolley_core::reducer::Reducer;
//!
//! let store = Store::new(
//!     initial_state,
//!     my_reducer,
//!     environment,
//! );
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//!
//! // Wait for queued writes to land
//! store.flush().await?;
//! ```

use std::sync::Arc;
use tokio::sync::RwLock;
use trolley_core::{effect::Effect, reducer::Reducer};

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Single-writer queues for serialized storage writes
pub mod writer;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects and queued writes to complete
        ///
        /// Some effects or writes were still pending when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects or writes still pending")]
        ShutdownTimeout(usize),

        /// Timeout waiting for terminal action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is received.
        #[error("Timeout waiting for action")]
        Timeout,

        /// Action broadcast channel or writer channel closed
        ///
        /// Typically means the store or its writer tasks are shutting down.
        #[error("Channel closed")]
        ChannelClosed,
    }
}

/// Health check status levels
///
/// Indicates the current health state of a component or system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,

    /// Component is operational but experiencing issues (e.g., backed-up writes)
    Degraded,

    /// Component is not operational
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Check if status is degraded
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Degraded)
    }

    /// Check if status is unhealthy
    #[must_use]
    pub const fn is_unhealthy(self) -> bool {
        matches!(self, Self::Unhealthy)
    }

    /// Get the worst status between two statuses
    #[must_use]
    pub const fn worst(self, other: Self) -> Self {
        match (self, other) {
            (Self::Unhealthy, _) | (_, Self::Unhealthy) => Self::Unhealthy,
            (Self::Degraded, _) | (_, Self::Degraded) => Self::Degraded,
            _ => Self::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check result for a component
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub component: String,

    /// Current health status
    pub status: HealthStatus,

    /// Optional message providing details
    pub message: Option<String>,

    /// Optional metadata (e.g., queue depths, error counts)
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// Create a healthy check result
    #[must_use]
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Healthy,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Create a degraded check result
    #[must_use]
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Create an unhealthy check result
    #[must_use]
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
            metadata: Vec::new(),
        }
    }

    /// Add metadata to the health check
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Aggregated health report
///
/// Combines multiple health checks into an overall system status.
#[derive(Debug, Clone)]
pub struct HealthReport {
    /// Overall system status (worst of all checks)
    pub status: HealthStatus,

    /// Individual component checks
    pub checks: Vec<HealthCheck>,

    /// Timestamp when report was generated
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl HealthReport {
    /// Create a new health report from checks
    #[must_use]
    pub fn new(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|c| c.status)
            .fold(HealthStatus::Healthy, HealthStatus::worst);

        Self {
            status,
            checks,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Check if overall system is healthy
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }

    /// Check if overall system is degraded
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }

    /// Check if overall system is unhealthy
    #[must_use]
    pub const fn is_unhealthy(&self) -> bool {
        self.status.is_unhealthy()
    }
}

/// An operation that failed after exhausting its retries
#[derive(Debug, Clone)]
pub struct DeadLetter<T> {
    /// The payload that failed (for writes, the storage key)
    pub payload: T,

    /// Number of times this operation was attempted
    pub retry_count: usize,

    /// The error message from the last failure
    pub error_message: String,

    /// Timestamp when first failed (nanoseconds since epoch)
    pub first_failed_at: u64,

    /// Timestamp when last failed (nanoseconds since epoch)
    pub last_failed_at: u64,
}

impl<T> DeadLetter<T> {
    /// Create a new dead letter entry
    fn new(payload: T, error_message: String, retry_count: usize) -> Self {
        // Note: Truncation acceptable for nanosecond timestamps (wraps every ~584 years)
        #[allow(clippy::cast_possible_truncation)]
        let now_nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos() as u64;

        Self {
            payload,
            retry_count,
            error_message,
            first_failed_at: now_nanos,
            last_failed_at: now_nanos,
        }
    }
}

/// Dead Letter Queue for storing failed operations
///
/// The DLQ stores writes and loads that failed after exhausting retries.
/// These can be inspected, monitored, and potentially replayed manually.
///
/// # Features
///
/// - Bounded queue with configurable max size
/// - FIFO ordering (oldest entries dropped when full)
/// - Thread-safe for concurrent access
/// - Metrics tracking for queue size and operations
///
/// # Example
///
/// ```ignore
/// use trolley_runtime::DeadLetterQueue;
///
/// let dlq = DeadLetterQueue::new(1000);
///
/// // Record a failed write
/// dlq.push("@GoMarketPlace".to_string(), "disk full".to_string(), 5);
///
/// // Inspect
/// println!("Failed operations: {}", dlq.len());
///
/// // Drain and replay
/// for entry in dlq.drain() {
///     println!("Replay: {:?}", entry);
/// }
/// ```
#[derive(Debug)]
pub struct DeadLetterQueue<T> {
    /// The queue storage
    queue: Arc<Mutex<VecDeque<DeadLetter<T>>>>,

    /// Maximum queue size
    max_size: usize,
}

impl<T> DeadLetterQueue<T> {
    /// Create a new dead letter queue with the given max size
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            max_size,
        }
    }

    /// Push a failed operation onto the queue
    ///
    /// If the queue is full, the oldest entry is dropped.
    ///
    /// # Arguments
    ///
    /// - `payload`: The operation data (for writes, the storage key)
    /// - `error_message`: Description of the failure
    /// - `retry_count`: Number of times the operation was attempted
    pub fn push(&self, payload: T, error_message: String, retry_count: usize) {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        // Drop oldest if at capacity
        if queue.len() >= self.max_size {
            queue.pop_front();
            metrics::counter!("dlq.dropped").increment(1);
            tracing::warn!(
                max_size = self.max_size,
                "DLQ at capacity, dropping oldest entry"
            );
        }

        let entry = DeadLetter::new(payload, error_message, retry_count);
        queue.push_back(entry);

        // Note: Precision loss acceptable for metrics (queue sizes < 2^52)
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!("dlq.size").set(queue.len() as f64);
        metrics::counter!("dlq.pushed").increment(1);

        tracing::warn!(
            retry_count = retry_count,
            queue_size = queue.len(),
            "Operation added to dead letter queue"
        );
    }

    /// Get the current queue size
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Check if the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain all entries from the queue
    ///
    /// Returns all entries and empties the queue.
    pub fn drain(&self) -> Vec<DeadLetter<T>> {
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let entries: Vec<_> = queue.drain(..).collect();

        metrics::gauge!("dlq.size").set(0.0);
        metrics::counter!("dlq.drained").increment(entries.len() as u64);

        tracing::info!(count = entries.len(), "Drained dead letter queue");

        entries
    }

    /// Peek at the oldest entry without removing it
    #[must_use]
    pub fn peek(&self) -> Option<DeadLetter<T>>
    where
        T: Clone,
    {
        self.queue
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .front()
            .cloned()
    }

    /// Get the maximum queue size
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }
}

impl<T> Clone for DeadLetterQueue<T> {
    fn clone(&self) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            max_size: self.max_size,
        }
    }
}

impl<T> Default for DeadLetterQueue<T> {
    fn default() -> Self {
        Self::new(1000)
    }
}

pub use error::StoreError;
pub use retry::{RetryPolicy, retry_with_backoff};

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Configuration for Store instances
///
/// Provides configurable parameters for DLQ size, retry policy, and other
/// runtime settings.
///
/// # Example
///
/// ```ignore
/// let config = StoreConfig::default()
///     .with_dlq_max_size(5000)
///     .with_retry_policy(
///         RetryPolicy::new()
///             .with_max_attempts(5)
///             .with_initial_delay(Duration::from_millis(200))
///     );
///
/// let store = Store::with_config(state, reducer, env, config);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum size of the dead letter queue
    pub dlq_max_size: usize,
    /// Retry policy for failed storage operations
    pub retry_policy: RetryPolicy,
    /// Capacity of the action broadcast channel
    pub broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Set the DLQ maximum size
    #[must_use]
    pub const fn with_dlq_max_size(mut self, max_size: usize) -> Self {
        self.dlq_max_size = max_size;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Set the action broadcast channel capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dlq_max_size: 1000,
            retry_policy: RetryPolicy::default(),
            broadcast_capacity: 16,
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, DeadLetterQueue, Duration, Effect,
        HealthCheck, Ordering, Reducer, RetryPolicy, RwLock, StoreConfig, StoreError, retry,
        writer::WriterPool,
    };
    use tokio::sync::broadcast;
    use trolley_core::effect::StorageOperation;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    /// 5. Per-key write queues (serialized persistence)
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    ///
    /// # Example
    ///
    /// ```ignore
    /// let store = Store::new(
    ///     CartState::default(),
    ///     CartReducer,
    ///     production_environment(),
    /// );
    ///
    /// store.send(CartAction::AddToCart {
    ///     product: product_info,
    /// }).await?;
    /// ```
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        retry_policy: RetryPolicy,
        dlq: DeadLetterQueue<String>,
        writers: WriterPool,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        default_shutdown_timeout: Duration,
        /// Action broadcast channel for observing actions produced by effects.
        ///
        /// All actions produced by effects (futures and storage loads) are
        /// broadcast to observers. This is what `send_and_wait_for` listens
        /// on to resolve request-response flows like hydration.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        ///
        /// Uses [`StoreConfig::default`]: broadcast capacity 16, default
        /// retry policy, DLQ max size 1000.
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_config(initial_state, reducer, environment, StoreConfig::default())
        }

        /// Create a new Store with custom configuration
        ///
        /// # Arguments
        ///
        /// - `initial_state`: The starting state for the store
        /// - `reducer`: The reducer implementation (business logic)
        /// - `environment`: Injected dependencies
        /// - `config`: Runtime configuration (DLQ size, retries, channel capacity)
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            environment: E,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.broadcast_capacity);
            let dlq = DeadLetterQueue::new(config.dlq_max_size);
            let writers = WriterPool::new(config.retry_policy.clone(), dlq.clone());

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                retry_policy: config.retry_policy,
                dlq,
                writers,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                default_shutdown_timeout: config.default_shutdown_timeout,
                action_broadcast,
            }
        }

        /// Get a handle to the dead letter queue
        ///
        /// The DLQ contains storage operations that failed after exhausting
        /// retries. Use this for monitoring and manual replay.
        #[must_use]
        pub fn dlq(&self) -> DeadLetterQueue<String> {
            self.dlq.clone()
        }

        /// Perform a health check on the Store
        ///
        /// Checks the dead letter queue size (degraded if > 50% capacity,
        /// unhealthy if full).
        #[must_use]
        pub fn health(&self) -> HealthCheck {
            let dlq_size = self.dlq.len();
            let dlq_capacity = self.dlq.max_size();
            // Note: Precision loss acceptable for health check percentage
            #[allow(clippy::cast_precision_loss)]
            let dlq_usage = (dlq_size as f64 / dlq_capacity as f64) * 100.0;

            let mut check = if dlq_size >= dlq_capacity {
                HealthCheck::unhealthy("store", "Dead letter queue is full")
            } else if dlq_usage > 50.0 {
                // Note: Truncation intentional for display percentage
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let usage_pct = dlq_usage as u32;
                HealthCheck::degraded("store", format!("Dead letter queue is {usage_pct}% full"))
            } else {
                HealthCheck::healthy("store")
            };

            check = check
                .with_metadata("dlq_size", dlq_size.to_string())
                .with_metadata("dlq_capacity", dlq_capacity.to_string())
                .with_metadata("dlq_usage_pct", format!("{dlq_usage:.1}"));

            check
        }

        /// Health of the per-key write queues
        #[must_use]
        pub fn writer_health(&self) -> HealthCheck {
            self.writers.health()
        }

        /// Initiate graceful shutdown of the store
        ///
        /// This method:
        /// 1. Sets the shutdown flag (rejecting new actions)
        /// 2. Waits for pending effects and queued writes to complete (with timeout)
        /// 3. Returns when everything finishes or the timeout expires
        ///
        /// # Arguments
        ///
        /// - `timeout`: Maximum time to wait for completion
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires
        /// before pending effects and queued writes complete.
        ///
        /// # Example
        ///
        /// ```ignore
        /// // Graceful shutdown with 30 second timeout
        /// store.shutdown(Duration::from_secs(30)).await?;
        /// ```
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            // Set shutdown flag to reject new actions
            self.shutdown.store(true, Ordering::Release);

            // Wait for pending effects and queued writes with timeout
            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(100);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);
                let queued = self.writers.pending_jobs();

                if pending == 0 && queued == 0 {
                    tracing::info!("All effects and writes completed, shutdown successful");
                    metrics::counter!("store.shutdown.completed").increment(1);
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        queued_writes = queued,
                        "Shutdown timeout: {} effects or writes still pending",
                        pending + queued
                    );
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending + queued));
                }

                tracing::debug!(
                    pending_effects = pending,
                    queued_writes = queued,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Waiting for effects and writes to complete"
                );

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Graceful shutdown with the configured default timeout
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the default timeout
        /// expires before pending work completes.
        pub async fn shutdown_default(&self) -> Result<(), StoreError> {
            self.shutdown(self.default_shutdown_timeout).await
        }

        /// Send an action to the store
        ///
        /// This is the primary way to interact with the store:
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Hands returned effects to the runtime
        /// 4. Effects may produce more actions (feedback loop)
        ///
        /// # Concurrency and Effect Execution
        ///
        /// - The reducer executes synchronously while holding a write lock
        /// - Future and load effects execute asynchronously in spawned tasks
        /// - Save effects are queued on the key's writer before `send` returns,
        ///   so same-key writes apply in reducer order
        /// - `send()` returns after queuing effect execution, not completion
        /// - Multiple concurrent `send()` calls serialize at the reducer level
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        ///
        /// # Panics
        ///
        /// If the reducer panics, the panic will propagate and halt the store.
        /// Reducers should be pure functions that do not panic.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<(), StoreError>
        where
            R: Clone,
            E: Clone,
        {
            // Check if store is shutting down
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            tracing::debug!("Processing action");
            metrics::counter!("store.actions.total").increment(1);

            let mut state = self.state.write().await;
            tracing::trace!("Acquired write lock on state");

            let effects = {
                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                let duration = start.elapsed();
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(duration.as_secs_f64());

                // Note: Precision loss acceptable for metrics (effect counts < 2^52)
                #[allow(clippy::cast_precision_loss)]
                metrics::histogram!("store.effects.count").record(effects.len() as f64);

                effects
            };

            // Effects are handed off while the state lock is still held, so
            // queued writes observe reducer order even with concurrent senders.
            tracing::trace!("Executing {} effects", effects.len());
            for effect in effects {
                self.execute_effect(effect);
            }
            drop(state);

            tracing::debug!("Action processing completed");
            Ok(())
        }

        /// Send an action and wait for a matching result action
        ///
        /// This method is designed for request-response flows (hydration,
        /// anything that ends in a terminal feedback action). It subscribes
        /// to the action broadcast, sends the initial action, then waits for
        /// an action matching the predicate.
        ///
        /// # How It Works
        ///
        /// 1. Subscribe to action broadcast BEFORE sending (avoids race conditions)
        /// 2. Send the initial action through the store
        /// 3. Wait for actions produced by effects
        /// 4. Return the first action matching the predicate
        ///
        /// Effects feed their actions back into the reducer before
        /// broadcasting them, so when this returns the matching action has
        /// already been applied to state.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before matching action received
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        ///
        /// # Example
        ///
        /// ```ignore
        /// let result = store.send_and_wait_for(
        ///     CartAction::Hydrate,
        ///     |a| matches!(a,
        ///         CartAction::Hydrated { .. } |
        ///         CartAction::HydrationFailed { .. }
        ///     ),
        ///     Duration::from_secs(10),
        /// ).await?;
        /// ```
        ///
        /// # Notes
        ///
        /// - Only actions produced by effects are broadcast (not the initial action)
        /// - If the channel lags and drops actions, continues waiting (timeout catches it)
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            R: Clone,
            E: Clone,
            F: Fn(&A) -> bool,
        {
            // Subscribe BEFORE sending to avoid race condition
            let mut rx = self.action_broadcast.subscribe();

            // Send the initial action
            self.send(action).await?;

            // Wait for matching action with timeout
            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {} // Not the action we want, keep waiting
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // Slow consumer, some actions were dropped.
                            // Continue waiting - the timeout catches a dropped terminal.
                            tracing::warn!(
                                skipped,
                                "Action observer lagged, {} actions skipped",
                                skipped
                            );
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        }
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to all actions produced by this store's effects
        ///
        /// Returns a receiver that gets a clone of every action produced by
        /// effects (futures and storage loads). Initial actions passed to
        /// `send` are not broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Wait until every write queued before this call has completed
        ///
        /// Acts as a durability barrier over the per-key write queues. After
        /// `flush` returns `Ok`, every previously queued write has either
        /// been applied or pushed to the dead letter queue.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ChannelClosed`] if a writer task went away
        /// before acknowledging.
        pub async fn flush(&self) -> Result<(), StoreError> {
            self.writers.flush().await
        }

        /// Read current state via a closure
        ///
        /// Access state through a closure to ensure the lock is released promptly:
        ///
        /// ```ignore
        /// let item_count = store.state(|s| s.products.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// Retry an async operation according to the retry policy
        ///
        /// Delegates to the shared retry engine; operations that exhaust
        /// their retries are recorded in the dead letter queue.
        async fn retry_operation<F, Fut, T, Err>(
            &self,
            operation_name: &str,
            f: F,
        ) -> Result<T, Err>
        where
            F: FnMut() -> Fut,
            Fut: std::future::Future<Output = Result<T, Err>>,
            Err: std::fmt::Display,
        {
            match retry::retry_with_backoff(&self.retry_policy, operation_name, f).await {
                Ok(value) => Ok(value),
                Err(error) => {
                    self.dlq.push(
                        operation_name.to_string(),
                        format!("{error}"),
                        self.retry_policy.max_attempts() as usize,
                    );
                    Err(error)
                }
            }
        }

        /// Execute an effect
        ///
        /// # Effect Types
        ///
        /// - `None`: No-op
        /// - `Future`: Executes async computation, sends resulting action if `Some`
        /// - `Storage(Load)`: Reads from the store with retries, maps outcome
        ///   to a feedback action
        /// - `Storage(Save)`: Queues the write on the key's single writer
        ///
        /// # Error Handling Strategy
        ///
        /// **Reducer panics**: Propagate (fail fast). Reducers should be pure
        /// functions that do not panic.
        ///
        /// **Storage failures**: Retried per policy; exhausted operations land
        /// in the DLQ. Save failures are never surfaced to callers.
        #[allow(clippy::needless_pass_by_value)] // effects are consumed here
        #[tracing::instrument(skip(self, effect), name = "execute_effect")]
        fn execute_effect(&self, effect: Effect<A>)
        where
            R: Clone,
            E: Clone,
        {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                }
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);

                    // Track global pending effects for shutdown
                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                    let store = self.clone();

                    tokio::spawn(async move {
                        let _pending_guard = pending_guard; // Decrement on drop

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");

                            // Apply before broadcasting: a waiter that
                            // receives this action can read post-action state.
                            let _ = store.send(action.clone()).await;
                            let _ = store.action_broadcast.send(action);
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    });
                }
                Effect::Storage(StorageOperation::Save { store, key, value }) => {
                    tracing::trace!("Executing Effect::Storage (save)");
                    metrics::counter!("store.effects.executed", "type" => "storage_save")
                        .increment(1);

                    // Queued synchronously, before send() returns, so same-key
                    // writes keep reducer order.
                    self.writers.enqueue(store, key, value);
                }
                Effect::Storage(StorageOperation::Load {
                    store: kv,
                    key,
                    on_success,
                    on_error,
                }) => {
                    tracing::trace!("Executing Effect::Storage (load)");
                    metrics::counter!("store.effects.executed", "type" => "storage_load")
                        .increment(1);

                    // Track global pending effects for shutdown
                    self.pending_effects.fetch_add(1, Ordering::SeqCst);
                    let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                    let store = self.clone();

                    tokio::spawn(async move {
                        let _pending_guard = pending_guard; // Decrement on drop

                        tracing::debug!(key = %key, "Executing storage load");

                        let key_for_op = key.clone();
                        let result = store
                            .retry_operation("storage_get", || {
                                let kv = Arc::clone(&kv);
                                let key = key_for_op.clone();
                                async move { kv.get(key).await }
                            })
                            .await;

                        let action = match result {
                            Ok(payload) => {
                                metrics::counter!("storage.loads.completed").increment(1);
                                tracing::debug!(
                                    key = %key,
                                    found = payload.is_some(),
                                    "Storage load succeeded"
                                );
                                on_success(payload)
                            }
                            Err(error) => {
                                metrics::counter!("storage.loads.failed").increment(1);
                                tracing::warn!(
                                    key = %key,
                                    error = %error,
                                    "Storage load failed"
                                );
                                on_error(error)
                            }
                        };

                        // Send action back to store if callback produced one
                        if let Some(action) = action {
                            tracing::trace!(
                                "Storage operation produced an action, sending to store"
                            );

                            // Apply before broadcasting, as for Future effects.
                            let _ = store.send(action.clone()).await;
                            let _ = store.action_broadcast.send(action);
                        } else {
                            tracing::trace!("Storage operation completed with no action");
                        }
                    });
                }
            }
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                retry_policy: self.retry_policy.clone(),
                dlq: self.dlq.clone(),
                writers: self.writers.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                default_shutdown_timeout: self.default_shutdown_timeout,
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::assert_ok;
    use trolley_core::storage::{KvStore, StorageKey};
    use trolley_core::{SmallVec, load_value, save_value, smallvec};
    use trolley_testing::mocks::{FailingKv, MemoryKv};

    #[derive(Debug, Default)]
    struct TestState {
        count: i64,
        loaded: Option<Vec<u8>>,
        load_error: Option<String>,
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestAction {
        Increment,
        IncrementLater,
        Save(Vec<u8>),
        Load,
        Loaded(Option<Vec<u8>>),
        LoadFailed(String),
    }

    #[derive(Clone)]
    struct TestEnv {
        kv: Arc<dyn KvStore>,
        key: StorageKey,
    }

    #[derive(Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut TestState,
            action: TestAction,
            env: &TestEnv,
        ) -> SmallVec<[Effect<TestAction>; 4]> {
            match action {
                TestAction::Increment => {
                    state.count += 1;
                    smallvec![Effect::None]
                }
                TestAction::IncrementLater => {
                    smallvec![Effect::Future(Box::pin(async {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Some(TestAction::Increment)
                    }))]
                }
                TestAction::Save(bytes) => {
                    smallvec![save_value!(env.kv, env.key.clone(), bytes)]
                }
                TestAction::Load => {
                    smallvec![load_value!(
                        env.kv,
                        env.key.clone(),
                        |payload| Some(TestAction::Loaded(payload)),
                        |error| Some(TestAction::LoadFailed(error.to_string()))
                    )]
                }
                TestAction::Loaded(payload) => {
                    state.loaded = payload;
                    smallvec![Effect::None]
                }
                TestAction::LoadFailed(message) => {
                    state.load_error = Some(message);
                    smallvec![Effect::None]
                }
            }
        }
    }

    fn test_store(kv: Arc<dyn KvStore>) -> Store<TestState, TestAction, TestEnv, TestReducer> {
        let env = TestEnv {
            kv,
            key: StorageKey::new("test-key"),
        };
        let config = StoreConfig::default().with_retry_policy(
            RetryPolicy::new()
                .with_max_attempts(2)
                .with_initial_delay(Duration::from_millis(5)),
        );
        Store::with_config(TestState::default(), TestReducer, env, config)
    }

    #[tokio::test]
    async fn send_updates_state() {
        let store = test_store(Arc::new(MemoryKv::new()));

        assert_ok!(store.send(TestAction::Increment).await);

        let count = store.state(|s| s.count).await;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn send_after_shutdown_is_rejected() {
        let store = test_store(Arc::new(MemoryKv::new()));

        store.shutdown(Duration::from_secs(1)).await.unwrap();

        let result = store.send(TestAction::Increment).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn future_effect_feeds_action_back() {
        let store = test_store(Arc::new(MemoryKv::new()));

        assert_ok!(store.send(TestAction::IncrementLater).await);

        // Give the spawned effect time to complete
        tokio::time::sleep(Duration::from_millis(50)).await;

        let count = store.state(|s| s.count).await;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn save_effects_apply_in_reducer_order() {
        let kv = Arc::new(MemoryKv::new());
        let store = test_store(kv.clone());

        assert_ok!(store.send(TestAction::Save(b"first".to_vec())).await);
        assert_ok!(store.send(TestAction::Save(b"second".to_vec())).await);
        store.flush().await.unwrap();

        let values: Vec<Vec<u8>> = kv.write_log().into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![b"first".to_vec(), b"second".to_vec()]);

        let stored = kv.get(StorageKey::new("test-key")).await.unwrap();
        assert_eq!(stored, Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn load_effect_feeds_payload_back() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(StorageKey::new("test-key"), b"stored".to_vec())
            .await
            .unwrap();

        let store = test_store(kv);

        let result = store
            .send_and_wait_for(
                TestAction::Load,
                |a| matches!(a, TestAction::Loaded(_) | TestAction::LoadFailed(_)),
                Duration::from_secs(1),
            )
            .await
            .unwrap();

        assert_eq!(result, TestAction::Loaded(Some(b"stored".to_vec())));

        let loaded = store.state(|s| s.loaded.clone()).await;
        assert_eq!(loaded, Some(b"stored".to_vec()));
    }

    #[tokio::test]
    async fn load_failure_produces_error_action_and_dlq_entry() {
        let kv = Arc::new(FailingKv::failing_gets(usize::MAX));
        let store = test_store(kv);

        let result = store
            .send_and_wait_for(
                TestAction::Load,
                |a| matches!(a, TestAction::Loaded(_) | TestAction::LoadFailed(_)),
                Duration::from_secs(2),
            )
            .await
            .unwrap();

        assert!(matches!(result, TestAction::LoadFailed(_)));
        assert_eq!(store.dlq().len(), 1);
        assert_eq!(store.dlq().peek().unwrap().payload, "storage_get");
    }

    #[tokio::test]
    async fn send_and_wait_for_times_out_without_matching_action() {
        let store = test_store(Arc::new(MemoryKv::new()));

        let result = store
            .send_and_wait_for(
                TestAction::Increment,
                |a| matches!(a, TestAction::Loaded(_)),
                Duration::from_millis(100),
            )
            .await;

        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn shutdown_drains_queued_writes() {
        let kv = Arc::new(MemoryKv::new());
        let store = test_store(kv.clone());

        assert_ok!(store.send(TestAction::Save(b"durable".to_vec())).await);
        store.shutdown(Duration::from_secs(2)).await.unwrap();

        let stored = kv.get(StorageKey::new("test-key")).await.unwrap();
        assert_eq!(stored, Some(b"durable".to_vec()));
    }

    #[tokio::test]
    async fn health_degrades_as_dlq_fills() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let env = TestEnv {
            kv,
            key: StorageKey::new("test-key"),
        };
        let config = StoreConfig::default().with_dlq_max_size(10);
        let store = Store::with_config(TestState::default(), TestReducer, env, config);

        assert!(store.health().status.is_healthy());

        for i in 0..6 {
            store
                .dlq()
                .push(format!("op-{i}"), "boom".to_string(), 1);
        }
        assert!(store.health().status.is_degraded());

        for i in 6..10 {
            store
                .dlq()
                .push(format!("op-{i}"), "boom".to_string(), 1);
        }
        assert!(store.health().status.is_unhealthy());
    }

    #[tokio::test]
    async fn writer_health_is_reported() {
        let store = test_store(Arc::new(MemoryKv::new()));

        let check = store.writer_health();
        assert_eq!(check.component, "writer");
        assert!(check.status.is_healthy());
    }

    #[test]
    fn health_report_folds_to_worst_status() {
        let report = HealthReport::new(vec![
            HealthCheck::healthy("store"),
            HealthCheck::degraded("writer", "56 writes backed up"),
        ]);

        assert!(report.is_degraded());
        assert_eq!(report.checks.len(), 2);
    }

    #[test]
    fn dead_letter_queue_drops_oldest_when_full() {
        let dlq = DeadLetterQueue::new(2);

        dlq.push("a".to_string(), "e1".to_string(), 1);
        dlq.push("b".to_string(), "e2".to_string(), 1);
        dlq.push("c".to_string(), "e3".to_string(), 1);

        assert_eq!(dlq.len(), 2);
        assert_eq!(dlq.peek().unwrap().payload, "b");

        let drained = dlq.drain();
        assert_eq!(drained.len(), 2);
        assert!(dlq.is_empty());
    }
}
