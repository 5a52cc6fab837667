//! Single-writer queues for serialized storage writes.
//!
//! Every storage key gets a dedicated writer task. Writes against the same
//! key are applied strictly in the order they were enqueued, which makes
//! "last write wins" follow state order rather than task scheduling order.
//! Writes against different keys proceed independently.
//!
//! Writers retry failed writes with exponential backoff; writes that
//! exhaust their retry budget land in the dead letter queue and are
//! never surfaced to the caller.

use crate::metrics::WriterMetrics;
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::{DeadLetterQueue, HealthCheck, StoreError};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use trolley_core::storage::{KvStore, StorageKey};

/// Queue depth above which the pool reports itself degraded.
const QUEUE_DEPTH_WARN: usize = 128;

/// A unit of work for a writer task.
enum WriteJob {
    /// Replace the payload stored under the writer's key.
    Save {
        store: Arc<dyn KvStore>,
        value: Vec<u8>,
    },
    /// Barrier: acknowledge once every job queued before it has completed.
    Flush { ack: oneshot::Sender<()> },
}

/// Pool of per-key writer tasks.
///
/// Writers are spawned lazily on the first write to a key and live for the
/// lifetime of the pool. The pool is cheap to clone; clones share the same
/// writers and counters.
#[derive(Debug, Clone)]
pub struct WriterPool {
    writers: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<WriteJob>>>>,
    pending_jobs: Arc<AtomicUsize>,
    retry_policy: RetryPolicy,
    dlq: DeadLetterQueue<String>,
}

impl WriterPool {
    /// Create a new writer pool.
    ///
    /// # Arguments
    ///
    /// - `retry_policy`: Backoff policy applied to each failed write
    /// - `dlq`: Destination for writes that exhaust their retries
    #[must_use]
    pub fn new(retry_policy: RetryPolicy, dlq: DeadLetterQueue<String>) -> Self {
        Self {
            writers: Arc::new(Mutex::new(HashMap::new())),
            pending_jobs: Arc::new(AtomicUsize::new(0)),
            retry_policy,
            dlq,
        }
    }

    /// Queue a write on the key's writer.
    ///
    /// Returns as soon as the job is queued. The write itself happens on
    /// the writer task, after every previously queued write to the same key.
    ///
    /// Must be called from within a tokio runtime (writer tasks are spawned
    /// lazily).
    pub fn enqueue(&self, store: Arc<dyn KvStore>, key: StorageKey, value: Vec<u8>) {
        let sender = {
            let mut writers = self
                .writers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            writers
                .entry(key.as_str().to_string())
                .or_insert_with(|| self.spawn_writer(key.clone()))
                .clone()
        };

        let depth = self.pending_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        WriterMetrics::record_enqueued();
        // Note: Precision loss acceptable for metrics (queue depths < 2^52)
        #[allow(clippy::cast_precision_loss)]
        WriterMetrics::record_queue_depth(depth as f64);

        tracing::trace!(key = %key, value_len = value.len(), depth, "Write queued");

        if sender.send(WriteJob::Save { store, value }).is_err() {
            // Writer tasks live as long as the pool holds their sender, so
            // this only happens if the runtime is tearing down.
            self.pending_jobs.fetch_sub(1, Ordering::SeqCst);
            self.dlq.push(
                key.as_str().to_string(),
                "writer task unavailable".to_string(),
                0,
            );
            tracing::error!(key = %key, "Writer task unavailable, write dropped");
        }
    }

    /// Wait until every write queued before this call has completed.
    ///
    /// Acts as a durability barrier: after `flush` returns `Ok`, every
    /// previously queued write has either been applied or pushed to the
    /// dead letter queue. Writes queued after `flush` begins are not
    /// covered.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ChannelClosed`] if a writer task went away
    /// before acknowledging (runtime teardown).
    pub async fn flush(&self) -> Result<(), StoreError> {
        let receivers: Vec<oneshot::Receiver<()>> = {
            let writers = self
                .writers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            writers
                .values()
                .filter_map(|sender| {
                    let (ack, rx) = oneshot::channel();
                    sender.send(WriteJob::Flush { ack }).ok().map(|()| rx)
                })
                .collect()
        };

        let count = receivers.len();
        tracing::debug!(writers = count, "Flushing write queues");

        for result in join_all(receivers).await {
            result.map_err(|_| StoreError::ChannelClosed)?;
        }

        tracing::debug!(writers = count, "Write queues flushed");
        Ok(())
    }

    /// Number of writes currently queued or in flight.
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.pending_jobs.load(Ordering::SeqCst)
    }

    /// Number of writer tasks spawned so far.
    #[must_use]
    pub fn writer_count(&self) -> usize {
        self.writers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Health of the write queues, based on current depth.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let depth = self.pending_jobs();

        let check = if depth > QUEUE_DEPTH_WARN {
            HealthCheck::degraded("writer", format!("{depth} writes backed up"))
        } else {
            HealthCheck::healthy("writer")
        };

        check
            .with_metadata("pending_jobs", depth.to_string())
            .with_metadata("writer_count", self.writer_count().to_string())
    }

    /// Spawn the writer task for a key and return its job sender.
    fn spawn_writer(&self, key: StorageKey) -> mpsc::UnboundedSender<WriteJob> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let retry_policy = self.retry_policy.clone();
        let dlq = self.dlq.clone();
        let pending_jobs = Arc::clone(&self.pending_jobs);

        tokio::spawn(async move {
            tracing::debug!(key = %key, "Writer task started");

            while let Some(job) = rx.recv().await {
                match job {
                    WriteJob::Save { store, value } => {
                        let start = Instant::now();

                        let result = retry_with_backoff(&retry_policy, "storage_set", || {
                            let store = Arc::clone(&store);
                            let key = key.clone();
                            let value = value.clone();
                            async move { store.set(key, value).await }
                        })
                        .await;

                        match result {
                            Ok(()) => {
                                WriterMetrics::record_completed(start.elapsed());
                                tracing::debug!(key = %key, "Write completed");
                            }
                            Err(error) => {
                                WriterMetrics::record_failed();
                                dlq.push(
                                    key.as_str().to_string(),
                                    format!("{error}"),
                                    retry_policy.max_attempts() as usize,
                                );
                                tracing::error!(
                                    key = %key,
                                    error = %error,
                                    "Write failed after exhausting retries"
                                );
                            }
                        }

                        let remaining = pending_jobs.fetch_sub(1, Ordering::SeqCst) - 1;
                        // Note: Precision loss acceptable for metrics
                        #[allow(clippy::cast_precision_loss)]
                        WriterMetrics::record_queue_depth(remaining as f64);
                    }
                    WriteJob::Flush { ack } => {
                        let _ = ack.send(());
                    }
                }
            }

            tracing::debug!(key = %key, "Writer task stopped");
        });

        tx
    }
}
