//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the cart runtime:
//! - Store action processing and reducer execution
//! - Effect execution (by type)
//! - Storage write queue throughput and depth
//! - Storage load outcomes
//! - Retry and dead letter queue activity
//!
//! # Example
//!
//! ```rust,no_run
//! use trolley_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Start metrics server on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
    /// Failed to bind HTTP server
    #[error("Failed to bind metrics server: {0}")]
    Bind(#[from] std::io::Error),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Initialize metrics and start the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns error if metrics exporter cannot be installed or server cannot bind.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), this will
    /// warn and succeed. In production, ensure this is only called once.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            // Configure histogram buckets for latency measurements
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        // In tests, install may fail if a recorder is already registered
        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!(
                        "Metrics recorder already initialized, skipping re-initialization"
                    );
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Store Metrics
    describe_counter!(
        "store.actions.total",
        "Total number of actions processed by the store"
    );
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time taken to execute the reducer"
    );
    describe_histogram!(
        "store.effects.count",
        "Number of effects produced per action"
    );
    describe_counter!(
        "store.effects.executed",
        "Total number of effects executed, labeled by type"
    );

    // Storage Write Queue Metrics
    describe_counter!(
        "storage.writes.enqueued",
        "Total number of writes handed to the write queue"
    );
    describe_counter!(
        "storage.writes.completed",
        "Total number of writes durably completed"
    );
    describe_counter!(
        "storage.writes.failed",
        "Total number of writes that failed after exhausting retries"
    );
    describe_histogram!(
        "storage.write.duration_seconds",
        "Time taken to complete a storage write (including retries)"
    );
    describe_gauge!(
        "storage.queue.depth",
        "Number of writes currently queued or in flight"
    );

    // Storage Load Metrics
    describe_counter!(
        "storage.loads.completed",
        "Total number of storage loads that completed"
    );
    describe_counter!(
        "storage.loads.failed",
        "Total number of storage loads that failed after exhausting retries"
    );

    // Retry Metrics
    describe_counter!("store.retry.attempt", "Total number of retry attempts");
    describe_counter!(
        "store.retry.success",
        "Total number of operations that succeeded after retrying"
    );
    describe_counter!(
        "store.retry.exhausted",
        "Total number of operations that exhausted their retry budget"
    );

    // Shutdown Metrics
    describe_counter!(
        "store.shutdown.initiated",
        "Total number of shutdowns initiated"
    );
    describe_counter!(
        "store.shutdown.completed",
        "Total number of shutdowns that completed cleanly"
    );
    describe_counter!(
        "store.shutdown.timeout",
        "Total number of shutdowns that timed out"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Total number of actions rejected because the store was shutting down"
    );

    // Dead Letter Queue Metrics
    describe_gauge!("dlq.size", "Current number of entries in the dead letter queue");
    describe_counter!("dlq.pushed", "Total number of entries pushed to the dead letter queue");
    describe_counter!(
        "dlq.dropped",
        "Total number of entries dropped because the dead letter queue was full"
    );
    describe_counter!(
        "dlq.drained",
        "Total number of entries drained from the dead letter queue"
    );
}

/// Write queue metrics recorder.
pub struct WriterMetrics;

impl WriterMetrics {
    /// Record a write handed to the queue.
    pub fn record_enqueued() {
        counter!("storage.writes.enqueued").increment(1);
    }

    /// Record a durably completed write.
    pub fn record_completed(duration: Duration) {
        counter!("storage.writes.completed").increment(1);
        histogram!("storage.write.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a write that failed after exhausting retries.
    pub fn record_failed() {
        counter!("storage.writes.failed").increment(1);
    }

    /// Record the current queue depth.
    pub fn record_queue_depth(depth: f64) {
        gauge!("storage.queue.depth").set(depth);
    }
}
