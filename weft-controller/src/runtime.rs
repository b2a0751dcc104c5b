//! Worker pool runtime
//!
//! A fixed pool of workers drains one work queue into one reconciler. Per
//! item: success forgets the key's backoff and releases it; a retryable
//! error re-queues with backoff until the retry budget is spent, then the
//! key is logged and dropped (a later event re-enqueues it); validation and
//! terminal errors are never retried. Reconciler panics are recovered and
//! treated as retryable errors.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weft_queue::WorkQueue;
use weft_shared::{MetricsCollector, Result, WeftError};

/// What a successful reconcile wants next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileAction {
    /// Re-reconcile this key after the interval (timer-driven state such as
    /// blue/green scale-down delays).
    pub requeue_after: Option<Duration>,
}

impl ReconcileAction {
    /// Nothing more to do until the next event.
    pub fn done() -> Self {
        Self::default()
    }

    pub fn requeue_after(delay: Duration) -> Self {
        Self {
            requeue_after: Some(delay),
        }
    }
}

/// One reconciliation unit driven by the worker pool.
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Reconcile one cluster-aware key. Not-found objects are success, not
    /// errors; the runtime then forgets the key.
    async fn reconcile(&self, key: &str) -> Result<ReconcileAction>;
}

/// A named worker pool binding a queue to a reconciler.
pub struct Controller<Q: WorkQueue + Clone> {
    name: String,
    queue: Q,
    reconciler: Arc<dyn Reconciler>,
    worker_count: usize,
    max_retries: u32,
    metrics: Arc<MetricsCollector>,
}

impl<Q: WorkQueue + Clone> Controller<Q> {
    pub fn new(
        name: impl Into<String>,
        queue: Q,
        reconciler: Arc<dyn Reconciler>,
        worker_count: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            name: name.into(),
            queue,
            reconciler,
            worker_count: worker_count.max(1),
            max_retries,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Run until `shutdown` fires, then drain in-flight work and return.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(controller = %self.name, workers = self.worker_count, "starting controller");

        // Shutdown propagation: cancel -> queue shutdown wakes blocked
        // getters, which then observe the drained queue and exit.
        {
            let queue = self.queue.clone();
            let token = shutdown.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                queue.shut_down();
            });
        }

        let mut workers = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let queue = self.queue.clone();
            let reconciler = self.reconciler.clone();
            let name = self.name.clone();
            let metrics = self.metrics.clone();
            let max_retries = self.max_retries;
            workers.push(tokio::spawn(async move {
                worker_loop(name, worker_id, queue, reconciler, max_retries, metrics).await;
            }));
        }

        for worker in workers {
            let _ = worker.await;
        }
        tracing::info!(controller = %self.name, "controller stopped");
    }
}

async fn worker_loop<Q: WorkQueue>(
    controller: String,
    worker_id: usize,
    queue: Q,
    reconciler: Arc<dyn Reconciler>,
    max_retries: u32,
    metrics: Arc<MetricsCollector>,
) {
    while let Some(key) = queue.get().await {
        let result = AssertUnwindSafe(reconciler.reconcile(&key))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(action)) => {
                metrics.increment_counter("reconcile_success", 1);
                queue.forget(&key);
                queue.done(&key);
                if let Some(delay) = action.requeue_after {
                    queue.add_after(&key, delay);
                }
            }
            Ok(Err(err)) => {
                metrics.increment_counter("reconcile_error", 1);
                handle_error(&controller, worker_id, &queue, &key, &err, max_retries, &metrics);
            }
            Err(panic) => {
                metrics.increment_counter("reconcile_panic", 1);
                let message = panic_message(panic);
                tracing::error!(
                    controller = %controller,
                    worker = worker_id,
                    key = %key,
                    panic = %message,
                    "reconciler panicked; treating as retryable error"
                );
                let err = WeftError::Internal { message };
                retry_or_drop(&controller, &queue, &key, &err, max_retries, &metrics);
            }
        }
    }
    tracing::debug!(controller = %controller, worker = worker_id, "worker exiting");
}

fn handle_error<Q: WorkQueue>(
    controller: &str,
    worker_id: usize,
    queue: &Q,
    key: &str,
    err: &WeftError,
    max_retries: u32,
    metrics: &MetricsCollector,
) {
    if err.is_retryable() {
        retry_or_drop(controller, queue, key, err, max_retries, metrics);
    } else {
        // Validation and terminal errors are surfaced through status
        // conditions by the reconciler; retrying cannot help.
        tracing::warn!(
            controller = %controller,
            worker = worker_id,
            key = %key,
            error = %err,
            category = err.category(),
            "non-retryable reconcile error; dropping key"
        );
        metrics.increment_counter("reconcile_dropped", 1);
        queue.forget(key);
        queue.done(key);
    }
}

fn retry_or_drop<Q: WorkQueue>(
    controller: &str,
    queue: &Q,
    key: &str,
    err: &WeftError,
    max_retries: u32,
    metrics: &MetricsCollector,
) {
    if queue.num_requeues(key) < max_retries {
        tracing::debug!(
            controller = %controller,
            key = %key,
            error = %err,
            retries = queue.num_requeues(key),
            "requeueing with backoff"
        );
        metrics.increment_counter("reconcile_retried", 1);
        queue.add_rate_limited(key);
        queue.done(key);
    } else {
        tracing::error!(
            controller = %controller,
            key = %key,
            error = %err,
            retries = queue.num_requeues(key),
            "retry budget exhausted; dropping key"
        );
        metrics.increment_counter("reconcile_dropped", 1);
        queue.forget(key);
        queue.done(key);
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
