//! Weft Queue - Work queues driving the reconciler runtime
//!
//! Two queue flavors share one contract: at-least-once delivery of string
//! keys with duplicate suppression (a key being processed is marked dirty and
//! re-queued on `done`), per-key exponential-backoff requeues, and shutdown
//! that wakes every blocked getter.
//!
//! - [`IndexedQueue`] is FIFO with named secondary indexes over queued keys.
//! - [`PriorityQueue`] orders by descending priority with FIFO tiebreak and
//!   resolves default priorities per workspace.

pub mod indexed;
pub mod indexers;
pub mod priority;
pub mod rate_limiter;

pub use indexed::{index_names, IndexedQueue};
pub use indexers::{
    by_namespace, by_resource_type, by_workspace, by_workspace_and_namespace, IndexFunc,
};
pub use priority::PriorityQueue;
pub use rate_limiter::ExponentialBackoff;

use async_trait::async_trait;
use std::time::Duration;

/// The queue surface the worker runtime drains.
///
/// `get` resolves to `None` only when shutdown has been signalled and the
/// queue is drained; a popped key stays "processing" until `done`.
#[async_trait]
pub trait WorkQueue: Send + Sync + 'static {
    /// Enqueue if not already queued or processing; a key re-added while
    /// processing is re-queued once `done` releases it.
    fn add(&self, key: &str);

    /// Enqueue after `delay`; duplicate suppression coalesces overlapping
    /// delayed adds, so cancellation is never needed.
    fn add_after(&self, key: &str, delay: Duration);

    /// Enqueue after the backoff delay for this key, bumping its retry count.
    fn add_rate_limited(&self, key: &str);

    /// Block until a key is available, marking it as processing.
    async fn get(&self) -> Option<String>;

    /// Release the processing mark; re-queues the key if it went dirty.
    fn done(&self, key: &str);

    /// Reset the backoff state for this key.
    fn forget(&self, key: &str);

    /// Consecutive rate-limited requeues for this key.
    fn num_requeues(&self, key: &str) -> u32;

    fn shut_down(&self);

    fn shutting_down(&self) -> bool;

    /// Keys waiting in the queue (excluding those currently processing).
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
