//! Heap-ordered work queue with per-workspace default priorities

use crate::rate_limiter::ExponentialBackoff;
use crate::WorkQueue;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use weft_shared::ClusterKey;

/// Work queue delivering the highest-priority key first, FIFO among equal
/// priorities. An add with priority 0 resolves through the per-workspace
/// default table; `add_with_priority` overrides it. The dirty/processing
/// contract matches [`crate::IndexedQueue`].
#[derive(Clone)]
pub struct PriorityQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    /// Read-heavy: consulted on every default-priority add.
    workspace_priorities: RwLock<HashMap<String, i32>>,
    limiter: ExponentialBackoff,
    wake_tx: watch::Sender<u64>,
    wake_rx: watch::Receiver<u64>,
}

#[derive(Default)]
struct State {
    heap: BinaryHeap<PrioritizedItem>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    sequence: u64,
    shutting_down: bool,
}

/// Heap entry ordered by descending priority, then arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PrioritizedItem {
    key: String,
    priority: i32,
    sequence: u64,
}

impl Ord for PrioritizedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: greater means dequeued first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for PrioritizedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::with_backoff(ExponentialBackoff::default())
    }

    pub fn with_backoff(limiter: ExponentialBackoff) -> Self {
        let (wake_tx, wake_rx) = watch::channel(0u64);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                workspace_priorities: RwLock::new(HashMap::new()),
                limiter,
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// Default priority for adds from this workspace.
    pub fn set_workspace_priority(&self, workspace: &str, priority: i32) {
        self.inner
            .workspace_priorities
            .write()
            .insert(workspace.to_string(), priority);
    }

    pub fn get_workspace_priority(&self, workspace: &str) -> i32 {
        self.inner
            .workspace_priorities
            .read()
            .get(workspace)
            .copied()
            .unwrap_or(0)
    }

    /// Enqueue with an explicit priority, bypassing the workspace table.
    pub fn add_with_priority(&self, key: &str, priority: i32) {
        self.inner.add(key, priority);
        self.inner.wake();
    }

    fn resolve_priority(&self, key: &str) -> i32 {
        match ClusterKey::parse(key) {
            Ok(parsed) => self.get_workspace_priority(parsed.workspace().as_str()),
            Err(_) => 0,
        }
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Inner {
    fn add(&self, key: &str, priority: i32) {
        let mut state = self.state.lock();
        if state.shutting_down || state.dirty.contains(key) {
            return;
        }
        state.dirty.insert(key.to_string());
        if state.processing.contains(key) {
            return;
        }
        let sequence = state.sequence;
        state.sequence += 1;
        state.heap.push(PrioritizedItem {
            key: key.to_string(),
            priority,
            sequence,
        });
    }

    fn wake(&self) {
        self.wake_tx.send_modify(|version| *version = version.wrapping_add(1));
    }
}

#[async_trait]
impl WorkQueue for PriorityQueue {
    fn add(&self, key: &str) {
        let priority = self.resolve_priority(key);
        self.inner.add(key, priority);
        self.inner.wake();
    }

    fn add_after(&self, key: &str, delay: Duration) {
        let priority = self.resolve_priority(key);
        if delay.is_zero() {
            self.inner.add(key, priority);
            self.inner.wake();
            return;
        }
        let inner = self.inner.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.add(&key, priority);
            inner.wake();
        });
    }

    fn add_rate_limited(&self, key: &str) {
        let delay = self.inner.limiter.when(key);
        self.add_after(key, delay);
    }

    async fn get(&self) -> Option<String> {
        let mut wake = self.inner.wake_rx.clone();
        loop {
            let _ = wake.borrow_and_update();
            {
                let mut state = self.inner.state.lock();
                // Skip heap entries whose key was already delivered through a
                // newer entry; dirty is the source of truth.
                while let Some(item) = state.heap.pop() {
                    if state.dirty.remove(&item.key) {
                        state.processing.insert(item.key.clone());
                        return Some(item.key);
                    }
                }
                if state.shutting_down {
                    return None;
                }
            }
            if wake.changed().await.is_err() {
                return None;
            }
        }
    }

    fn done(&self, key: &str) {
        let mut state = self.inner.state.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            let priority = match ClusterKey::parse(key) {
                Ok(parsed) => self
                    .inner
                    .workspace_priorities
                    .read()
                    .get(parsed.workspace().as_str())
                    .copied()
                    .unwrap_or(0),
                Err(_) => 0,
            };
            let sequence = state.sequence;
            state.sequence += 1;
            state.heap.push(PrioritizedItem {
                key: key.to_string(),
                priority,
                sequence,
            });
            drop(state);
            self.inner.wake();
        }
    }

    fn forget(&self, key: &str) {
        self.inner.limiter.forget(key);
    }

    fn num_requeues(&self, key: &str) -> u32 {
        self.inner.limiter.num_requeues(key)
    }

    fn shut_down(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.wake();
    }

    fn shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }

    fn len(&self) -> usize {
        let state = self.inner.state.lock();
        // Heap entries may be stale; dirty keys not yet delivered are the
        // real backlog.
        state.dirty.iter().filter(|k| !state.processing.contains(*k)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_orders_by_priority_then_arrival() {
        let high = PrioritizedItem {
            key: "a".into(),
            priority: 10,
            sequence: 5,
        };
        let low = PrioritizedItem {
            key: "b".into(),
            priority: 1,
            sequence: 0,
        };
        let earlier = PrioritizedItem {
            key: "c".into(),
            priority: 10,
            sequence: 2,
        };
        assert!(high > low);
        assert!(earlier > high, "FIFO among equal priorities");
    }

    #[tokio::test]
    async fn highest_priority_first_with_fifo_tiebreak() {
        let queue = PriorityQueue::new();
        queue.add_with_priority("root|low", 1);
        queue.add_with_priority("root|first", 5);
        queue.add_with_priority("root|second", 5);
        queue.add_with_priority("root|urgent", 50);

        assert_eq!(queue.get().await.unwrap(), "root|urgent");
        assert_eq!(queue.get().await.unwrap(), "root|first");
        assert_eq!(queue.get().await.unwrap(), "root|second");
        assert_eq!(queue.get().await.unwrap(), "root|low");
    }

    #[tokio::test]
    async fn workspace_defaults_resolve_on_add() {
        let queue = PriorityQueue::new();
        queue.set_workspace_priority("root:system", 100);
        assert_eq!(queue.get_workspace_priority("root:system"), 100);
        assert_eq!(queue.get_workspace_priority("root:user"), 0);

        queue.add("root:user|ns/low");
        queue.add("root:system|ns/critical");
        assert_eq!(queue.get().await.unwrap(), "root:system|ns/critical");
        assert_eq!(queue.get().await.unwrap(), "root:user|ns/low");
    }

    #[tokio::test]
    async fn explicit_priority_overrides_workspace_default() {
        let queue = PriorityQueue::new();
        queue.set_workspace_priority("root:system", 100);
        queue.add("root:system|ns/default");
        queue.add_with_priority("root:user|ns/boosted", 200);
        assert_eq!(queue.get().await.unwrap(), "root:user|ns/boosted");
    }

    #[tokio::test]
    async fn duplicate_adds_coalesce() {
        let queue = PriorityQueue::new();
        queue.add_with_priority("root|a", 1);
        queue.add_with_priority("root|a", 9);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await.unwrap(), "root|a");
        queue.done("root|a");
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn add_during_processing_requeues_on_done() {
        let queue = PriorityQueue::new();
        queue.add_with_priority("root|a", 1);
        let key = queue.get().await.unwrap();
        queue.add_with_priority(&key, 1);
        assert_eq!(queue.len(), 0, "key is held until done releases it");

        queue.done(&key);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await.unwrap(), key);
    }

    #[tokio::test]
    async fn shutdown_wakes_all_getters_and_drains() {
        let queue = PriorityQueue::new();
        queue.add_with_priority("root|pending", 1);
        queue.shut_down();
        assert_eq!(queue.get().await.unwrap(), "root|pending");
        assert_eq!(queue.get().await, None);

        let getters: Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.get().await })
            })
            .collect();
        for getter in getters {
            assert_eq!(getter.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn dequeue_order_is_priority_then_request_time() {
        let queue = PriorityQueue::new();
        for (key, priority) in [("root|a", 3), ("root|b", 7), ("root|c", 3), ("root|d", 7)] {
            queue.add_with_priority(key, priority);
        }
        let mut delivered = Vec::new();
        for _ in 0..4 {
            delivered.push(queue.get().await.unwrap());
        }
        assert_eq!(delivered, vec!["root|b", "root|d", "root|a", "root|c"]);
    }
}
