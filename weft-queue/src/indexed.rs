//! FIFO work queue with rate limiting and secondary indexes

use crate::indexers::IndexFunc;
use crate::rate_limiter::ExponentialBackoff;
use crate::WorkQueue;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use weft_shared::{MetricsCollector, Result, WeftError};

/// Names of the built-in indexes.
pub mod index_names {
    pub const BY_WORKSPACE: &str = "byWorkspace";
    pub const BY_NAMESPACE: &str = "byNamespace";
    pub const BY_RESOURCE_TYPE: &str = "byResourceType";
    pub const BY_WORKSPACE_AND_NAMESPACE: &str = "byWorkspaceAndNamespace";
}

/// FIFO queue of cluster-aware keys with at-least-once delivery.
///
/// A key is delivered to exactly one getter at a time; adds arriving while
/// the key is processing mark it dirty so `done` re-queues it once. Named
/// secondary indexes track every key that is dirty or processing, and a key
/// leaves all indexes when it leaves both sets.
#[derive(Clone)]
pub struct IndexedQueue {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    state: Mutex<State>,
    limiter: ExponentialBackoff,
    metrics: Arc<MetricsCollector>,
    wake_tx: watch::Sender<u64>,
    wake_rx: watch::Receiver<u64>,
}

#[derive(Default)]
struct State {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    indexed: HashSet<String>,
    indexes: HashMap<String, IndexState>,
    shutting_down: bool,
}

struct IndexState {
    func: IndexFunc,
    by_value: HashMap<String, HashSet<String>>,
    values_by_key: HashMap<String, Vec<String>>,
}

impl IndexedQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_backoff(name, ExponentialBackoff::default())
    }

    pub fn with_backoff(name: impl Into<String>, limiter: ExponentialBackoff) -> Self {
        let (wake_tx, wake_rx) = watch::channel(0u64);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(State::default()),
                limiter,
                metrics: Arc::new(MetricsCollector::new()),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// Queue-local metrics: `<name>_adds`, `<name>_depth`, `<name>_retries`.
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.inner.metrics.clone()
    }

    /// Register a named index. Keys already queued or processing are
    /// back-filled. Fails if the name is taken.
    pub fn add_indexer(&self, name: impl Into<String>, func: IndexFunc) -> Result<()> {
        let name = name.into();
        let mut state = self.inner.state.lock();
        if state.indexes.contains_key(&name) {
            return Err(WeftError::Internal {
                message: format!("index already exists: {name}"),
            });
        }

        let mut index = IndexState {
            func,
            by_value: HashMap::new(),
            values_by_key: HashMap::new(),
        };
        let keys: Vec<String> = state.indexed.iter().cloned().collect();
        for key in keys {
            file_key(&self.inner.name, &name, &mut index, &key);
        }
        state.indexes.insert(name, index);
        Ok(())
    }

    /// Snapshot of the keys filed under `value` in the named index.
    pub fn get_by_index(&self, index: &str, value: &str) -> Result<Vec<String>> {
        let state = self.inner.state.lock();
        let index = state.indexes.get(index).ok_or_else(|| WeftError::Internal {
            message: format!("index not found: {index}"),
        })?;
        let mut keys: Vec<String> = index
            .by_value
            .get(value)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }

    /// All values present in the named index.
    pub fn index_values(&self, index: &str) -> Result<Vec<String>> {
        let state = self.inner.state.lock();
        let index = state.indexes.get(index).ok_or_else(|| WeftError::Internal {
            message: format!("index not found: {index}"),
        })?;
        let mut values: Vec<String> = index.by_value.keys().cloned().collect();
        values.sort();
        Ok(values)
    }
}

impl Inner {
    fn add(&self, key: &str) {
        let mut state = self.state.lock();
        if state.shutting_down || state.dirty.contains(key) {
            return;
        }
        state.dirty.insert(key.to_string());
        self.index_key(&mut state, key);
        self.metrics.increment_counter(&format!("{}_adds", self.name), 1);

        if state.processing.contains(key) {
            return;
        }
        state.queue.push_back(key.to_string());
        self.metrics
            .set_gauge(&format!("{}_depth", self.name), state.queue.len() as u64);
        drop(state);
        self.wake();
    }

    fn index_key(&self, state: &mut State, key: &str) {
        if !state.indexed.insert(key.to_string()) {
            return;
        }
        for (name, index) in state.indexes.iter_mut() {
            file_key(&self.name, name, index, key);
        }
    }

    fn unindex_key(&self, state: &mut State, key: &str) {
        if !state.indexed.remove(key) {
            return;
        }
        for index in state.indexes.values_mut() {
            if let Some(values) = index.values_by_key.remove(key) {
                for value in values {
                    if let Some(keys) = index.by_value.get_mut(&value) {
                        keys.remove(key);
                        if keys.is_empty() {
                            index.by_value.remove(&value);
                        }
                    }
                }
            }
        }
    }

    fn wake(&self) {
        self.wake_tx.send_modify(|version| *version = version.wrapping_add(1));
    }
}

/// Run one index function for one key, filing the results. Index errors log
/// and skip the pair without failing the add.
fn file_key(queue: &str, index_name: &str, index: &mut IndexState, key: &str) {
    match (index.func)(key) {
        Ok(values) => {
            for value in &values {
                index
                    .by_value
                    .entry(value.clone())
                    .or_default()
                    .insert(key.to_string());
            }
            index.values_by_key.insert(key.to_string(), values);
        }
        Err(err) => {
            tracing::warn!(
                queue,
                index = index_name,
                key,
                error = %err,
                "index function failed; key not filed"
            );
        }
    }
}

#[async_trait]
impl WorkQueue for IndexedQueue {
    fn add(&self, key: &str) {
        self.inner.add(key);
    }

    fn add_after(&self, key: &str, delay: Duration) {
        if delay.is_zero() {
            self.inner.add(key);
            return;
        }
        let inner = self.inner.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.add(&key);
        });
    }

    fn add_rate_limited(&self, key: &str) {
        let delay = self.inner.limiter.when(key);
        self.inner
            .metrics
            .increment_counter(&format!("{}_retries", self.inner.name), 1);
        self.add_after(key, delay);
    }

    async fn get(&self) -> Option<String> {
        let mut wake = self.inner.wake_rx.clone();
        loop {
            // Mark the current wake version seen before checking state, so a
            // concurrent add cannot slip between check and wait.
            let _ = wake.borrow_and_update();
            {
                let mut state = self.inner.state.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    self.inner
                        .metrics
                        .set_gauge(&format!("{}_depth", self.inner.name), state.queue.len() as u64);
                    return Some(key);
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
            state.queue.push_back(key.to_string());
            drop(state);
            self.inner.wake();
        } else {
            self.inner.unindex_key(&mut state, key);
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
        self.inner.state.lock().queue.len()
    }
}
