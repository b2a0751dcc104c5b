//! Metrics collection for Weft components

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe counter/gauge collector.
///
/// Names are registered on first use; reads of unknown names return zero.
/// There is no exporter here; callers snapshot and expose as they see fit.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
    gauges: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter
    pub fn increment_counter(&self, name: &str, value: u64) {
        self.slot(&self.counters, name).fetch_add(value, Ordering::Relaxed);
    }

    /// Set a gauge value
    pub fn set_gauge(&self, name: &str, value: u64) {
        self.slot(&self.gauges, name).store(value, Ordering::Relaxed);
    }

    /// Get counter value
    pub fn get_counter(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Get gauge value
    pub fn get_gauge(&self, name: &str) -> u64 {
        self.gauges
            .read()
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Snapshot of all counters and gauges
    pub fn snapshot(&self) -> HashMap<String, u64> {
        let mut out = HashMap::new();
        for (name, value) in self.counters.read().iter() {
            out.insert(name.clone(), value.load(Ordering::Relaxed));
        }
        for (name, value) in self.gauges.read().iter() {
            out.insert(name.clone(), value.load(Ordering::Relaxed));
        }
        out
    }

    fn slot(&self, map: &RwLock<HashMap<String, Arc<AtomicU64>>>, name: &str) -> Arc<AtomicU64> {
        if let Some(existing) = map.read().get(name) {
            return existing.clone();
        }
        map.write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }
}
