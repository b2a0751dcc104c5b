//! Per-key exponential backoff

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use weft_shared::BackoffConfig;

/// Tracks consecutive failures per key and produces the delay before the
/// next retry: `base * multiplier^failures`, clamped to the configured max.
/// Forgetting a key removes its entry entirely.
#[derive(Debug)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    multiplier: f64,
    requeues: Mutex<HashMap<String, u32>>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            base,
            max,
            multiplier,
            requeues: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(config.initial_delay(), config.max_delay(), config.multiplier)
    }

    /// Delay before the next retry of `key`, advancing its failure count.
    pub fn when(&self, key: &str) -> Duration {
        let mut requeues = self.requeues.lock();
        let count = requeues.entry(key.to_string()).or_insert(0);
        let exponent = *count;
        *count += 1;

        let delay = self.base.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let delay = Duration::from_secs_f64(delay.min(self.max.as_secs_f64()));
        delay.min(self.max)
    }

    /// Consecutive requeues recorded for `key`.
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.requeues.lock().get(key).copied().unwrap_or(0)
    }

    /// Drop all backoff state for `key`.
    pub fn forget(&self, key: &str) {
        self.requeues.lock().remove(key);
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
