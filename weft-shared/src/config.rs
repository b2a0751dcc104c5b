//! Configuration management for the Weft engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Global configuration for the engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub worker: WorkerConfig,
    pub queue: QueueConfig,
    pub backoff: BackoffConfig,
    pub resync: ResyncConfig,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent workers per controller
    pub count: usize,

    /// Retries before a failing key is dropped from the queue
    pub max_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 4,
            max_retries: 10,
        }
    }
}

/// Work queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue depth at which a warning is logged
    pub depth_warn_threshold: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            depth_warn_threshold: 1000,
        }
    }
}

/// Per-key exponential backoff for failing reconciles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound on the retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Multiplier applied per consecutive failure
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 300_000,
            multiplier: 2.0,
        }
    }
}

impl BackoffConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Periodic full re-reconciliation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResyncConfig {
    /// Interval between full resyncs in seconds (0 disables)
    pub interval_secs: u64,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self { interval_secs: 600 }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, crate::error::WeftError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::WeftError::Config(format!("read {path}: {e}")))?;
        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| crate::error::WeftError::Config(format!("parse {path}: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), crate::error::WeftError> {
        if self.worker.count == 0 {
            return Err(crate::error::WeftError::Config(
                "worker count must be greater than zero".to_string(),
            ));
        }
        if self.backoff.initial_delay_ms == 0 {
            return Err(crate::error::WeftError::Config(
                "backoff initial delay must be greater than zero".to_string(),
            ));
        }
        if self.backoff.max_delay_ms < self.backoff.initial_delay_ms {
            return Err(crate::error::WeftError::Config(
                "backoff max delay must be at least the initial delay".to_string(),
            ));
        }
        if self.backoff.multiplier < 1.0 {
            return Err(crate::error::WeftError::Config(
                "backoff multiplier must be at least 1.0".to_string(),
            ));
        }
        Ok(())
    }
}
