//! Weft Shared - Common types and utilities for the Weft control plane
//!
//! This crate provides:
//! - Cluster-aware keys scoping every entity to a logical workspace
//! - The engine error taxonomy with retryability classification
//! - Configuration loading and validation
//! - Timestamps, resource quantities, and metrics primitives

pub mod config;
pub mod error;
pub mod key;
pub mod metrics;
pub mod quantity;
pub mod time;

pub use config::{BackoffConfig, EngineConfig, QueueConfig, ResyncConfig, WorkerConfig};
pub use error::{Result, WeftError};
pub use key::{ClusterKey, KeyError, WorkspacePath};
pub use metrics::MetricsCollector;
pub use quantity::{Quantity, QuantityError};
pub use time::Timestamp;
