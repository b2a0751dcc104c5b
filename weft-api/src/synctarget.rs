//! SyncTarget - a physical cluster usable as a workload destination

use crate::condition::ConditionSet;
use crate::meta::{ObjectMeta, ResourceList, WeftObject};
use crate::selector::LabelSelector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weft_shared::Timestamp;

/// Default grace period before workloads are evicted from a lost target.
pub const DEFAULT_EVICT_AFTER_SECONDS: i64 = 300;
/// Default syncer mode.
pub const DEFAULT_SYNC_MODE: &str = "push";
/// Default syncer interval.
pub const DEFAULT_SYNC_INTERVAL_SECONDS: u64 = 30;

/// Label key cells are defaulted under when they carry no explicit location.
pub const LOCATION_LABEL: &str = "location";

/// A physical cluster registered as a workload destination.
///
/// Cluster-scoped: identified by workspace + name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTarget {
    pub metadata: ObjectMeta,
    pub spec: SyncTargetSpec,
    #[serde(default)]
    pub status: SyncTargetStatus,
}

impl WeftObject for SyncTarget {
    const KIND: &'static str = "SyncTarget";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn default_on_create(&mut self) {
        self.apply_defaults();
    }

    fn validate_create(&self) -> Vec<crate::validation::FieldError> {
        crate::validation::validate_sync_target(self)
    }

    fn validate_update(&self, old: &Self) -> Vec<crate::validation::FieldError> {
        crate::validation::validate_sync_target_update(self, old)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncTargetSpec {
    /// Failure domains of this cluster; at least one is required.
    pub cells: Vec<Cell>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ClusterConnection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<ClusterCredentials>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<ClusterCapabilities>,

    /// Restricts which workloads this target accepts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workload_selector: Option<LabelSelector>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supported_api_exports: Vec<ApiExportRef>,

    /// Excluded from placement while true.
    pub unschedulable: bool,

    /// Grace period in seconds before workloads are evicted from a lost
    /// target. Defaulted on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evict_after_seconds: Option<i64>,

    /// Physical location used by placement location selectors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    pub syncer: SyncerConfig,
}

/// A failure-domain subdivision of a target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cell {
    /// DNS label, unique within the target.
    pub name: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<Taint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taint {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub effect: TaintEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

/// How to reach the target cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterConnection {
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

/// Credentials for the syncer, tagged by mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClusterCredentials {
    Token { token: String },
    Certificate { client_cert: String, client_key: String },
    ServiceAccount { namespace: String, name: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterCapabilities {
    /// Cap on concurrently placed workloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_workloads: Option<u32>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub supported_gvks: Vec<GroupVersionKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupVersionKind {
    pub api_version: String,
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiExportRef {
    pub workspace: String,
    pub name: String,
}

/// Syncer behavior knobs, defaulted on create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_mode: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_interval_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryBackoff>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryBackoff {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 300_000,
            multiplier: 2.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncTargetStatus {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub capacity: ResourceList,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub allocatable: ResourceList,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub allocated: ResourceList,

    pub connection_state: ConnectionState,

    pub sync_state: SyncState,

    pub health: ClusterHealth,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub synced_resources: Vec<String>,

    #[serde(skip_serializing_if = "ConditionSet::is_empty")]
    pub conditions: ConditionSet,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Connecting,
    #[default]
    Disconnected,
    Error,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    Ready,
    #[default]
    NotReady,
    Syncing,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterHealth {
    pub status: HealthStatusType,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checks: Vec<HealthCheck>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatusType {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthCheckStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthCheckStatus {
    Passed,
    Failed,
    Unknown,
}

impl SyncTarget {
    /// Apply create-time defaults: eviction grace, syncer mode/interval and
    /// retry backoff, and a `location` label on cells that carry none.
    pub fn apply_defaults(&mut self) {
        if self.spec.evict_after_seconds.is_none() {
            self.spec.evict_after_seconds = Some(DEFAULT_EVICT_AFTER_SECONDS);
        }
        if self.spec.syncer.sync_mode.is_none() {
            self.spec.syncer.sync_mode = Some(DEFAULT_SYNC_MODE.to_string());
        }
        if self.spec.syncer.sync_interval_seconds.is_none() {
            self.spec.syncer.sync_interval_seconds = Some(DEFAULT_SYNC_INTERVAL_SECONDS);
        }
        if self.spec.syncer.retry.is_none() {
            self.spec.syncer.retry = Some(RetryBackoff::default());
        }
        for cell in &mut self.spec.cells {
            if !cell.labels.contains_key(LOCATION_LABEL) {
                cell.labels
                    .insert(LOCATION_LABEL.to_string(), cell.name.clone());
            }
        }
    }
}
