//! ResourceQuota and the observed inventory it is computed from

use crate::condition::ConditionSet;
use crate::meta::{ObjectMeta, ResourceList, WeftObject};
use serde::{Deserialize, Serialize};
use weft_shared::{Quantity, Timestamp};

/// Well-known resource names the aggregator rolls up.
pub mod resource_names {
    pub const REQUESTS_CPU: &str = "requests.cpu";
    pub const REQUESTS_MEMORY: &str = "requests.memory";
    pub const LIMITS_CPU: &str = "limits.cpu";
    pub const LIMITS_MEMORY: &str = "limits.memory";
    pub const REQUESTS_STORAGE: &str = "requests.storage";
    pub const PODS: &str = "pods";
    pub const PERSISTENT_VOLUME_CLAIMS: &str = "persistentvolumeclaims";
    pub const SERVICES: &str = "services";
    pub const SECRETS: &str = "secrets";
    pub const CONFIG_MAPS: &str = "configmaps";
}

/// Namespaced hard capacity limits within a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceQuota {
    pub metadata: ObjectMeta,
    pub spec: ResourceQuotaSpec,
    #[serde(default)]
    pub status: ResourceQuotaStatus,
}

impl WeftObject for ResourceQuota {
    const KIND: &'static str = "ResourceQuota";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate_create(&self) -> Vec<crate::validation::FieldError> {
        crate::validation::validate_quota(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceQuotaSpec {
    /// Resource name to limit. Extensible beyond the well-known names.
    pub hard: ResourceList,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceQuotaStatus {
    pub hard: ResourceList,

    pub used: ResourceList,

    /// Human-readable `"<resource>: used <used> exceeds limit <hard>"`
    /// entries. Reporting only; admission is not blocked here.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,

    #[serde(skip_serializing_if = "ConditionSet::is_empty")]
    pub conditions: ConditionSet,
}

/// An observed pod, as reported by the syncer for quota accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodObservation {
    pub metadata: ObjectMeta,
    pub phase: PodPhase,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ContainerResources>,
}

impl WeftObject for PodObservation {
    const KIND: &'static str = "PodObservation";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl PodObservation {
    /// Whether this pod consumes quota. Terminal pods do not.
    pub fn consumes_quota(&self) -> bool {
        !matches!(self.phase, PodPhase::Succeeded | PodPhase::Failed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerResources {
    pub name: String,
    #[serde(skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub requests: ResourceList,
}

/// An observed persistent volume claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvcObservation {
    pub metadata: ObjectMeta,
    pub phase: PvcPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_request: Option<Quantity>,
}

impl WeftObject for PvcObservation {
    const KIND: &'static str = "PvcObservation";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PvcPhase {
    #[default]
    Pending,
    Bound,
    Lost,
}
