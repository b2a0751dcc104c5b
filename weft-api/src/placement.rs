//! ClusterWorkloadPlacement - policy filtering and ranking sync targets

use crate::condition::ConditionSet;
use crate::meta::{ObjectMeta, WeftObject};
use crate::selector::LabelSelector;
use crate::synctarget::TaintEffect;
use serde::{Deserialize, Serialize};
use weft_shared::Timestamp;

/// A placement policy: which sync targets may host a class of workloads,
/// and how candidates are ranked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterWorkloadPlacement {
    pub metadata: ObjectMeta,
    pub spec: PlacementSpec,
    #[serde(default)]
    pub status: PlacementStatus,
}

impl WeftObject for ClusterWorkloadPlacement {
    const KIND: &'static str = "ClusterWorkloadPlacement";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate_create(&self) -> Vec<crate::validation::FieldError> {
        crate::validation::validate_placement(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementSpec {
    /// Targets must carry labels matching this selector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_selector: Option<LocationSelector>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_requirements: Option<PlacementResourceRequirements>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica_bounds: Option<ReplicaBounds>,

    /// Taints on target cells this policy tolerates. Recorded for the
    /// syncer; the evaluator does not filter on taints.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spread_constraints: Vec<SpreadConstraint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationSelector {
    /// A target passes only if its location equals one of these.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required_locations: Vec<String>,

    /// Scoring-only: exact hits raise the target's score, never filter.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub preferred_locations: Vec<String>,
}

/// Minimum allocatable capacity a target must offer. Quantity strings are
/// parsed at evaluation time; targets reporting no capacity at all are
/// accepted conservatively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementResourceRequirements {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_cpu: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_memory: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReplicaBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    pub key: String,
    pub operator: TolerationOperator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<TaintEffect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TolerationOperator {
    Exists,
    Equal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadConstraint {
    /// Cell label key workloads are spread across.
    pub topology_key: String,
    pub max_skew: i32,
    pub when_unsatisfiable: UnsatisfiableConstraintAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnsatisfiableConstraintAction {
    DoNotSchedule,
    ScheduleAnyway,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementStatus {
    pub selected_count: u32,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub selections: Vec<TargetSelection>,

    #[serde(skip_serializing_if = "ConditionSet::is_empty")]
    pub conditions: ConditionSet,
}

/// Outcome of evaluating one sync target against the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSelection {
    pub target_name: String,
    pub workspace: String,
    pub selected: bool,
    pub reason: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_evaluation: Option<Timestamp>,
}
