//! WorkloadDistribution - the per-location replica plan for one workload

use crate::condition::ConditionSet;
use crate::meta::{ObjectMeta, ResourceList, WeftObject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use weft_shared::Timestamp;

/// Priority assigned to explicit distribution entries that carry none.
pub const DEFAULT_LOCATION_PRIORITY: i32 = 50;
/// Default delay before the old side of a blue/green rollout is scaled down.
pub const DEFAULT_SCALE_DOWN_DELAY_SECONDS: i32 = 30;
/// Default rolling-update budgets.
pub const DEFAULT_MAX_UNAVAILABLE_PERCENT: i32 = 25;
pub const DEFAULT_MAX_SURGE_PERCENT: i32 = 25;

/// The imperative contract driving a single workload onto N locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadDistribution {
    pub metadata: ObjectMeta,
    pub spec: DistributionSpec,
    #[serde(default)]
    pub status: DistributionStatus,
}

impl WeftObject for WorkloadDistribution {
    const KIND: &'static str = "WorkloadDistribution";

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
        crate::validation::validate_distribution(self)
    }

    fn validate_update(&self, old: &Self) -> Vec<crate::validation::FieldError> {
        crate::validation::validate_distribution_update(self, old)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistributionSpec {
    /// The workload being distributed. Immutable after creation.
    pub workload_ref: WorkloadReference,

    pub total_replicas: i32,

    /// Either a policy reference or explicit distributions must be set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_policy_ref: Option<PlacementPolicyRef>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<LocationDistribution>,

    pub strategy: RolloutStrategy,

    /// Per-location resource overrides applied by the transform layer.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_overrides: BTreeMap<String, ResourceList>,

    pub paused: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkloadReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementPolicyRef {
    pub name: String,
}

/// One explicit per-location replica assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDistribution {
    pub location_name: String,
    pub replicas: i32,
    /// 0-100; lower sorts earlier in the rollout. Defaulted to 50.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolloutStrategy {
    #[serde(rename = "type")]
    pub type_: RolloutType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolling_update: Option<RollingUpdateStrategy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub blue_green: Option<BlueGreenStrategy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RolloutType {
    #[default]
    RollingUpdate,
    Recreate,
    BlueGreen,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RollingUpdateStrategy {
    /// Replicas that may be unavailable below target during an update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<IntOrPercent>,

    /// Replicas that may be created above target during an update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<IntOrPercent>,

    /// Locations with rollout ordinal >= partition are left on the old spec.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlueGreenStrategy {
    pub active_service: String,

    /// Derived as `<activeService>-preview` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_service: Option<String>,

    pub auto_promotion_enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_down_delay_seconds: Option<i32>,
}

impl Default for BlueGreenStrategy {
    fn default() -> Self {
        Self {
            active_service: String::new(),
            preview_service: None,
            auto_promotion_enabled: false,
            scale_down_delay_seconds: None,
        }
    }
}

/// An absolute count or a percentage of total replicas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntOrPercent {
    Int(i32),
    Percent(PercentValue),
}

/// A percentage literal such as `"25%"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PercentValue(pub i32);

impl Serialize for PercentValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}%", self.0))
    }
}

impl<'de> Deserialize<'de> for PercentValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let raw = String::deserialize(deserializer)?;
        let digits = raw
            .strip_suffix('%')
            .ok_or_else(|| D::Error::custom(format!("expected percentage, got {raw:?}")))?;
        let value: i32 = digits
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid percentage {raw:?}")))?;
        Ok(PercentValue(value))
    }
}

impl IntOrPercent {
    pub fn percent(value: i32) -> Self {
        IntOrPercent::Percent(PercentValue(value))
    }
}

impl fmt::Display for IntOrPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntOrPercent::Int(v) => write!(f, "{v}"),
            IntOrPercent::Percent(PercentValue(v)) => write!(f, "{v}%"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DistributionStatus {
    pub phase: DistributionPhase,

    pub current_replicas: i32,
    pub ready_replicas: i32,
    pub updated_replicas: i32,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<LocationStatus>,

    pub observed_generation: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_distribution_time: Option<Timestamp>,

    #[serde(skip_serializing_if = "ConditionSet::is_empty")]
    pub conditions: ConditionSet,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionPhase {
    #[default]
    Pending,
    Distributing,
    Distributed,
    Failed,
    Paused,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationStatus {
    pub location_name: String,
    pub allocated_replicas: i32,
    pub current_replicas: i32,
    pub ready_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<Timestamp>,
    pub synced_generation: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl WorkloadDistribution {
    /// Apply create-time defaults: rollout strategy parameters, blue/green
    /// preview naming, explicit distribution priorities, and the phase.
    pub fn apply_defaults(&mut self) {
        match self.spec.strategy.type_ {
            RolloutType::RollingUpdate => {
                let rolling = self
                    .spec
                    .strategy
                    .rolling_update
                    .get_or_insert_with(RollingUpdateStrategy::default);
                if rolling.max_unavailable.is_none() {
                    rolling.max_unavailable =
                        Some(IntOrPercent::percent(DEFAULT_MAX_UNAVAILABLE_PERCENT));
                }
                if rolling.max_surge.is_none() {
                    rolling.max_surge = Some(IntOrPercent::percent(DEFAULT_MAX_SURGE_PERCENT));
                }
            }
            RolloutType::BlueGreen => {
                if let Some(blue_green) = self.spec.strategy.blue_green.as_mut() {
                    if blue_green.preview_service.is_none() {
                        blue_green.preview_service =
                            Some(format!("{}-preview", blue_green.active_service));
                    }
                    if blue_green.scale_down_delay_seconds.is_none() {
                        blue_green.scale_down_delay_seconds =
                            Some(DEFAULT_SCALE_DOWN_DELAY_SECONDS);
                    }
                }
            }
            RolloutType::Recreate => {}
        }
        for entry in &mut self.spec.distributions {
            if entry.priority.is_none() {
                entry.priority = Some(DEFAULT_LOCATION_PRIORITY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distribution() -> WorkloadDistribution {
        WorkloadDistribution {
            metadata: ObjectMeta::namespaced("root:org", "default", "web"),
            spec: DistributionSpec {
                workload_ref: WorkloadReference {
                    api_version: "apps/v1".into(),
                    kind: "Deployment".into(),
                    name: "web".into(),
                    namespace: Some("default".into()),
                },
                total_replicas: 10,
                ..Default::default()
            },
            status: DistributionStatus::default(),
        }
    }

    #[test]
    fn rolling_update_defaults() {
        let mut dist = distribution();
        dist.apply_defaults();
        let rolling = dist.spec.strategy.rolling_update.unwrap();
        assert_eq!(rolling.max_unavailable, Some(IntOrPercent::percent(25)));
        assert_eq!(rolling.max_surge, Some(IntOrPercent::percent(25)));
        assert_eq!(dist.status.phase, DistributionPhase::Pending);
    }

    #[test]
    fn blue_green_defaults_derive_preview_service() {
        let mut dist = distribution();
        dist.spec.strategy.type_ = RolloutType::BlueGreen;
        dist.spec.strategy.blue_green = Some(BlueGreenStrategy {
            active_service: "web-active".into(),
            ..Default::default()
        });
        dist.apply_defaults();

        let blue_green = dist.spec.strategy.blue_green.unwrap();
        assert_eq!(blue_green.preview_service.as_deref(), Some("web-active-preview"));
        assert_eq!(blue_green.scale_down_delay_seconds, Some(30));
        assert!(dist.spec.strategy.rolling_update.is_none());
    }

    #[test]
    fn explicit_distribution_priorities_default_to_50() {
        let mut dist = distribution();
        dist.spec.distributions = vec![
            LocationDistribution {
                location_name: "a".into(),
                replicas: 5,
                priority: Some(10),
            },
            LocationDistribution {
                location_name: "b".into(),
                replicas: 5,
                priority: None,
            },
        ];
        dist.apply_defaults();
        assert_eq!(dist.spec.distributions[0].priority, Some(10));
        assert_eq!(dist.spec.distributions[1].priority, Some(50));
    }

    #[test]
    fn int_or_percent_wire_forms() {
        let int: IntOrPercent = serde_json::from_str("3").unwrap();
        assert_eq!(int, IntOrPercent::Int(3));

        let percent: IntOrPercent = serde_json::from_str("\"25%\"").unwrap();
        assert_eq!(percent, IntOrPercent::percent(25));
        assert_eq!(serde_json::to_string(&percent).unwrap(), "\"25%\"");

        assert!(serde_json::from_str::<IntOrPercent>("\"25\"").is_err());
    }
}
