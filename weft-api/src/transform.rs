//! WorkloadTransform - declarative per-location mutation rules

use crate::condition::ConditionSet;
use crate::meta::{ObjectMeta, WeftObject};
use crate::selector::LabelSelector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weft_shared::Timestamp;

/// Declarative mutations applied to a workload as it lands on each location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadTransform {
    pub metadata: ObjectMeta,
    pub spec: TransformSpec,
    #[serde(default)]
    pub status: TransformStatus,
}

impl WeftObject for WorkloadTransform {
    const KIND: &'static str = "WorkloadTransform";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }

    fn validate_create(&self) -> Vec<crate::validation::FieldError> {
        crate::validation::validate_transform(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformSpec {
    pub target_ref: TransformTargetRef,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transformations: Vec<Transformation>,

    /// 0-1000; higher-priority transforms apply later and win conflicts.
    pub priority: i32,

    pub paused: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub location_selectors: Vec<LabelSelector>,
}

/// Which objects the transform applies to: a concrete name or a selector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformTargetRef {
    pub api_version: String,
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<LabelSelector>,
}

/// One mutation, tagged by operation. Unknown discriminators fail
/// deserialization, and the validator re-checks each payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Transformation {
    #[serde(rename = "JSONPatch")]
    JsonPatch {
        /// RFC 6902 operations.
        patch: serde_json::Value,
    },
    StrategicMerge {
        patch: serde_json::Value,
    },
    Replace {
        path: String,
        value: serde_json::Value,
    },
    Remove {
        path: String,
    },
    Annotate {
        annotations: BTreeMap<String, String>,
    },
    Label {
        labels: BTreeMap<String, String>,
    },
}

impl Transformation {
    /// The wire discriminator for this operation.
    pub fn kind(&self) -> &'static str {
        match self {
            Transformation::JsonPatch { .. } => "JSONPatch",
            Transformation::StrategicMerge { .. } => "StrategicMerge",
            Transformation::Replace { .. } => "Replace",
            Transformation::Remove { .. } => "Remove",
            Transformation::Annotate { .. } => "Annotate",
            Transformation::Label { .. } => "Label",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransformStatus {
    pub applied_locations: u32,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<TransformApplication>,

    #[serde(skip_serializing_if = "ConditionSet::is_empty")]
    pub conditions: ConditionSet,
}

/// Record of one location the transform was applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformApplication {
    pub location_name: String,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_applied: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}
