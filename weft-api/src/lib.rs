//! Weft API - Entity types for the Weft control plane
//!
//! This crate declares the declarative schema of every entity the engine
//! reconciles (sync targets, placements, distributions, transforms, quotas),
//! the shared condition model, create-time defaulting, schema validation,
//! and the contract the engine expects from the object store.

pub mod condition;
pub mod distribution;
pub mod meta;
pub mod placement;
pub mod quota;
pub mod selector;
pub mod store;
pub mod synctarget;
pub mod transform;
pub mod validation;

pub use condition::{Condition, ConditionSet, ConditionStatus};
pub use distribution::{
    BlueGreenStrategy, DistributionPhase, DistributionSpec, DistributionStatus, IntOrPercent,
    LocationDistribution, LocationStatus, PercentValue, PlacementPolicyRef, RolloutStrategy,
    RolloutType, RollingUpdateStrategy, WorkloadDistribution, WorkloadReference,
};
pub use meta::{ObjectMeta, ResourceList, WeftObject};
pub use placement::{
    ClusterWorkloadPlacement, LocationSelector, PlacementResourceRequirements, PlacementSpec,
    PlacementStatus, ReplicaBounds, SpreadConstraint, TargetSelection, Toleration,
    TolerationOperator, UnsatisfiableConstraintAction,
};
pub use quota::{
    ContainerResources, PodObservation, PodPhase, PvcObservation, PvcPhase, ResourceQuota,
    ResourceQuotaSpec, ResourceQuotaStatus,
};
pub use selector::{LabelSelector, SelectorError, SelectorOperator, SelectorRequirement};
pub use store::{EventKind, ObjectEvent, ObjectStore};
pub use synctarget::{
    ApiExportRef, Cell, ClusterCapabilities, ClusterConnection, ClusterCredentials, ClusterHealth,
    ConnectionState, GroupVersionKind, HealthCheck, HealthCheckStatus, HealthStatusType,
    RetryBackoff, SyncerConfig, SyncState, SyncTarget, SyncTargetSpec, SyncTargetStatus, Taint,
    TaintEffect,
};
pub use transform::{
    TransformApplication, Transformation, TransformSpec, TransformStatus, TransformTargetRef,
    WorkloadTransform,
};
pub use validation::{ErrorKind, FieldError};
