//! WorkloadDistribution validation

use super::{validate_object_meta, FieldError};
use crate::distribution::{IntOrPercent, PercentValue, RolloutType, WorkloadDistribution};
use std::collections::BTreeSet;

/// Validate a WorkloadDistribution on create.
pub fn validate_distribution(distribution: &WorkloadDistribution) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_object_meta(&distribution.metadata, true, &mut errors);

    let spec = &distribution.spec;

    if spec.workload_ref.api_version.is_empty() {
        errors.push(FieldError::required(
            "spec.workloadRef.apiVersion",
            "apiVersion is required",
        ));
    }
    if spec.workload_ref.kind.is_empty() {
        errors.push(FieldError::required(
            "spec.workloadRef.kind",
            "kind is required",
        ));
    }
    if spec.workload_ref.name.is_empty() {
        errors.push(FieldError::required(
            "spec.workloadRef.name",
            "name is required",
        ));
    }

    if spec.total_replicas < 0 {
        errors.push(FieldError::invalid(
            "spec.totalReplicas",
            spec.total_replicas,
            "must be non-negative",
        ));
    }

    match (&spec.placement_policy_ref, spec.distributions.is_empty()) {
        (None, true) => errors.push(FieldError::required(
            "spec",
            "one of placementPolicyRef or distributions is required",
        )),
        (Some(_), false) => errors.push(FieldError::forbidden(
            "spec.distributions",
            "placementPolicyRef and explicit distributions are mutually exclusive",
        )),
        _ => {}
    }

    let mut seen_locations = BTreeSet::new();
    let mut replica_sum: i64 = 0;
    for (i, entry) in spec.distributions.iter().enumerate() {
        let field = format!("spec.distributions[{i}]");
        if entry.location_name.is_empty() {
            errors.push(FieldError::required(
                format!("{field}.locationName"),
                "location name is required",
            ));
        } else if !seen_locations.insert(entry.location_name.clone()) {
            errors.push(FieldError::duplicate(
                format!("{field}.locationName"),
                &entry.location_name,
            ));
        }
        if entry.replicas < 0 {
            errors.push(FieldError::invalid(
                format!("{field}.replicas"),
                entry.replicas,
                "must be non-negative",
            ));
        }
        if let Some(priority) = entry.priority {
            if !(0..=100).contains(&priority) {
                errors.push(FieldError::invalid(
                    format!("{field}.priority"),
                    priority,
                    "must be between 0 and 100",
                ));
            }
        }
        replica_sum += i64::from(entry.replicas.max(0));
    }

    if !spec.distributions.is_empty() && replica_sum != i64::from(spec.total_replicas.max(0)) {
        errors.push(FieldError::invalid(
            "spec.distributions",
            replica_sum,
            format!(
                "sum of explicit replicas must equal totalReplicas ({})",
                spec.total_replicas
            ),
        ));
    }

    validate_strategy(distribution, &mut errors);

    errors
}

fn validate_strategy(distribution: &WorkloadDistribution, errors: &mut Vec<FieldError>) {
    let strategy = &distribution.spec.strategy;
    match strategy.type_ {
        RolloutType::RollingUpdate => {
            if strategy.blue_green.is_some() {
                errors.push(FieldError::forbidden(
                    "spec.strategy.blueGreen",
                    "must not be set for RollingUpdate",
                ));
            }
            if let Some(rolling) = &strategy.rolling_update {
                if let Some(value) = &rolling.max_unavailable {
                    validate_int_or_percent(
                        "spec.strategy.rollingUpdate.maxUnavailable",
                        value,
                        errors,
                    );
                }
                if let Some(value) = &rolling.max_surge {
                    validate_int_or_percent("spec.strategy.rollingUpdate.maxSurge", value, errors);
                }
                if let Some(partition) = rolling.partition {
                    if partition < 0 {
                        errors.push(FieldError::invalid(
                            "spec.strategy.rollingUpdate.partition",
                            partition,
                            "must be non-negative",
                        ));
                    }
                }
            }
        }
        RolloutType::Recreate => {
            if strategy.rolling_update.is_some() {
                errors.push(FieldError::forbidden(
                    "spec.strategy.rollingUpdate",
                    "must not be set for Recreate",
                ));
            }
            if strategy.blue_green.is_some() {
                errors.push(FieldError::forbidden(
                    "spec.strategy.blueGreen",
                    "must not be set for Recreate",
                ));
            }
        }
        RolloutType::BlueGreen => {
            if strategy.rolling_update.is_some() {
                errors.push(FieldError::forbidden(
                    "spec.strategy.rollingUpdate",
                    "must not be set for BlueGreen",
                ));
            }
            match &strategy.blue_green {
                None => errors.push(FieldError::required(
                    "spec.strategy.blueGreen",
                    "required for BlueGreen rollouts",
                )),
                Some(blue_green) => {
                    if blue_green.active_service.is_empty() {
                        errors.push(FieldError::required(
                            "spec.strategy.blueGreen.activeService",
                            "active service is required",
                        ));
                    }
                    if let Some(delay) = blue_green.scale_down_delay_seconds {
                        if delay < 0 {
                            errors.push(FieldError::invalid(
                                "spec.strategy.blueGreen.scaleDownDelaySeconds",
                                delay,
                                "must be non-negative",
                            ));
                        }
                    }
                }
            }
        }
    }
}

fn validate_int_or_percent(field: &str, value: &IntOrPercent, errors: &mut Vec<FieldError>) {
    match value {
        IntOrPercent::Int(v) if *v < 0 => {
            errors.push(FieldError::invalid(field, v, "must be non-negative"));
        }
        IntOrPercent::Percent(PercentValue(v)) if !(0..=100).contains(v) => {
            errors.push(FieldError::invalid(
                field,
                format!("{v}%"),
                "must be between 0% and 100%",
            ));
        }
        _ => {}
    }
}

/// Validate an update against the prior version; `spec.workloadRef` and
/// identity are immutable.
pub fn validate_distribution_update(
    new: &WorkloadDistribution,
    old: &WorkloadDistribution,
) -> Vec<FieldError> {
    let mut errors = validate_distribution(new);
    if new.metadata.name != old.metadata.name {
        errors.push(FieldError::immutable("metadata.name"));
    }
    if new.spec.workload_ref != old.spec.workload_ref {
        errors.push(FieldError::immutable("spec.workloadRef"));
    }
    errors
}
