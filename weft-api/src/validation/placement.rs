//! ClusterWorkloadPlacement validation

use super::{validate_object_meta, FieldError};
use crate::placement::{ClusterWorkloadPlacement, TolerationOperator};
use std::collections::BTreeSet;
use weft_shared::Quantity;

/// Validate a placement policy.
pub fn validate_placement(placement: &ClusterWorkloadPlacement) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_object_meta(&placement.metadata, false, &mut errors);

    if let Some(selector) = &placement.spec.namespace_selector {
        if let Err(err) = selector.compile() {
            errors.push(FieldError::invalid(
                "spec.namespaceSelector",
                "",
                err.to_string(),
            ));
        }
    }

    if let Some(locations) = &placement.spec.location_selector {
        let mut seen = BTreeSet::new();
        for (i, location) in locations.required_locations.iter().enumerate() {
            if location.is_empty() {
                errors.push(FieldError::required(
                    format!("spec.locationSelector.requiredLocations[{i}]"),
                    "location must not be empty",
                ));
            } else if !seen.insert(location.clone()) {
                errors.push(FieldError::duplicate(
                    format!("spec.locationSelector.requiredLocations[{i}]"),
                    location,
                ));
            }
        }
        for (i, location) in locations.preferred_locations.iter().enumerate() {
            if location.is_empty() {
                errors.push(FieldError::required(
                    format!("spec.locationSelector.preferredLocations[{i}]"),
                    "location must not be empty",
                ));
            }
        }
    }

    if let Some(requirements) = &placement.spec.resource_requirements {
        if let Some(min_cpu) = &requirements.min_cpu {
            if let Err(err) = Quantity::parse(min_cpu) {
                errors.push(FieldError::invalid(
                    "spec.resourceRequirements.minCpu",
                    min_cpu,
                    err.to_string(),
                ));
            }
        }
        if let Some(min_memory) = &requirements.min_memory {
            if let Err(err) = Quantity::parse(min_memory) {
                errors.push(FieldError::invalid(
                    "spec.resourceRequirements.minMemory",
                    min_memory,
                    err.to_string(),
                ));
            }
        }
    }

    if let Some(bounds) = &placement.spec.replica_bounds {
        if let Some(min) = bounds.min_replicas {
            if min < 0 {
                errors.push(FieldError::invalid(
                    "spec.replicaBounds.minReplicas",
                    min,
                    "must be non-negative",
                ));
            }
        }
        if let Some(max) = bounds.max_replicas {
            if max < 0 {
                errors.push(FieldError::invalid(
                    "spec.replicaBounds.maxReplicas",
                    max,
                    "must be non-negative",
                ));
            }
        }
        if let (Some(min), Some(max)) = (bounds.min_replicas, bounds.max_replicas) {
            if min > max {
                errors.push(FieldError::invalid(
                    "spec.replicaBounds.minReplicas",
                    min,
                    "must not exceed maxReplicas",
                ));
            }
        }
    }

    for (i, toleration) in placement.spec.tolerations.iter().enumerate() {
        let field = format!("spec.tolerations[{i}]");
        if toleration.key.is_empty() {
            errors.push(FieldError::required(
                format!("{field}.key"),
                "toleration key is required",
            ));
        }
        match toleration.operator {
            TolerationOperator::Exists => {
                if toleration.value.is_some() {
                    errors.push(FieldError::forbidden(
                        format!("{field}.value"),
                        "value must not be set when operator is Exists",
                    ));
                }
            }
            TolerationOperator::Equal => {
                if toleration.value.is_none() {
                    errors.push(FieldError::required(
                        format!("{field}.value"),
                        "value is required when operator is Equal",
                    ));
                }
            }
        }
    }

    for (i, constraint) in placement.spec.spread_constraints.iter().enumerate() {
        let field = format!("spec.spreadConstraints[{i}]");
        if constraint.topology_key.is_empty() {
            errors.push(FieldError::required(
                format!("{field}.topologyKey"),
                "topology key is required",
            ));
        }
        if constraint.max_skew < 1 {
            errors.push(FieldError::invalid(
                format!("{field}.maxSkew"),
                constraint.max_skew,
                "must be at least 1",
            ));
        }
    }

    errors
}
