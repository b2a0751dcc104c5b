//! ResourceQuota validation

use super::{validate_object_meta, FieldError};
use crate::quota::ResourceQuota;
use weft_shared::Quantity;

/// Validate a ResourceQuota.
pub fn validate_quota(quota: &ResourceQuota) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_object_meta(&quota.metadata, true, &mut errors);

    for (resource, quantity) in &quota.spec.hard {
        if resource.is_empty() {
            errors.push(FieldError::required(
                "spec.hard",
                "resource name must not be empty",
            ));
            continue;
        }
        if *quantity < Quantity::zero() {
            errors.push(FieldError::invalid(
                format!("spec.hard[{resource}]"),
                quantity,
                "must be non-negative",
            ));
        }
    }

    errors
}
