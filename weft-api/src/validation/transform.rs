//! WorkloadTransform validation

use super::{validate_object_meta, FieldError};
use crate::transform::{Transformation, WorkloadTransform};

const MAX_TRANSFORM_PRIORITY: i32 = 1000;

/// Validate a WorkloadTransform.
pub fn validate_transform(transform: &WorkloadTransform) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_object_meta(&transform.metadata, true, &mut errors);

    let spec = &transform.spec;

    if spec.target_ref.api_version.is_empty() {
        errors.push(FieldError::required(
            "spec.targetRef.apiVersion",
            "apiVersion is required",
        ));
    }
    if spec.target_ref.kind.is_empty() {
        errors.push(FieldError::required(
            "spec.targetRef.kind",
            "kind is required",
        ));
    }
    match (&spec.target_ref.name, &spec.target_ref.selector) {
        (None, None) => errors.push(FieldError::required(
            "spec.targetRef",
            "one of name or selector is required",
        )),
        (Some(_), Some(_)) => errors.push(FieldError::forbidden(
            "spec.targetRef.selector",
            "name and selector are mutually exclusive",
        )),
        (None, Some(selector)) => {
            if let Err(err) = selector.compile() {
                errors.push(FieldError::invalid(
                    "spec.targetRef.selector",
                    "",
                    err.to_string(),
                ));
            }
        }
        (Some(name), None) => {
            if name.is_empty() {
                errors.push(FieldError::required(
                    "spec.targetRef.name",
                    "name must not be empty",
                ));
            }
        }
    }

    if !(0..=MAX_TRANSFORM_PRIORITY).contains(&spec.priority) {
        errors.push(FieldError::invalid(
            "spec.priority",
            spec.priority,
            "must be between 0 and 1000",
        ));
    }

    for (i, transformation) in spec.transformations.iter().enumerate() {
        validate_transformation(i, transformation, &mut errors);
    }

    for (i, selector) in spec.location_selectors.iter().enumerate() {
        if let Err(err) = selector.compile() {
            errors.push(FieldError::invalid(
                format!("spec.locationSelectors[{i}]"),
                "",
                err.to_string(),
            ));
        }
    }

    errors
}

fn validate_transformation(index: usize, transformation: &Transformation, errors: &mut Vec<FieldError>) {
    let field = format!("spec.transformations[{index}]");
    match transformation {
        Transformation::JsonPatch { patch } => {
            if !patch.is_array() {
                errors.push(FieldError::invalid(
                    format!("{field}.patch"),
                    patch,
                    "JSONPatch payload must be an array of operations",
                ));
            }
        }
        Transformation::StrategicMerge { patch } => {
            if !patch.is_object() {
                errors.push(FieldError::invalid(
                    format!("{field}.patch"),
                    patch,
                    "StrategicMerge payload must be an object",
                ));
            }
        }
        Transformation::Replace { path, .. } => {
            validate_path(&format!("{field}.path"), path, errors);
        }
        Transformation::Remove { path } => {
            validate_path(&format!("{field}.path"), path, errors);
        }
        Transformation::Annotate { annotations } => {
            if annotations.is_empty() {
                errors.push(FieldError::required(
                    format!("{field}.annotations"),
                    "at least one annotation is required",
                ));
            }
        }
        Transformation::Label { labels } => {
            if labels.is_empty() {
                errors.push(FieldError::required(
                    format!("{field}.labels"),
                    "at least one label is required",
                ));
            }
        }
    }
}

fn validate_path(field: &str, path: &str, errors: &mut Vec<FieldError>) {
    if path.is_empty() {
        errors.push(FieldError::required(field, "path is required"));
    } else if !path.starts_with('/') {
        errors.push(FieldError::invalid(field, path, "path must start with '/'"));
    }
}
