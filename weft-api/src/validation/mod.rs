//! Schema validation
//!
//! Pure functions from an entity to an ordered list of field errors. Update
//! validators additionally take the prior version and enforce declared
//! immutability. Nothing here touches the object store.

mod distribution;
mod names;
mod placement;
mod quota;
mod synctarget;
mod transform;

pub use distribution::{validate_distribution, validate_distribution_update};
pub use names::{is_dns1123_label, is_dns1123_subdomain};
pub use placement::validate_placement;
pub use quota::validate_quota;
pub use synctarget::{validate_sync_target, validate_sync_target_update};
pub use transform::validate_transform;

use crate::meta::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::fmt;
use weft_shared::WorkspacePath;

/// Classification of a field error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    Required,
    Invalid,
    Duplicate,
    NotSupported,
    Forbidden,
    TooLong,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Required => "Required",
            ErrorKind::Invalid => "Invalid",
            ErrorKind::Duplicate => "Duplicate",
            ErrorKind::NotSupported => "NotSupported",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::TooLong => "TooLong",
        };
        f.write_str(s)
    }
}

/// One schema violation, anchored to a JSON-path-style field location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
}

impl FieldError {
    pub fn required(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: ErrorKind::Required,
            value: None,
            message: message.into(),
        }
    }

    pub fn invalid(
        field: impl Into<String>,
        value: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: ErrorKind::Invalid,
            value: Some(value.to_string()),
            message: message.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            field: field.into(),
            kind: ErrorKind::Duplicate,
            value: Some(value.to_string()),
            message: "duplicate value".into(),
        }
    }

    pub fn not_supported(
        field: impl Into<String>,
        value: impl fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: ErrorKind::NotSupported,
            value: Some(value.to_string()),
            message: message.into(),
        }
    }

    pub fn forbidden(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: ErrorKind::Forbidden,
            value: None,
            message: message.into(),
        }
    }

    pub fn too_long(field: impl Into<String>, value: impl fmt::Display, max: usize) -> Self {
        Self {
            field: field.into(),
            kind: ErrorKind::TooLong,
            value: Some(value.to_string()),
            message: format!("must be no more than {max} characters"),
        }
    }

    /// Marks a declared-immutable field that an update tried to change.
    pub fn immutable(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: ErrorKind::Invalid,
            value: None,
            message: "field is immutable".into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(
                f,
                "{}: {} value {:?}: {}",
                self.field, self.kind, value, self.message
            ),
            None => write!(f, "{}: {}: {}", self.field, self.kind, self.message),
        }
    }
}

const MAX_NAME_LENGTH: usize = 253;

/// Common metadata checks shared by every entity validator.
pub(crate) fn validate_object_meta(
    meta: &ObjectMeta,
    namespaced: bool,
    errors: &mut Vec<FieldError>,
) {
    if meta.name.is_empty() {
        errors.push(FieldError::required("metadata.name", "name is required"));
    } else if meta.name.len() > MAX_NAME_LENGTH {
        errors.push(FieldError::too_long("metadata.name", &meta.name, MAX_NAME_LENGTH));
    } else if !names::is_dns1123_subdomain(&meta.name) {
        errors.push(FieldError::invalid(
            "metadata.name",
            &meta.name,
            "must be a DNS-1123 subdomain",
        ));
    }

    if meta.workspace.is_empty() {
        errors.push(FieldError::required(
            "metadata.workspace",
            "workspace is required",
        ));
    } else if WorkspacePath::new(meta.workspace.clone()).is_err() {
        errors.push(FieldError::invalid(
            "metadata.workspace",
            &meta.workspace,
            "must be a non-empty colon-separated workspace path",
        ));
    }

    match (&meta.namespace, namespaced) {
        (None, true) => errors.push(FieldError::required(
            "metadata.namespace",
            "namespace is required",
        )),
        (Some(namespace), true) if !names::is_dns1123_label(namespace) => {
            errors.push(FieldError::invalid(
                "metadata.namespace",
                namespace,
                "must be a DNS-1123 label",
            ));
        }
        (Some(_), false) => errors.push(FieldError::forbidden(
            "metadata.namespace",
            "resource is cluster-scoped",
        )),
        _ => {}
    }
}
