//! SyncTarget validation

use super::{names, validate_object_meta, FieldError};
use crate::synctarget::{ClusterCredentials, SyncTarget};
use std::collections::BTreeSet;

/// Validate a SyncTarget on create.
pub fn validate_sync_target(target: &SyncTarget) -> Vec<FieldError> {
    let mut errors = Vec::new();
    validate_object_meta(&target.metadata, false, &mut errors);

    if target.spec.cells.is_empty() {
        errors.push(FieldError::required(
            "spec.cells",
            "at least one cell is required",
        ));
    }

    let mut seen_cells = BTreeSet::new();
    for (i, cell) in target.spec.cells.iter().enumerate() {
        let cell_field = format!("spec.cells[{i}]");
        if cell.name.is_empty() {
            errors.push(FieldError::required(
                format!("{cell_field}.name"),
                "cell name is required",
            ));
        } else if !names::is_dns1123_label(&cell.name) {
            errors.push(FieldError::invalid(
                format!("{cell_field}.name"),
                &cell.name,
                "must be a DNS-1123 label",
            ));
        } else if !seen_cells.insert(cell.name.clone()) {
            errors.push(FieldError::duplicate(format!("{cell_field}.name"), &cell.name));
        }

        let mut seen_taints = BTreeSet::new();
        for (j, taint) in cell.taints.iter().enumerate() {
            let taint_field = format!("{cell_field}.taints[{j}]");
            if taint.key.is_empty() {
                errors.push(FieldError::required(
                    format!("{taint_field}.key"),
                    "taint key is required",
                ));
            } else if !seen_taints.insert(taint.key.clone()) {
                errors.push(FieldError::duplicate(format!("{taint_field}.key"), &taint.key));
            }
        }
    }

    if let Some(evict_after) = target.spec.evict_after_seconds {
        if evict_after < 0 {
            errors.push(FieldError::invalid(
                "spec.evictAfterSeconds",
                evict_after,
                "must be non-negative",
            ));
        }
    }

    if let Some(connection) = &target.spec.connection {
        if connection.url.is_empty() {
            errors.push(FieldError::required(
                "spec.connection.url",
                "connection URL is required",
            ));
        }
    }

    if let Some(credentials) = &target.spec.credentials {
        validate_credentials(credentials, &mut errors);
    }

    if let Some(selector) = &target.spec.workload_selector {
        if let Err(err) = selector.compile() {
            errors.push(FieldError::invalid(
                "spec.workloadSelector",
                "",
                err.to_string(),
            ));
        }
    }

    errors
}

fn validate_credentials(credentials: &ClusterCredentials, errors: &mut Vec<FieldError>) {
    match credentials {
        ClusterCredentials::Token { token } => {
            if token.is_empty() {
                errors.push(FieldError::required(
                    "spec.credentials.token",
                    "token credentials require a token",
                ));
            }
        }
        ClusterCredentials::Certificate {
            client_cert,
            client_key,
        } => {
            if client_cert.is_empty() {
                errors.push(FieldError::required(
                    "spec.credentials.clientCert",
                    "certificate credentials require a client certificate",
                ));
            }
            if client_key.is_empty() {
                errors.push(FieldError::required(
                    "spec.credentials.clientKey",
                    "certificate credentials require a client key",
                ));
            }
        }
        ClusterCredentials::ServiceAccount { namespace, name } => {
            if namespace.is_empty() {
                errors.push(FieldError::required(
                    "spec.credentials.namespace",
                    "service-account credentials require a namespace",
                ));
            }
            if name.is_empty() {
                errors.push(FieldError::required(
                    "spec.credentials.name",
                    "service-account credentials require a name",
                ));
            }
        }
    }
}

/// Validate a SyncTarget update against the prior version.
pub fn validate_sync_target_update(new: &SyncTarget, old: &SyncTarget) -> Vec<FieldError> {
    let mut errors = validate_sync_target(new);
    if new.metadata.name != old.metadata.name {
        errors.push(FieldError::immutable("metadata.name"));
    }
    if new.metadata.workspace != old.metadata.workspace {
        errors.push(FieldError::immutable("metadata.workspace"));
    }
    errors
}
