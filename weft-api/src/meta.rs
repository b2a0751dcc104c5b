//! Object metadata shared by every Weft entity

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use weft_shared::{ClusterKey, KeyError, Quantity, Timestamp, WorkspacePath};

/// Named resource amounts (capacity, allocatable, usage, hard limits).
pub type ResourceList = BTreeMap<String, Quantity>;

/// Identity and bookkeeping fields carried by every entity.
///
/// The engine never mutates anything here except through the store's
/// optimistic-concurrency bookkeeping (`resource_version`); `generation`
/// advances when users change spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Logical cluster this entity lives in.
    pub workspace: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Spec generation, advanced by the store on spec changes.
    pub generation: i64,

    /// Optimistic-concurrency token, advanced by the store on every write.
    pub resource_version: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<Timestamp>,
}

impl Default for ObjectMeta {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: None,
            workspace: String::new(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            generation: 0,
            resource_version: 0,
            creation_timestamp: None,
        }
    }
}

impl ObjectMeta {
    /// Metadata for a namespaced entity.
    pub fn namespaced(
        workspace: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            workspace: workspace.into(),
            ..Default::default()
        }
    }

    /// Metadata for a cluster-scoped entity.
    pub fn cluster_scoped(workspace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            workspace: workspace.into(),
            ..Default::default()
        }
    }

    /// The cluster-aware key this metadata identifies.
    pub fn key(&self) -> Result<ClusterKey, KeyError> {
        let workspace = WorkspacePath::new(self.workspace.clone())?;
        match &self.namespace {
            Some(namespace) => ClusterKey::namespaced(workspace, namespace.clone(), &self.name),
            None => ClusterKey::cluster_scoped(workspace, &self.name),
        }
    }
}

/// Implemented by every entity the engine reconciles.
pub trait WeftObject: Clone + Send + Sync + 'static {
    /// Wire kind, e.g. `"SyncTarget"`.
    const KIND: &'static str;

    fn metadata(&self) -> &ObjectMeta;

    fn metadata_mut(&mut self) -> &mut ObjectMeta;

    fn key(&self) -> Result<ClusterKey, KeyError> {
        self.metadata().key()
    }

    /// Create-time defaulting, applied by the store on admission.
    fn default_on_create(&mut self) {}

    /// Schema validation on create; non-empty means the write is rejected.
    fn validate_create(&self) -> Vec<crate::validation::FieldError> {
        Vec::new()
    }

    /// Schema validation on update, with the prior version for immutability
    /// checks.
    fn validate_update(&self, _old: &Self) -> Vec<crate::validation::FieldError> {
        self.validate_create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_derives_keys() {
        let namespaced = ObjectMeta::namespaced("root:org", "default", "web");
        assert_eq!(namespaced.key().unwrap().to_string(), "root:org|default/web");

        let scoped = ObjectMeta::cluster_scoped("root", "west-coast");
        assert_eq!(scoped.key().unwrap().to_string(), "root|west-coast");
    }

    #[test]
    fn empty_workspace_is_invalid() {
        let meta = ObjectMeta::cluster_scoped("", "target");
        assert!(meta.key().is_err());
    }
}
