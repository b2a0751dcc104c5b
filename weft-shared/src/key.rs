//! Cluster-aware keys for Weft entities
//!
//! Every entity the engine touches is addressed by a workspace (a logical
//! cluster, written as a hierarchical path like `root:org:team`) plus either
//! `namespace/name` for namespaced resources or a bare `name` for
//! cluster-scoped ones. The canonical string form used by queues, logs and
//! the wire is `<workspace>|<namespace>/<name>` or `<workspace>|<name>`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing key material.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("workspace path must not be empty")]
    EmptyWorkspace,

    #[error("workspace path segment must not be empty in {path:?}")]
    EmptyWorkspaceSegment { path: String },

    #[error("name must not be empty in key {key:?}")]
    EmptyName { key: String },

    #[error("namespace must not be empty in key {key:?}")]
    EmptyNamespace { key: String },

    #[error("key {key:?} is missing the workspace separator '|'")]
    MissingSeparator { key: String },
}

/// A hierarchical logical-cluster path such as `root:org:team`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspacePath(String);

impl WorkspacePath {
    /// Parse a workspace path, rejecting empty paths and empty segments.
    pub fn new(path: impl Into<String>) -> Result<Self, KeyError> {
        let path = path.into();
        if path.is_empty() {
            return Err(KeyError::EmptyWorkspace);
        }
        if path.split(':').any(|segment| segment.is_empty()) {
            return Err(KeyError::EmptyWorkspaceSegment { path });
        }
        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments from root to leaf.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(':')
    }

    /// The parent workspace, or `None` at the root.
    pub fn parent(&self) -> Option<WorkspacePath> {
        self.0.rfind(':').map(|idx| Self(self.0[..idx].to_string()))
    }
}

impl fmt::Display for WorkspacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for WorkspacePath {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Canonical identity of an entity across workspaces.
///
/// The value type round-trips through its canonical string form:
/// `parse(k.to_string()) == k` for every valid key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterKey {
    workspace: WorkspacePath,
    namespace: Option<String>,
    name: String,
}

impl ClusterKey {
    /// Key for a namespaced resource.
    pub fn namespaced(
        workspace: WorkspacePath,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let namespace = namespace.into();
        let name = name.into();
        if namespace.is_empty() {
            return Err(KeyError::EmptyNamespace {
                key: format!("{workspace}|{namespace}/{name}"),
            });
        }
        if name.is_empty() {
            return Err(KeyError::EmptyName {
                key: format!("{workspace}|{namespace}/{name}"),
            });
        }
        Ok(Self {
            workspace,
            namespace: Some(namespace),
            name,
        })
    }

    /// Key for a cluster-scoped resource.
    pub fn cluster_scoped(
        workspace: WorkspacePath,
        name: impl Into<String>,
    ) -> Result<Self, KeyError> {
        let name = name.into();
        if name.is_empty() {
            return Err(KeyError::EmptyName {
                key: format!("{workspace}|{name}"),
            });
        }
        Ok(Self {
            workspace,
            namespace: None,
            name,
        })
    }

    pub fn workspace(&self) -> &WorkspacePath {
        &self.workspace
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse the canonical `ws|ns/name` or `ws|name` form.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let (workspace, rest) = key.split_once('|').ok_or_else(|| KeyError::MissingSeparator {
            key: key.to_string(),
        })?;
        let workspace = WorkspacePath::new(workspace)?;
        match rest.split_once('/') {
            Some((namespace, name)) => Self::namespaced(workspace, namespace, name),
            None => Self::cluster_scoped(workspace, rest),
        }
    }
}

impl fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}|{}/{}", self.workspace, namespace, self.name),
            None => write!(f, "{}|{}", self.workspace, self.name),
        }
    }
}

impl FromStr for ClusterKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
