//! Object store contract
//!
//! The engine consumes an external declarative store through this trait:
//! typed reads, optimistic-concurrency status writes, and an event stream of
//! add/update/delete notifications carrying cluster-aware keys. Persistence
//! and watch internals live outside the engine.

use crate::meta::WeftObject;
use async_trait::async_trait;
use tokio::sync::broadcast;
use weft_shared::{ClusterKey, Result, WorkspacePath};

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

/// A store notification. Consumers map these to queue keys; the object
/// itself is re-read from the store at reconcile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEvent {
    pub kind: EventKind,
    /// Wire kind of the affected object, e.g. `"SyncTarget"`.
    pub resource: &'static str,
    pub key: ClusterKey,
}

/// Typed access to one kind of object.
///
/// `update_status` performs a resource-version compare-and-swap: a stale
/// version yields `WeftError::Conflict`, which reconcilers treat as a
/// transient error and retry via requeue.
#[async_trait]
pub trait ObjectStore<T: WeftObject>: Send + Sync {
    /// Fetch by key; `Ok(None)` when the object does not exist.
    async fn get(&self, key: &ClusterKey) -> Result<Option<T>>;

    /// List all objects, optionally restricted to one workspace.
    async fn list(&self, workspace: Option<&WorkspacePath>) -> Result<Vec<T>>;

    /// Compare-and-swap write of the status subresource.
    async fn update_status(&self, object: T) -> Result<T>;

    /// Subscribe to add/update/delete events for this kind.
    fn watch(&self) -> broadcast::Receiver<ObjectEvent>;
}
