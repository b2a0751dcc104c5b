//! In-memory object store
//!
//! Implements the engine's store contract for wiring and tests: admission
//! (defaulting + validation) on create, generation bookkeeping on spec
//! updates, compare-and-swap status writes, and a broadcast watch stream.
//! Production deployments back the same contract with a real declarative
//! store; nothing in the engine depends on this implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use weft_api::meta::WeftObject;
use weft_api::store::{EventKind, ObjectEvent, ObjectStore};
use weft_shared::{ClusterKey, Result, Timestamp, WeftError, WorkspacePath};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Thread-safe in-memory store for one object kind.
pub struct MemoryStore<T: WeftObject> {
    objects: RwLock<HashMap<String, T>>,
    events: broadcast::Sender<ObjectEvent>,
}

impl<T: WeftObject> MemoryStore<T> {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            objects: RwLock::new(HashMap::new()),
            events,
        })
    }

    /// Admit a new object: apply create-time defaults, validate, stamp
    /// bookkeeping fields, and emit an `Added` event.
    pub fn create(&self, mut object: T) -> Result<T> {
        object.default_on_create();

        let errors = object.validate_create();
        if !errors.is_empty() {
            let key = object.key().map(|k| k.to_string()).unwrap_or_default();
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(WeftError::Validation { key, message });
        }

        let key = object.key()?;
        let meta = object.metadata_mut();
        meta.resource_version = 1;
        meta.generation = 1;
        meta.creation_timestamp = Some(Timestamp::now());

        let mut objects = self.objects.write();
        if objects.contains_key(&key.to_string()) {
            return Err(WeftError::Conflict {
                key: key.to_string(),
                message: "object already exists".into(),
            });
        }
        objects.insert(key.to_string(), object.clone());
        drop(objects);

        self.emit(EventKind::Added, &key);
        Ok(object)
    }

    /// Replace the spec of an existing object: validate against the prior
    /// version, advance generation and resource version, emit `Modified`.
    pub fn update_spec(&self, mut object: T) -> Result<T> {
        let key = object.key()?;
        let mut objects = self.objects.write();
        let existing = objects.get(&key.to_string()).ok_or_else(|| WeftError::NotFound {
            resource_type: T::KIND.to_string(),
            key: key.to_string(),
        })?;

        let errors = object.validate_update(existing);
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(WeftError::Validation {
                key: key.to_string(),
                message,
            });
        }

        let (generation, resource_version) = {
            let existing_meta = existing.metadata();
            (existing_meta.generation, existing_meta.resource_version)
        };
        let meta = object.metadata_mut();
        meta.generation = generation + 1;
        meta.resource_version = resource_version + 1;

        objects.insert(key.to_string(), object.clone());
        drop(objects);

        self.emit(EventKind::Modified, &key);
        Ok(object)
    }

    /// Remove an object, emitting `Deleted`. Deleting a missing key is not
    /// an error.
    pub fn delete(&self, key: &ClusterKey) -> Result<()> {
        let removed = self.objects.write().remove(&key.to_string());
        if removed.is_some() {
            self.emit(EventKind::Deleted, key);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn emit(&self, kind: EventKind, key: &ClusterKey) {
        // No receivers is fine; events are best-effort notifications.
        let _ = self.events.send(ObjectEvent {
            kind,
            resource: T::KIND,
            key: key.clone(),
        });
    }
}

#[async_trait]
impl<T: WeftObject> ObjectStore<T> for MemoryStore<T> {
    async fn get(&self, key: &ClusterKey) -> Result<Option<T>> {
        Ok(self.objects.read().get(&key.to_string()).cloned())
    }

    async fn list(&self, workspace: Option<&WorkspacePath>) -> Result<Vec<T>> {
        let objects = self.objects.read();
        let mut out: Vec<T> = objects
            .values()
            .filter(|o| {
                workspace
                    .map(|ws| o.metadata().workspace == ws.as_str())
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.metadata().name.cmp(&b.metadata().name));
        Ok(out)
    }

    async fn update_status(&self, mut object: T) -> Result<T> {
        let key = object.key()?;
        let mut objects = self.objects.write();
        let existing = objects.get(&key.to_string()).ok_or_else(|| WeftError::NotFound {
            resource_type: T::KIND.to_string(),
            key: key.to_string(),
        })?;

        let expected = existing.metadata().resource_version;
        let provided = object.metadata().resource_version;
        if provided != expected {
            return Err(WeftError::Conflict {
                key: key.to_string(),
                message: format!(
                    "resource version mismatch: expected {expected}, got {provided}"
                ),
            });
        }

        object.metadata_mut().resource_version = expected + 1;
        objects.insert(key.to_string(), object.clone());
        drop(objects);

        self.emit(EventKind::Modified, &key);
        Ok(object)
    }

    fn watch(&self) -> broadcast::Receiver<ObjectEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_api::meta::ObjectMeta;
    use weft_api::synctarget::{Cell, SyncTarget, SyncTargetSpec, SyncTargetStatus};

    fn target(name: &str) -> SyncTarget {
        SyncTarget {
            metadata: ObjectMeta::cluster_scoped("root:org", name),
            spec: SyncTargetSpec {
                cells: vec![Cell {
                    name: "cell-a".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            status: SyncTargetStatus::default(),
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_emits() {
        let store = MemoryStore::<SyncTarget>::new();
        let mut events = store.watch();

        let created = store.create(target("west")).unwrap();
        assert_eq!(created.metadata.resource_version, 1);
        assert_eq!(created.spec.evict_after_seconds, Some(300), "defaulted");

        let event = events.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::Added);
        assert_eq!(event.resource, "SyncTarget");
        assert_eq!(event.key.to_string(), "root:org|west");
    }

    #[tokio::test]
    async fn create_rejects_invalid_objects() {
        let store = MemoryStore::<SyncTarget>::new();
        let mut invalid = target("west");
        invalid.spec.cells.clear();
        let err = store.create(invalid).unwrap_err();
        assert!(matches!(err, WeftError::Validation { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn status_update_uses_compare_and_swap() {
        let store = MemoryStore::<SyncTarget>::new();
        let created = store.create(target("west")).unwrap();

        let mut fresh = created.clone();
        fresh.status.synced_resources.push("apps/v1/Deployment".into());
        let written = store.update_status(fresh).await.unwrap();
        assert_eq!(written.metadata.resource_version, 2);

        // A writer holding the old version loses.
        let mut stale = created;
        stale.status.synced_resources.push("v1/ConfigMap".into());
        let err = store.update_status(stale).await.unwrap_err();
        assert!(matches!(err, WeftError::Conflict { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn spec_update_advances_generation() {
        let store = MemoryStore::<SyncTarget>::new();
        let created = store.create(target("west")).unwrap();
        assert_eq!(created.metadata.generation, 1);

        let mut updated = created.clone();
        updated.spec.unschedulable = true;
        let written = store.update_spec(updated).unwrap();
        assert_eq!(written.metadata.generation, 2);

        // Status writes must not advance generation.
        let after = store.update_status(written.clone()).await.unwrap();
        assert_eq!(after.metadata.generation, 2);
    }

    #[tokio::test]
    async fn list_filters_by_workspace() {
        let store = MemoryStore::<SyncTarget>::new();
        store.create(target("west")).unwrap();
        let mut other = target("east");
        other.metadata.workspace = "root:other".into();
        store.create(other).unwrap();

        let ws = WorkspacePath::new("root:org").unwrap();
        let filtered = store.list(Some(&ws)).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].metadata.name, "west");
        assert_eq!(store.list(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_emits_and_tolerates_missing() {
        let store = MemoryStore::<SyncTarget>::new();
        let created = store.create(target("west")).unwrap();
        let key = created.key().unwrap();
        let mut events = store.watch();

        store.delete(&key).unwrap();
        assert_eq!(events.recv().await.unwrap().kind, EventKind::Deleted);
        store.delete(&key).unwrap();
        assert!(store.is_empty());
    }
}
