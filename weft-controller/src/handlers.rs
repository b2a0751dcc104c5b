//! Event handlers
//!
//! Store events carry cluster-aware keys; these pumps map each event to the
//! queue keys that must be re-reconciled and enqueue them. Cross-resource
//! fan-out (a sync-target change re-evaluating every placement in its
//! workspace, a pod change re-aggregating its namespace quotas) lists the
//! affected objects through the store contract.

use crate::store::MemoryStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use weft_api::meta::WeftObject;
use weft_api::placement::ClusterWorkloadPlacement;
use weft_api::quota::ResourceQuota;
use weft_api::store::{ObjectEvent, ObjectStore};
use weft_api::distribution::WorkloadDistribution;
use weft_queue::WorkQueue;
use weft_shared::WorkspacePath;

/// Pump store events through `map` into `queue` until cancelled.
pub fn spawn_event_pump<Q, F, Fut>(
    mut events: broadcast::Receiver<ObjectEvent>,
    queue: Q,
    shutdown: CancellationToken,
    map: F,
) -> JoinHandle<()>
where
    Q: WorkQueue + Clone,
    F: Fn(ObjectEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<String>> + Send,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Ok(event) => {
                        for key in map(event).await {
                            queue.add(&key);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // Dropped notifications are recovered by resync.
                        tracing::warn!(missed, "event pump lagged behind the store");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}

/// The event's own key, as a queue key.
pub fn own_key(event: &ObjectEvent) -> Vec<String> {
    vec![event.key.to_string()]
}

/// Keys of every placement in the event's workspace. Used when a sync
/// target changes: each placement there must re-evaluate its targets.
pub async fn placement_keys_for_workspace(
    placements: &Arc<MemoryStore<ClusterWorkloadPlacement>>,
    workspace: &WorkspacePath,
) -> Vec<String> {
    keys_in_workspace(placements.as_ref(), workspace).await
}

/// Keys of every distribution in the event's workspace. Used when a
/// placement's selections change.
pub async fn distribution_keys_for_workspace(
    distributions: &Arc<MemoryStore<WorkloadDistribution>>,
    workspace: &WorkspacePath,
) -> Vec<String> {
    keys_in_workspace(distributions.as_ref(), workspace).await
}

/// Keys of every quota in the namespace of the observed pod or PVC. Dedup
/// happens naturally: the queue coalesces identical keys.
pub async fn quota_keys_for_namespace(
    quotas: &Arc<MemoryStore<ResourceQuota>>,
    workspace: &WorkspacePath,
    namespace: &str,
) -> Vec<String> {
    let Ok(all) = quotas.list(Some(workspace)).await else {
        return Vec::new();
    };
    all.iter()
        .filter(|q| q.metadata.namespace.as_deref() == Some(namespace))
        .filter_map(|q| q.key().ok())
        .map(|k| k.to_string())
        .collect()
}

async fn keys_in_workspace<T: WeftObject>(
    store: &MemoryStore<T>,
    workspace: &WorkspacePath,
) -> Vec<String> {
    let Ok(all) = store.list(Some(workspace)).await else {
        return Vec::new();
    };
    all.iter()
        .filter_map(|o| o.key().ok())
        .map(|k| k.to_string())
        .collect()
}
