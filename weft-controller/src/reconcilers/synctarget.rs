//! Sync target reconciliation
//!
//! Derives heartbeat and readiness conditions from the target's reported
//! state. The syncer owns connection, sync and health reporting; this
//! reconciler only folds them into conditions and watches heartbeat age
//! against the eviction grace period.

use crate::runtime::{ReconcileAction, Reconciler};
use std::sync::Arc;
use std::time::Duration;
use weft_api::condition::{Condition, ConditionStatus};
use weft_api::meta::WeftObject;
use weft_api::synctarget::{
    ConnectionState, SyncState, SyncTarget, DEFAULT_EVICT_AFTER_SECONDS,
    DEFAULT_SYNC_INTERVAL_SECONDS,
};
use weft_api::store::ObjectStore;
use weft_shared::{ClusterKey, Result};

const COND_READY: &str = "Ready";
const COND_HEARTBEAT: &str = "HeartbeatHealthy";

/// Keeps sync-target conditions in step with reported state.
pub struct SyncTargetReconciler {
    targets: Arc<dyn ObjectStore<SyncTarget>>,
}

impl SyncTargetReconciler {
    pub fn new(targets: Arc<dyn ObjectStore<SyncTarget>>) -> Self {
        Self { targets }
    }
}

#[async_trait::async_trait]
impl Reconciler for SyncTargetReconciler {
    async fn reconcile(&self, key: &str) -> Result<ReconcileAction> {
        let key = ClusterKey::parse(key)?;
        let Some(mut target) = self.targets.get(&key).await? else {
            tracing::debug!(key = %key, "sync target gone; dropping");
            return Ok(ReconcileAction::done());
        };

        let errors = target.validate_create();
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            let previous = target.status.conditions.clone();
            target.status.conditions.set(
                Condition::new(COND_READY, ConditionStatus::False)
                    .with_reason("InvalidSpec")
                    .with_message(message),
            );
            if !target.status.conditions.content_eq(&previous) {
                self.targets.update_status(target).await?;
            }
            return Ok(ReconcileAction::done());
        }

        let previous_conditions = target.status.conditions.clone();
        let evict_after = Duration::from_secs(
            target
                .spec
                .evict_after_seconds
                .unwrap_or(DEFAULT_EVICT_AFTER_SECONDS)
                .max(0) as u64,
        );

        let heartbeat_stale = match target.status.last_heartbeat {
            None => {
                target.status.conditions.set(
                    Condition::new(COND_HEARTBEAT, ConditionStatus::Unknown)
                        .with_reason("NoHeartbeat")
                        .with_message("target has never reported a heartbeat"),
                );
                true
            }
            Some(heartbeat) if heartbeat.older_than(evict_after) => {
                target.status.conditions.set(
                    Condition::new(COND_HEARTBEAT, ConditionStatus::False)
                        .with_reason("HeartbeatStale")
                        .with_message(format!(
                            "last heartbeat {}s ago exceeds eviction grace of {}s",
                            heartbeat.elapsed().as_secs(),
                            evict_after.as_secs()
                        )),
                );
                true
            }
            Some(_) => {
                target.status.conditions.set(
                    Condition::new(COND_HEARTBEAT, ConditionStatus::True)
                        .with_reason("HeartbeatFresh"),
                );
                false
            }
        };

        let connected = target.status.connection_state == ConnectionState::Connected;
        let syncing = target.status.sync_state == SyncState::Ready;
        if connected && syncing && !heartbeat_stale && !target.spec.unschedulable {
            target.status.conditions.set(
                Condition::new(COND_READY, ConditionStatus::True)
                    .with_reason("TargetReady"),
            );
        } else {
            let reason = if target.spec.unschedulable {
                "Unschedulable"
            } else if !connected {
                "NotConnected"
            } else if !syncing {
                "SyncerNotReady"
            } else {
                "HeartbeatStale"
            };
            target.status.conditions.set(
                Condition::new(COND_READY, ConditionStatus::False).with_reason(reason),
            );
        }

        if !target.status.conditions.content_eq(&previous_conditions) {
            self.targets.update_status(target).await?;
        }

        // Heartbeat age only moves with wall-clock time; check again on the
        // syncer's reporting cadence.
        Ok(ReconcileAction::requeue_after(Duration::from_secs(
            DEFAULT_SYNC_INTERVAL_SECONDS,
        )))
    }
}
