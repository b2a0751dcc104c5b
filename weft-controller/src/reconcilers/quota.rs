//! Quota reconciliation

use crate::runtime::{ReconcileAction, Reconciler};
use std::sync::Arc;
use weft_api::condition::{Condition, ConditionStatus};
use weft_api::quota::{PodObservation, PvcObservation, ResourceQuota};
use weft_api::store::ObjectStore;
use weft_quota::QuotaAggregator;
use weft_shared::{ClusterKey, Result};

const COND_COMPLIANT: &str = "Compliant";

/// Rolls observed pods and PVCs in a quota's namespace up into its status.
pub struct QuotaReconciler {
    quotas: Arc<dyn ObjectStore<ResourceQuota>>,
    pods: Arc<dyn ObjectStore<PodObservation>>,
    pvcs: Arc<dyn ObjectStore<PvcObservation>>,
    aggregator: QuotaAggregator,
}

impl QuotaReconciler {
    pub fn new(
        quotas: Arc<dyn ObjectStore<ResourceQuota>>,
        pods: Arc<dyn ObjectStore<PodObservation>>,
        pvcs: Arc<dyn ObjectStore<PvcObservation>>,
    ) -> Self {
        Self {
            quotas,
            pods,
            pvcs,
            aggregator: QuotaAggregator::new(),
        }
    }
}

#[async_trait::async_trait]
impl Reconciler for QuotaReconciler {
    async fn reconcile(&self, key: &str) -> Result<ReconcileAction> {
        let key = ClusterKey::parse(key)?;
        let Some(mut quota) = self.quotas.get(&key).await? else {
            tracing::debug!(key = %key, "quota gone; dropping");
            return Ok(ReconcileAction::done());
        };
        let namespace = key.namespace().unwrap_or_default().to_string();

        let pods: Vec<PodObservation> = self
            .pods
            .list(Some(key.workspace()))
            .await?
            .into_iter()
            .filter(|p| p.metadata.namespace.as_deref() == Some(namespace.as_str()))
            .collect();
        let pvcs: Vec<PvcObservation> = self
            .pvcs
            .list(Some(key.workspace()))
            .await?
            .into_iter()
            .filter(|p| p.metadata.namespace.as_deref() == Some(namespace.as_str()))
            .collect();

        let mut status = self.aggregator.aggregate(&quota, &pods, &pvcs);
        status.conditions = quota.status.conditions.clone();
        if status.violations.is_empty() {
            status.conditions.set(
                Condition::new(COND_COMPLIANT, ConditionStatus::True)
                    .with_reason("WithinLimits"),
            );
        } else {
            status.conditions.set(
                Condition::new(COND_COMPLIANT, ConditionStatus::False)
                    .with_reason("QuotaExceeded")
                    .with_message(status.violations.join("; ")),
            );
        }

        // Skip the write when usage, violations and conditions are all
        // unchanged; only the last-updated stamp would differ.
        let unchanged = quota.status.hard == status.hard
            && quota.status.used == status.used
            && quota.status.violations == status.violations
            && quota.status.conditions.content_eq(&status.conditions);
        if unchanged {
            return Ok(ReconcileAction::done());
        }

        quota.status = status;
        self.quotas.update_status(quota).await?;
        Ok(ReconcileAction::done())
    }
}
