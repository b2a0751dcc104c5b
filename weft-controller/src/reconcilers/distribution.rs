//! Distribution reconciliation
//!
//! Resolves the location set (explicit or via the referenced placement),
//! computes the replica plan, advances the rollout state machine one step,
//! hands the resulting intents to the syncer seam, and writes status back.

use crate::intents::IntentDispatcher;
use crate::runtime::{ReconcileAction, Reconciler};
use std::sync::Arc;
use weft_api::condition::{Condition, ConditionStatus};
use weft_api::distribution::{DistributionPhase, LocationStatus, WorkloadDistribution};
use weft_api::placement::ClusterWorkloadPlacement;
use weft_api::store::ObjectStore;
use weft_scheduler::distribution as replica_math;
use weft_scheduler::rollout::{
    condition_types, RolloutSequencer, SequencerInput,
};
use weft_shared::{ClusterKey, Result, Timestamp, WorkspacePath};

/// Drives one `WorkloadDistribution` toward its declared state.
pub struct DistributionReconciler {
    distributions: Arc<dyn ObjectStore<WorkloadDistribution>>,
    placements: Arc<dyn ObjectStore<ClusterWorkloadPlacement>>,
    dispatcher: Arc<dyn IntentDispatcher>,
    sequencer: RolloutSequencer,
}

impl DistributionReconciler {
    pub fn new(
        distributions: Arc<dyn ObjectStore<WorkloadDistribution>>,
        placements: Arc<dyn ObjectStore<ClusterWorkloadPlacement>>,
        dispatcher: Arc<dyn IntentDispatcher>,
    ) -> Self {
        Self {
            distributions,
            placements,
            dispatcher,
            sequencer: RolloutSequencer::new(),
        }
    }

    /// Resolve the ordered location list: explicit distributions win, else
    /// the referenced placement's selected targets in rank order.
    async fn resolve_locations(
        &self,
        workspace: &WorkspacePath,
        distribution: &WorkloadDistribution,
    ) -> Result<Option<Vec<String>>> {
        if !distribution.spec.distributions.is_empty() {
            return Ok(Some(
                distribution
                    .spec
                    .distributions
                    .iter()
                    .map(|d| d.location_name.clone())
                    .collect(),
            ));
        }

        let Some(policy_ref) = &distribution.spec.placement_policy_ref else {
            return Ok(None);
        };
        let placement_key =
            ClusterKey::cluster_scoped(workspace.clone(), policy_ref.name.clone())?;
        let Some(placement) = self.placements.get(&placement_key).await? else {
            return Ok(None);
        };

        let mut selected: Vec<_> = placement
            .status
            .selections
            .iter()
            .filter(|s| s.selected)
            .collect();
        selected.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.target_name.cmp(&b.target_name))
        });
        Ok(Some(selected.into_iter().map(|s| s.target_name.clone()).collect()))
    }
}

#[async_trait::async_trait]
impl Reconciler for DistributionReconciler {
    async fn reconcile(&self, key: &str) -> Result<ReconcileAction> {
        let key = ClusterKey::parse(key)?;
        let Some(mut distribution) = self.distributions.get(&key).await? else {
            tracing::debug!(key = %key, "distribution gone; dropping");
            return Ok(ReconcileAction::done());
        };

        let generation = distribution.metadata.generation;

        // A terminal failure is final for this spec generation; only a spec
        // change re-opens the rollout.
        if distribution.status.phase == DistributionPhase::Failed
            && distribution.status.observed_generation >= generation
        {
            tracing::debug!(key = %key, "distribution failed at this generation; waiting for spec change");
            return Ok(ReconcileAction::done());
        }

        let locations = match self.resolve_locations(key.workspace(), &distribution).await? {
            Some(locations) => locations,
            None => {
                let previous = distribution.status.clone();
                distribution.status.phase = DistributionPhase::Pending;
                distribution.status.conditions.set(
                    Condition::new(condition_types::DISTRIBUTED, ConditionStatus::False)
                        .with_reason("PlacementNotFound")
                        .with_message("referenced placement has no selections yet"),
                );
                distribution.status.observed_generation = generation;
                if status_changed(&previous, &distribution.status) {
                    self.distributions.update_status(distribution).await?;
                }
                return Ok(ReconcileAction::done());
            }
        };

        let plan = replica_math::plan(&distribution.spec, &locations);
        let previous = distribution.status.clone();

        // Reconcile location status entries with the plan and derive the
        // aggregate counters the sequencer decides on.
        let mut location_statuses: Vec<LocationStatus> = plan
            .rollout_order
            .iter()
            .map(|name| {
                let mut status = distribution
                    .status
                    .locations
                    .iter()
                    .find(|l| &l.location_name == name)
                    .cloned()
                    .unwrap_or_else(|| LocationStatus {
                        location_name: name.clone(),
                        ..Default::default()
                    });
                status.allocated_replicas = plan.replicas.get(name).copied().unwrap_or(0);
                status
            })
            .collect();
        location_statuses.sort_by(|a, b| a.location_name.cmp(&b.location_name));

        distribution.status.locations = location_statuses;
        distribution.status.current_replicas = distribution
            .status
            .locations
            .iter()
            .map(|l| l.current_replicas)
            .sum();
        distribution.status.ready_replicas = distribution
            .status
            .locations
            .iter()
            .map(|l| l.ready_replicas)
            .sum();
        distribution.status.updated_replicas = distribution
            .status
            .locations
            .iter()
            .filter(|l| l.synced_generation >= generation)
            .map(|l| l.current_replicas)
            .sum();

        let outcome = match self.sequencer.step(SequencerInput {
            spec: &distribution.spec,
            generation,
            status: &distribution.status,
            plan: &plan,
        }) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(key = %key, error = %err, "terminal rollout error");
                distribution.status.phase = DistributionPhase::Failed;
                distribution.status.conditions.set(
                    Condition::new(condition_types::DISTRIBUTED, ConditionStatus::False)
                        .with_reason("TerminalError")
                        .with_message(err.to_string()),
                );
                distribution.status.observed_generation = generation;
                self.distributions.update_status(distribution).await?;
                return Ok(ReconcileAction::done());
            }
        };

        distribution.status.phase = outcome.phase;
        for condition in outcome.conditions {
            distribution.status.conditions.set(condition);
        }
        distribution.status.observed_generation = generation;
        if !outcome.intents.is_empty() {
            self.dispatcher.dispatch(&key, &outcome.intents).await?;
        }

        if status_changed(&previous, &distribution.status) {
            if !outcome.intents.is_empty() {
                distribution.status.last_distribution_time = Some(Timestamp::now());
            }
            self.distributions.update_status(distribution).await?;
        }

        Ok(match outcome.requeue_after {
            Some(delay) => ReconcileAction::requeue_after(delay),
            None => ReconcileAction::done(),
        })
    }
}

/// Compare distribution statuses ignoring wall-clock stamps, so steady-state
/// ticks do not write (and re-trigger) themselves.
fn status_changed(
    previous: &weft_api::distribution::DistributionStatus,
    next: &weft_api::distribution::DistributionStatus,
) -> bool {
    previous.phase != next.phase
        || previous.current_replicas != next.current_replicas
        || previous.ready_replicas != next.ready_replicas
        || previous.updated_replicas != next.updated_replicas
        || previous.observed_generation != next.observed_generation
        || !previous.conditions.content_eq(&next.conditions)
        || previous.locations.len() != next.locations.len()
        || previous
            .locations
            .iter()
            .zip(next.locations.iter())
            .any(|(a, b)| {
                a.location_name != b.location_name
                    || a.allocated_replicas != b.allocated_replicas
                    || a.current_replicas != b.current_replicas
                    || a.ready_replicas != b.ready_replicas
                    || a.synced_generation != b.synced_generation
                    || a.message != b.message
            })
}
