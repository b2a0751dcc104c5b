//! Placement reconciliation

use crate::runtime::{ReconcileAction, Reconciler};
use std::sync::Arc;
use weft_api::condition::{Condition, ConditionStatus};
use weft_api::meta::WeftObject;
use weft_api::placement::{ClusterWorkloadPlacement, TargetSelection};
use weft_api::store::ObjectStore;
use weft_api::synctarget::SyncTarget;
use weft_scheduler::evaluator::PlacementEvaluator;
use weft_shared::{ClusterKey, Result, Timestamp};

const COND_READY: &str = "Ready";

/// Evaluates each placement policy against the sync targets in its
/// workspace and records per-target selections with scores.
pub struct PlacementReconciler {
    placements: Arc<dyn ObjectStore<ClusterWorkloadPlacement>>,
    targets: Arc<dyn ObjectStore<SyncTarget>>,
    evaluator: PlacementEvaluator,
}

impl PlacementReconciler {
    pub fn new(
        placements: Arc<dyn ObjectStore<ClusterWorkloadPlacement>>,
        targets: Arc<dyn ObjectStore<SyncTarget>>,
    ) -> Self {
        Self {
            placements,
            targets,
            evaluator: PlacementEvaluator::new(),
        }
    }
}

#[async_trait::async_trait]
impl Reconciler for PlacementReconciler {
    async fn reconcile(&self, key: &str) -> Result<ReconcileAction> {
        let key = ClusterKey::parse(key)?;
        let Some(mut placement) = self.placements.get(&key).await? else {
            tracing::debug!(key = %key, "placement gone; dropping");
            return Ok(ReconcileAction::done());
        };

        let errors = placement.validate_create();
        if !errors.is_empty() {
            let message = errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            let previous = placement.status.conditions.clone();
            placement.status.conditions.set(
                Condition::new(COND_READY, ConditionStatus::False)
                    .with_reason("InvalidSpec")
                    .with_message(message),
            );
            if !placement.status.conditions.content_eq(&previous) {
                self.placements.update_status(placement).await?;
            }
            return Ok(ReconcileAction::done());
        }

        let previous = placement.status.clone();
        let all_targets = self.targets.list(Some(key.workspace())).await?;
        let now = Timestamp::now();

        // Unschedulable targets never reach the evaluator; they are recorded
        // as rejected so operators can see why a target is idle.
        let (cordoned, candidates): (Vec<_>, Vec<_>) = all_targets
            .into_iter()
            .partition(|t| t.spec.unschedulable);

        let result = self.evaluator.evaluate(&placement.spec, &candidates);

        let mut selections: Vec<TargetSelection> = result
            .evaluations
            .iter()
            .map(|e| TargetSelection {
                target_name: e.target_name.clone(),
                workspace: e.workspace.clone(),
                selected: e.selected,
                reason: e.reason.clone(),
                score: e.score,
                last_evaluation: Some(now),
            })
            .collect();
        for target in &cordoned {
            selections.push(TargetSelection {
                target_name: target.metadata.name.clone(),
                workspace: target.metadata.workspace.clone(),
                selected: false,
                reason: "target is unschedulable".into(),
                score: 0.0,
                last_evaluation: Some(now),
            });
        }
        selections.sort_by(|a, b| {
            b.selected
                .cmp(&a.selected)
                .then_with(|| b.score.total_cmp(&a.score))
                .then_with(|| a.target_name.cmp(&b.target_name))
        });

        let selected_count = result.ranked.len() as u32;
        placement.status.selected_count = selected_count;
        placement.status.selections = selections;
        if selected_count > 0 {
            placement.status.conditions.set(
                Condition::new(COND_READY, ConditionStatus::True)
                    .with_reason("TargetsSelected")
                    .with_message(format!("{selected_count} targets selected")),
            );
        } else {
            placement.status.conditions.set(
                Condition::new(COND_READY, ConditionStatus::False)
                    .with_reason("NoMatchingTargets"),
            );
        }

        // A re-evaluation that changes nothing but timestamps is a no-op;
        // writing it would re-trigger this reconciler through the watch.
        if !selection_outcome_changed(&previous, &placement.status) {
            return Ok(ReconcileAction::done());
        }

        self.placements.update_status(placement).await?;
        Ok(ReconcileAction::done())
    }
}

/// Compare placement statuses ignoring evaluation and transition timestamps.
fn selection_outcome_changed(
    previous: &weft_api::placement::PlacementStatus,
    next: &weft_api::placement::PlacementStatus,
) -> bool {
    if previous.selected_count != next.selected_count
        || !previous.conditions.content_eq(&next.conditions)
        || previous.selections.len() != next.selections.len()
    {
        return true;
    }
    previous
        .selections
        .iter()
        .zip(next.selections.iter())
        .any(|(a, b)| {
            a.target_name != b.target_name
                || a.workspace != b.workspace
                || a.selected != b.selected
                || a.reason != b.reason
                || a.score != b.score
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use weft_api::meta::ObjectMeta;
    use weft_api::placement::{LocationSelector, PlacementSpec, PlacementStatus};
    use weft_api::synctarget::{Cell, SyncTargetSpec, SyncTargetStatus};

    fn target(name: &str, location: &str) -> SyncTarget {
        SyncTarget {
            metadata: ObjectMeta::cluster_scoped("root:org", name),
            spec: SyncTargetSpec {
                cells: vec![Cell {
                    name: "cell-a".into(),
                    ..Default::default()
                }],
                location: Some(location.into()),
                ..Default::default()
            },
            status: SyncTargetStatus::default(),
        }
    }

    fn placement(name: &str, required: &[&str]) -> ClusterWorkloadPlacement {
        ClusterWorkloadPlacement {
            metadata: ObjectMeta::cluster_scoped("root:org", name),
            spec: PlacementSpec {
                location_selector: Some(LocationSelector {
                    required_locations: required.iter().map(|s| s.to_string()).collect(),
                    ..Default::default()
                }),
                ..Default::default()
            },
            status: PlacementStatus::default(),
        }
    }

    #[tokio::test]
    async fn records_selections_and_ready_condition() {
        let placements = MemoryStore::<ClusterWorkloadPlacement>::new();
        let targets = MemoryStore::<SyncTarget>::new();
        targets.create(target("west-coast", "us-west-1")).unwrap();
        targets.create(target("east-coast", "us-east-1")).unwrap();
        placements
            .create(placement("west-policy", &["us-west-1", "us-west-2"]))
            .unwrap();

        let reconciler =
            PlacementReconciler::new(placements.clone(), targets.clone());
        reconciler.reconcile("root:org|west-policy").await.unwrap();

        let key = ClusterKey::parse("root:org|west-policy").unwrap();
        let updated = placements.get(&key).await.unwrap().unwrap();
        assert_eq!(updated.status.selected_count, 1);
        assert!(updated.status.conditions.is_true("Ready"));

        let west = updated
            .status
            .selections
            .iter()
            .find(|s| s.target_name == "west-coast")
            .unwrap();
        assert!(west.selected);
        assert_eq!(west.reason, "target meets all placement criteria");

        let east = updated
            .status
            .selections
            .iter()
            .find(|s| s.target_name == "east-coast")
            .unwrap();
        assert!(!east.selected);
        assert!(east.reason.contains("location requirements not met"));
    }

    #[tokio::test]
    async fn unschedulable_targets_are_excluded() {
        let placements = MemoryStore::<ClusterWorkloadPlacement>::new();
        let targets = MemoryStore::<SyncTarget>::new();
        let mut cordoned = target("west-coast", "us-west-1");
        cordoned.spec.unschedulable = true;
        targets.create(cordoned).unwrap();
        placements
            .create(placement("west-policy", &["us-west-1"]))
            .unwrap();

        let reconciler =
            PlacementReconciler::new(placements.clone(), targets.clone());
        reconciler.reconcile("root:org|west-policy").await.unwrap();

        let key = ClusterKey::parse("root:org|west-policy").unwrap();
        let updated = placements.get(&key).await.unwrap().unwrap();
        assert_eq!(updated.status.selected_count, 0);
        assert!(updated.status.conditions.is_false("Ready"));
        assert_eq!(
            updated.status.selections[0].reason,
            "target is unschedulable"
        );
    }

    #[tokio::test]
    async fn missing_placement_is_success() {
        let placements = MemoryStore::<ClusterWorkloadPlacement>::new();
        let targets = MemoryStore::<SyncTarget>::new();
        let reconciler =
            PlacementReconciler::new(placements.clone(), targets.clone());
        let action = reconciler.reconcile("root:org|gone").await.unwrap();
        assert_eq!(action, ReconcileAction::done());
    }
}
