//! Rollout sequencing
//!
//! One step of the per-distribution state machine. Each reconcile tick feeds
//! the current spec, observed status and replica plan in; the sequencer
//! returns the next phase, the scale/switch intents the syncer must carry
//! out, and the condition updates to record. The sequencer itself never
//! touches the store.

use crate::distribution::ReplicaPlan;
use std::collections::HashMap;
use std::time::Duration;
use weft_api::condition::{Condition, ConditionStatus};
use weft_api::distribution::{
    DistributionPhase, DistributionSpec, DistributionStatus, IntOrPercent, PercentValue,
    RolloutType, DEFAULT_MAX_SURGE_PERCENT, DEFAULT_MAX_UNAVAILABLE_PERCENT,
    DEFAULT_SCALE_DOWN_DELAY_SECONDS,
};

/// Condition types maintained by the sequencer.
pub mod condition_types {
    pub const DISTRIBUTED: &str = "Distributed";
    pub const PAUSED: &str = "Paused";
    pub const PREVIEW_READY: &str = "PreviewReady";
    pub const PROMOTED: &str = "Promoted";
}

/// Unrecoverable sequencing failures. The reconciler records these as a
/// `Failed` phase and stops retrying until the spec generation moves.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RolloutError {
    #[error("explicit distribution replicas sum to {actual}, spec declares {expected}")]
    ReplicaSumMismatch { expected: i32, actual: i64 },

    #[error("conflicting strategy payload: {message}")]
    ConflictingStrategy { message: String },

    #[error("missing strategy payload: {message}")]
    MissingStrategyPayload { message: String },
}

/// One tick's worth of input.
#[derive(Debug, Clone, Copy)]
pub struct SequencerInput<'a> {
    pub spec: &'a DistributionSpec,
    /// Spec generation the intents are stamped with.
    pub generation: i64,
    pub status: &'a DistributionStatus,
    pub plan: &'a ReplicaPlan,
}

/// What the syncer must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutIntent {
    /// Drive one location to the given split of new-spec and old-spec
    /// replicas.
    Scale {
        location: String,
        updated_replicas: i32,
        legacy_replicas: i32,
        generation: i64,
    },
    /// Swap the traffic roles of two service sets (blue/green promotion).
    SwitchService { activate: String, retire: String },
}

/// Outcome of one sequencer step.
#[derive(Debug, Clone, Default)]
pub struct SequencerOutcome {
    pub phase: DistributionPhase,
    pub intents: Vec<RolloutIntent>,
    pub conditions: Vec<Condition>,
    /// Set when the sequencer is waiting on wall-clock time (blue/green
    /// scale-down delay); the reconciler re-queues after this interval.
    pub requeue_after: Option<Duration>,
}

/// Drives the RollingUpdate / Recreate / BlueGreen state machines.
#[derive(Debug, Default)]
pub struct RolloutSequencer;

#[derive(Debug, Clone, Copy, Default)]
struct Observed {
    current: i32,
    ready: i32,
    synced_generation: i64,
}

impl RolloutSequencer {
    pub fn new() -> Self {
        Self
    }

    /// Advance the rollout by one tick.
    pub fn step(&self, input: SequencerInput<'_>) -> Result<SequencerOutcome, RolloutError> {
        validate_strategy_payloads(input.spec)?;
        validate_replica_sum(input.spec)?;

        if input.spec.paused {
            return Ok(SequencerOutcome {
                phase: DistributionPhase::Paused,
                intents: Vec::new(),
                conditions: vec![Condition::new(condition_types::PAUSED, ConditionStatus::True)
                    .with_reason("SpecPaused")
                    .with_message("spec.paused is true; no mutations are issued")],
                requeue_after: None,
            });
        }

        let mut conditions = Vec::new();
        if input.status.conditions.is_true(condition_types::PAUSED) {
            conditions.push(
                Condition::new(condition_types::PAUSED, ConditionStatus::False)
                    .with_reason("Resumed"),
            );
        }

        if input.plan.is_empty() {
            return Ok(SequencerOutcome {
                phase: DistributionPhase::Pending,
                intents: Vec::new(),
                conditions,
                requeue_after: None,
            });
        }

        let total = input.spec.total_replicas.max(0);
        let counts_met = input.status.updated_replicas == total
            && input.status.ready_replicas == total;
        let promoted_if_needed = input.spec.strategy.type_ != RolloutType::BlueGreen
            || input.status.conditions.is_true(condition_types::PROMOTED);

        if counts_met && promoted_if_needed {
            conditions.push(
                Condition::new(condition_types::DISTRIBUTED, ConditionStatus::True)
                    .with_reason("AllReplicasReady")
                    .with_message(format!("{total} of {total} replicas updated and ready")),
            );
            return Ok(SequencerOutcome {
                phase: DistributionPhase::Distributed,
                intents: Vec::new(),
                conditions,
                requeue_after: None,
            });
        }

        conditions.push(
            Condition::new(condition_types::DISTRIBUTED, ConditionStatus::False)
                .with_reason("RolloutInProgress"),
        );

        let observed = observe(input.status);
        let mut outcome = match input.spec.strategy.type_ {
            RolloutType::RollingUpdate => rolling_update(&input, &observed),
            RolloutType::Recreate => recreate(&input, &observed),
            RolloutType::BlueGreen => blue_green(&input, &observed, &mut conditions),
        };

        outcome.phase = DistributionPhase::Distributing;
        conditions.append(&mut outcome.conditions);
        outcome.conditions = conditions;
        Ok(outcome)
    }
}

fn validate_strategy_payloads(spec: &DistributionSpec) -> Result<(), RolloutError> {
    let strategy = &spec.strategy;
    match strategy.type_ {
        RolloutType::RollingUpdate => {
            if strategy.blue_green.is_some() {
                return Err(RolloutError::ConflictingStrategy {
                    message: "blueGreen must be nil for RollingUpdate".into(),
                });
            }
        }
        RolloutType::Recreate => {
            if strategy.rolling_update.is_some() {
                return Err(RolloutError::ConflictingStrategy {
                    message: "rollingUpdate must be nil for Recreate".into(),
                });
            }
            if strategy.blue_green.is_some() {
                return Err(RolloutError::ConflictingStrategy {
                    message: "blueGreen must be nil for Recreate".into(),
                });
            }
        }
        RolloutType::BlueGreen => {
            if strategy.rolling_update.is_some() {
                return Err(RolloutError::ConflictingStrategy {
                    message: "rollingUpdate must be nil for BlueGreen".into(),
                });
            }
            if strategy.blue_green.is_none() {
                return Err(RolloutError::MissingStrategyPayload {
                    message: "blueGreen parameters are required".into(),
                });
            }
        }
    }
    Ok(())
}

/// Explicit distributions that passed admission can still disagree with a
/// stale cached spec; re-check before mutating anything.
fn validate_replica_sum(spec: &DistributionSpec) -> Result<(), RolloutError> {
    if spec.distributions.is_empty() {
        return Ok(());
    }
    let actual: i64 = spec.distributions.iter().map(|d| i64::from(d.replicas)).sum();
    if actual != i64::from(spec.total_replicas) {
        return Err(RolloutError::ReplicaSumMismatch {
            expected: spec.total_replicas,
            actual,
        });
    }
    Ok(())
}

fn observe(status: &DistributionStatus) -> HashMap<String, Observed> {
    status
        .locations
        .iter()
        .map(|l| {
            (
                l.location_name.clone(),
                Observed {
                    current: l.current_replicas,
                    ready: l.ready_replicas,
                    synced_generation: l.synced_generation,
                },
            )
        })
        .collect()
}

/// Resolve an int-or-percent bound against the replica total. Percentages
/// of `max_unavailable` round down, `max_surge` rounds up; both clamp to at
/// least one replica whenever the total is non-zero.
fn resolve_bound(value: Option<&IntOrPercent>, default_percent: i32, total: i32, round_up: bool) -> i32 {
    let resolved = match value {
        Some(IntOrPercent::Int(v)) => *v,
        Some(IntOrPercent::Percent(PercentValue(p))) => percent_of(total, *p, round_up),
        None => percent_of(total, default_percent, round_up),
    };
    if total >= 1 {
        resolved.max(1)
    } else {
        resolved.max(0)
    }
}

fn percent_of(total: i32, percent: i32, round_up: bool) -> i32 {
    let product = i64::from(total) * i64::from(percent);
    let result = if round_up {
        (product + 99) / 100
    } else {
        product / 100
    };
    result as i32
}

fn rolling_update(
    input: &SequencerInput<'_>,
    observed: &HashMap<String, Observed>,
) -> SequencerOutcome {
    let total = input.spec.total_replicas.max(0);
    let rolling = input.spec.strategy.rolling_update.clone().unwrap_or_default();
    let mut surge_budget = resolve_bound(
        rolling.max_surge.as_ref(),
        DEFAULT_MAX_SURGE_PERCENT,
        total,
        true,
    );
    let mut unavailable_budget = resolve_bound(
        rolling.max_unavailable.as_ref(),
        DEFAULT_MAX_UNAVAILABLE_PERCENT,
        total,
        false,
    );

    let mut intents = Vec::new();
    for (ordinal, location) in input.plan.rollout_order.iter().enumerate() {
        let desired = input.plan.replicas.get(location).copied().unwrap_or(0);
        let state = observed.get(location).copied().unwrap_or_default();

        if state.synced_generation >= input.generation {
            // Already on the new spec; hold it at target.
            intents.push(RolloutIntent::Scale {
                location: location.clone(),
                updated_replicas: desired,
                legacy_replicas: 0,
                generation: input.generation,
            });
            continue;
        }

        if let Some(partition) = rolling.partition {
            if ordinal as i32 >= partition {
                // Partitioned out of this step; left on the old spec.
                continue;
            }
        }

        let promote = desired.min(surge_budget);
        let teardown = state.current.min(unavailable_budget);
        if promote == 0 && teardown == 0 {
            continue;
        }
        surge_budget -= promote;
        unavailable_budget -= teardown;

        intents.push(RolloutIntent::Scale {
            location: location.clone(),
            updated_replicas: promote,
            legacy_replicas: state.current - teardown,
            generation: input.generation,
        });
    }

    SequencerOutcome {
        phase: DistributionPhase::Distributing,
        intents,
        conditions: Vec::new(),
        requeue_after: None,
    }
}

fn recreate(input: &SequencerInput<'_>, observed: &HashMap<String, Observed>) -> SequencerOutcome {
    let stale_running = observed
        .values()
        .any(|state| state.current > 0 && state.synced_generation < input.generation);

    let mut intents = Vec::new();
    if stale_running {
        // Phase one: everything to zero, old and new alike.
        for location in &input.plan.rollout_order {
            intents.push(RolloutIntent::Scale {
                location: location.clone(),
                updated_replicas: 0,
                legacy_replicas: 0,
                generation: input.generation,
            });
        }
    } else {
        // Observed zero everywhere; bring the new spec to target.
        for location in &input.plan.rollout_order {
            let desired = input.plan.replicas.get(location).copied().unwrap_or(0);
            intents.push(RolloutIntent::Scale {
                location: location.clone(),
                updated_replicas: desired,
                legacy_replicas: 0,
                generation: input.generation,
            });
        }
    }

    SequencerOutcome {
        phase: DistributionPhase::Distributing,
        intents,
        conditions: Vec::new(),
        requeue_after: None,
    }
}

fn blue_green(
    input: &SequencerInput<'_>,
    observed: &HashMap<String, Observed>,
    conditions: &mut Vec<Condition>,
) -> SequencerOutcome {
    let params = input
        .spec
        .strategy
        .blue_green
        .as_ref()
        .expect("payload checked by validate_strategy_payloads");
    let active = params.active_service.clone();
    let preview = params
        .preview_service
        .clone()
        .unwrap_or_else(|| format!("{active}-preview"));
    let scale_down_delay = Duration::from_secs(
        params
            .scale_down_delay_seconds
            .unwrap_or(DEFAULT_SCALE_DOWN_DELAY_SECONDS)
            .max(0) as u64,
    );

    let preview_ready = input.plan.rollout_order.iter().all(|location| {
        let desired = input.plan.replicas.get(location).copied().unwrap_or(0);
        let state = observed.get(location).copied().unwrap_or_default();
        state.synced_generation >= input.generation && state.ready >= desired
    });

    let promoted = input.status.conditions.is_true(condition_types::PROMOTED);
    let mut intents = Vec::new();
    let mut requeue_after = None;

    if !promoted {
        // Bring the preview side to full capacity alongside the active side.
        for location in &input.plan.rollout_order {
            let desired = input.plan.replicas.get(location).copied().unwrap_or(0);
            let state = observed.get(location).copied().unwrap_or_default();
            let legacy = if state.synced_generation >= input.generation {
                0
            } else {
                state.current
            };
            intents.push(RolloutIntent::Scale {
                location: location.clone(),
                updated_replicas: desired,
                legacy_replicas: legacy,
                generation: input.generation,
            });
        }

        if preview_ready {
            conditions.push(
                Condition::new(condition_types::PREVIEW_READY, ConditionStatus::True)
                    .with_reason("PreviewAtCapacity"),
            );
            if params.auto_promotion_enabled {
                intents.push(RolloutIntent::SwitchService {
                    activate: preview.clone(),
                    retire: active.clone(),
                });
                conditions.push(
                    Condition::new(condition_types::PROMOTED, ConditionStatus::True)
                        .with_reason("AutoPromoted")
                        .with_message(format!("traffic switched from {active} to {preview}")),
                );
            }
        } else {
            conditions.push(
                Condition::new(condition_types::PREVIEW_READY, ConditionStatus::False)
                    .with_reason("PreviewScalingUp"),
            );
        }
    } else {
        // Promotion happened; scale the retired side down once the delay has
        // elapsed since the Promoted transition.
        let elapsed = input
            .status
            .conditions
            .get(condition_types::PROMOTED)
            .and_then(|c| c.last_transition_time)
            .map(|t| t.elapsed())
            .unwrap_or(Duration::ZERO);

        if elapsed >= scale_down_delay {
            for location in &input.plan.rollout_order {
                let desired = input.plan.replicas.get(location).copied().unwrap_or(0);
                intents.push(RolloutIntent::Scale {
                    location: location.clone(),
                    updated_replicas: desired,
                    legacy_replicas: 0,
                    generation: input.generation,
                });
            }
        } else {
            requeue_after = Some(scale_down_delay - elapsed);
        }
    }

    SequencerOutcome {
        phase: DistributionPhase::Distributing,
        intents,
        conditions: Vec::new(),
        requeue_after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution;
    use weft_api::distribution::{
        BlueGreenStrategy, LocationDistribution, LocationStatus, RolloutStrategy,
        RollingUpdateStrategy, WorkloadReference,
    };
    use weft_shared::Timestamp;

    fn spec(total: i32) -> DistributionSpec {
        DistributionSpec {
            workload_ref: WorkloadReference {
                api_version: "apps/v1".into(),
                kind: "Deployment".into(),
                name: "web".into(),
                namespace: Some("default".into()),
            },
            total_replicas: total,
            ..Default::default()
        }
    }

    fn plan_for(spec: &DistributionSpec, locations: &[&str]) -> ReplicaPlan {
        let locations: Vec<String> = locations.iter().map(|s| s.to_string()).collect();
        distribution::plan(spec, &locations)
    }

    fn location_status(name: &str, current: i32, ready: i32, generation: i64) -> LocationStatus {
        LocationStatus {
            location_name: name.into(),
            allocated_replicas: current,
            current_replicas: current,
            ready_replicas: ready,
            synced_generation: generation,
            ..Default::default()
        }
    }

    #[test]
    fn resolve_bound_rounding_and_clamping() {
        // 25% of 3: unavailable floors to 0 then clamps to 1; surge ceils to 1.
        assert_eq!(resolve_bound(Some(&IntOrPercent::percent(25)), 25, 3, false), 1);
        assert_eq!(resolve_bound(Some(&IntOrPercent::percent(25)), 25, 3, true), 1);
        // 25% of 10: floor 2, ceil 3.
        assert_eq!(resolve_bound(Some(&IntOrPercent::percent(25)), 25, 10, false), 2);
        assert_eq!(resolve_bound(Some(&IntOrPercent::percent(25)), 25, 10, true), 3);
        // Integer zero still clamps to 1 for a non-zero total.
        assert_eq!(resolve_bound(Some(&IntOrPercent::Int(0)), 25, 5, false), 1);
        // Zero total clamps to zero.
        assert_eq!(resolve_bound(Some(&IntOrPercent::percent(25)), 25, 0, true), 0);
    }

    #[test]
    fn pending_until_plan_exists_then_distributing() {
        let sequencer = RolloutSequencer::new();
        let spec = spec(3);
        let status = DistributionStatus::default();

        let empty = ReplicaPlan::default();
        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 1,
                status: &status,
                plan: &empty,
            })
            .unwrap();
        assert_eq!(outcome.phase, DistributionPhase::Pending);

        let plan = plan_for(&spec, &["a", "b"]);
        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 1,
                status: &status,
                plan: &plan,
            })
            .unwrap();
        assert_eq!(outcome.phase, DistributionPhase::Distributing);
        assert!(!outcome.intents.is_empty());
        assert!(outcome
            .conditions
            .iter()
            .any(|c| c.type_ == condition_types::DISTRIBUTED
                && c.status == ConditionStatus::False));
    }

    #[test]
    fn distributed_when_counts_meet_total() {
        let sequencer = RolloutSequencer::new();
        let spec = spec(3);
        let plan = plan_for(&spec, &["a"]);
        let status = DistributionStatus {
            updated_replicas: 3,
            ready_replicas: 3,
            current_replicas: 3,
            locations: vec![location_status("a", 3, 3, 1)],
            ..Default::default()
        };

        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 1,
                status: &status,
                plan: &plan,
            })
            .unwrap();
        assert_eq!(outcome.phase, DistributionPhase::Distributed);
        assert!(outcome.intents.is_empty());
        let distributed = outcome
            .conditions
            .iter()
            .find(|c| c.type_ == condition_types::DISTRIBUTED)
            .unwrap();
        assert_eq!(distributed.status, ConditionStatus::True);
        assert_eq!(distributed.reason, "AllReplicasReady");
    }

    #[test]
    fn paused_short_circuits_mutations() {
        let sequencer = RolloutSequencer::new();
        let mut spec = spec(3);
        spec.paused = true;
        let plan = plan_for(&spec, &["a"]);
        let status = DistributionStatus::default();

        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 1,
                status: &status,
                plan: &plan,
            })
            .unwrap();
        assert_eq!(outcome.phase, DistributionPhase::Paused);
        assert!(outcome.intents.is_empty());
        assert!(outcome
            .conditions
            .iter()
            .any(|c| c.type_ == condition_types::PAUSED && c.status == ConditionStatus::True));
    }

    #[test]
    fn resume_clears_the_paused_condition() {
        let sequencer = RolloutSequencer::new();
        let spec = spec(3);
        let plan = plan_for(&spec, &["a"]);
        let mut status = DistributionStatus::default();
        status
            .conditions
            .set(Condition::new(condition_types::PAUSED, ConditionStatus::True));

        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 1,
                status: &status,
                plan: &plan,
            })
            .unwrap();
        assert!(outcome
            .conditions
            .iter()
            .any(|c| c.type_ == condition_types::PAUSED && c.status == ConditionStatus::False));
    }

    #[test]
    fn rolling_update_respects_budgets_in_rollout_order() {
        let sequencer = RolloutSequencer::new();
        let mut spec = spec(10);
        spec.strategy = RolloutStrategy {
            type_: RolloutType::RollingUpdate,
            rolling_update: Some(RollingUpdateStrategy {
                max_unavailable: Some(IntOrPercent::Int(2)),
                max_surge: Some(IntOrPercent::Int(4)),
                partition: None,
            }),
            blue_green: None,
        };
        let plan = plan_for(&spec, &["a", "b", "c"]);
        // Everything still on generation 1 while we roll to generation 2.
        let status = DistributionStatus {
            current_replicas: 10,
            ready_replicas: 10,
            updated_replicas: 0,
            locations: vec![
                location_status("a", 4, 4, 1),
                location_status("b", 3, 3, 1),
                location_status("c", 3, 3, 1),
            ],
            ..Default::default()
        };

        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 2,
                status: &status,
                plan: &plan,
            })
            .unwrap();

        // Rollout order is a, b, c (default priorities, name order). The
        // surge budget of 4 is consumed by a; b gets nothing new but can
        // still tear down nothing (unavailable budget spent on a's teardown).
        let scale_a = outcome
            .intents
            .iter()
            .find(|i| matches!(i, RolloutIntent::Scale { location, .. } if location == "a"))
            .unwrap();
        match scale_a {
            RolloutIntent::Scale {
                updated_replicas,
                legacy_replicas,
                generation,
                ..
            } => {
                assert_eq!(*updated_replicas, 4, "surge budget allows a's full target");
                assert_eq!(*legacy_replicas, 2, "unavailable budget removes two old replicas");
                assert_eq!(*generation, 2);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn rolling_update_partition_skips_high_ordinals() {
        let sequencer = RolloutSequencer::new();
        let mut spec = spec(6);
        spec.strategy = RolloutStrategy {
            type_: RolloutType::RollingUpdate,
            rolling_update: Some(RollingUpdateStrategy {
                max_unavailable: Some(IntOrPercent::Int(6)),
                max_surge: Some(IntOrPercent::Int(6)),
                partition: Some(1),
            }),
            blue_green: None,
        };
        let plan = plan_for(&spec, &["a", "b", "c"]);
        let status = DistributionStatus {
            locations: vec![
                location_status("a", 2, 2, 1),
                location_status("b", 2, 2, 1),
                location_status("c", 2, 2, 1),
            ],
            ..Default::default()
        };

        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 2,
                status: &status,
                plan: &plan,
            })
            .unwrap();

        let touched: Vec<&str> = outcome
            .intents
            .iter()
            .filter_map(|i| match i {
                RolloutIntent::Scale { location, .. } => Some(location.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(touched, vec!["a"], "only ordinal 0 is below the partition");
    }

    #[test]
    fn recreate_scales_down_then_up() {
        let sequencer = RolloutSequencer::new();
        let mut spec = spec(4);
        spec.strategy.type_ = RolloutType::Recreate;
        spec.strategy.rolling_update = None;
        let plan = plan_for(&spec, &["a", "b"]);

        // Old replicas still running: everything must go to zero.
        let running = DistributionStatus {
            locations: vec![location_status("a", 2, 2, 1), location_status("b", 2, 2, 1)],
            ..Default::default()
        };
        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 2,
                status: &running,
                plan: &plan,
            })
            .unwrap();
        for intent in &outcome.intents {
            match intent {
                RolloutIntent::Scale {
                    updated_replicas,
                    legacy_replicas,
                    ..
                } => {
                    assert_eq!(*updated_replicas, 0);
                    assert_eq!(*legacy_replicas, 0);
                }
                _ => unreachable!(),
            }
        }

        // Observed zero: bring the new generation to target.
        let drained = DistributionStatus {
            locations: vec![location_status("a", 0, 0, 1), location_status("b", 0, 0, 1)],
            ..Default::default()
        };
        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 2,
                status: &drained,
                plan: &plan,
            })
            .unwrap();
        let total: i32 = outcome
            .intents
            .iter()
            .map(|i| match i {
                RolloutIntent::Scale {
                    updated_replicas, ..
                } => *updated_replicas,
                _ => 0,
            })
            .sum();
        assert_eq!(total, 4);
    }

    fn blue_green_spec(total: i32, auto: bool) -> DistributionSpec {
        let mut s = spec(total);
        s.strategy = RolloutStrategy {
            type_: RolloutType::BlueGreen,
            rolling_update: None,
            blue_green: Some(BlueGreenStrategy {
                active_service: "web-active".into(),
                preview_service: Some("web-preview".into()),
                auto_promotion_enabled: auto,
                scale_down_delay_seconds: Some(30),
            }),
        };
        s
    }

    #[test]
    fn blue_green_promotes_when_preview_ready() {
        let sequencer = RolloutSequencer::new();
        let spec = blue_green_spec(4, true);
        let plan = plan_for(&spec, &["a", "b"]);
        let status = DistributionStatus {
            locations: vec![location_status("a", 2, 2, 2), location_status("b", 2, 2, 2)],
            ..Default::default()
        };

        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 2,
                status: &status,
                plan: &plan,
            })
            .unwrap();

        assert!(outcome.intents.iter().any(|i| matches!(
            i,
            RolloutIntent::SwitchService { activate, retire }
                if activate == "web-preview" && retire == "web-active"
        )));
        assert!(outcome
            .conditions
            .iter()
            .any(|c| c.type_ == condition_types::PROMOTED && c.status == ConditionStatus::True));
    }

    #[test]
    fn blue_green_without_auto_promotion_waits() {
        let sequencer = RolloutSequencer::new();
        let spec = blue_green_spec(4, false);
        let plan = plan_for(&spec, &["a", "b"]);
        let status = DistributionStatus {
            locations: vec![location_status("a", 2, 2, 2), location_status("b", 2, 2, 2)],
            ..Default::default()
        };

        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 2,
                status: &status,
                plan: &plan,
            })
            .unwrap();

        assert!(!outcome
            .intents
            .iter()
            .any(|i| matches!(i, RolloutIntent::SwitchService { .. })));
        assert!(outcome
            .conditions
            .iter()
            .any(|c| c.type_ == condition_types::PREVIEW_READY
                && c.status == ConditionStatus::True));
    }

    #[test]
    fn blue_green_scale_down_waits_for_the_delay() {
        let sequencer = RolloutSequencer::new();
        let spec = blue_green_spec(4, true);
        let plan = plan_for(&spec, &["a", "b"]);

        // Freshly promoted: the delay has not elapsed yet.
        let mut status = DistributionStatus {
            locations: vec![location_status("a", 2, 2, 2), location_status("b", 2, 2, 2)],
            ..Default::default()
        };
        status
            .conditions
            .set(Condition::new(condition_types::PROMOTED, ConditionStatus::True));
        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 2,
                status: &status,
                plan: &plan,
            })
            .unwrap();
        assert!(outcome.intents.is_empty());
        assert!(outcome.requeue_after.is_some());

        // Promotion long past: the old side scales to zero.
        let mut status = status;
        status.conditions = {
            let mut set = weft_api::condition::ConditionSet::new();
            let mut promoted =
                Condition::new(condition_types::PROMOTED, ConditionStatus::True);
            promoted.last_transition_time = Some(Timestamp::from_datetime(
                chrono::Utc::now() - chrono::Duration::seconds(120),
            ));
            set.set(promoted);
            set
        };
        let outcome = sequencer
            .step(SequencerInput {
                spec: &spec,
                generation: 2,
                status: &status,
                plan: &plan,
            })
            .unwrap();
        assert!(outcome.requeue_after.is_none());
        for intent in &outcome.intents {
            if let RolloutIntent::Scale {
                legacy_replicas, ..
            } = intent
            {
                assert_eq!(*legacy_replicas, 0);
            }
        }
    }

    #[test]
    fn conflicting_strategy_payloads_are_terminal() {
        let sequencer = RolloutSequencer::new();
        let mut bad = spec(3);
        bad.strategy = RolloutStrategy {
            type_: RolloutType::RollingUpdate,
            rolling_update: None,
            blue_green: Some(BlueGreenStrategy {
                active_service: "web".into(),
                ..Default::default()
            }),
        };
        let plan = plan_for(&bad, &["a"]);
        let err = sequencer
            .step(SequencerInput {
                spec: &bad,
                generation: 1,
                status: &DistributionStatus::default(),
                plan: &plan,
            })
            .unwrap_err();
        assert!(matches!(err, RolloutError::ConflictingStrategy { .. }));
    }

    #[test]
    fn stale_replica_sum_is_terminal() {
        let sequencer = RolloutSequencer::new();
        let mut bad = spec(10);
        bad.distributions = vec![
            LocationDistribution {
                location_name: "a".into(),
                replicas: 3,
                priority: Some(50),
            },
            LocationDistribution {
                location_name: "b".into(),
                replicas: 4,
                priority: Some(50),
            },
        ];
        let plan = plan_for(&bad, &[]);
        let err = sequencer
            .step(SequencerInput {
                spec: &bad,
                generation: 1,
                status: &DistributionStatus::default(),
                plan: &plan,
            })
            .unwrap_err();
        assert_eq!(
            err,
            RolloutError::ReplicaSumMismatch {
                expected: 10,
                actual: 7
            }
        );
    }
}
