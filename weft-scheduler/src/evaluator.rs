//! Placement evaluation
//!
//! Filters a snapshot of candidate sync targets against a
//! `ClusterWorkloadPlacement` policy and ranks the survivors. The filter
//! decision and the score are independent: preferred locations and capacity
//! headroom only affect ranking.

use std::collections::BTreeMap;
use weft_api::placement::PlacementSpec;
use weft_api::quota::resource_names;
use weft_api::synctarget::SyncTarget;
use weft_shared::Quantity;

/// Reason reported for targets passing every criterion.
pub const REASON_ACCEPTED: &str = "target meets all placement criteria";
/// Reason reported for a missing candidate.
pub const REASON_NIL_TARGET: &str = "target is nil";
/// Reason reported when the location selector filters a target out.
pub const REASON_LOCATION: &str = "location requirements not met";
/// Reason reported when target labels do not satisfy the namespace selector.
pub const REASON_NAMESPACE_SELECTOR: &str = "namespace selector does not match";
/// Reason reported when allocatable capacity is below the requirements.
pub const REASON_RESOURCES: &str = "resource requirements not met";

const PREFERRED_LOCATION_SCORE: f64 = 10.0;
const EXPRESSION_MATCH_SCORE: f64 = 1.0;
const MAX_HEADROOM_SCORE: f64 = 20.0;

/// Evaluates sync targets against placement policies.
#[derive(Debug, Default)]
pub struct PlacementEvaluator;

/// The verdict for one candidate target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetEvaluation {
    pub target_name: String,
    pub workspace: String,
    pub selected: bool,
    pub reason: String,
    pub score: f64,
}

/// All verdicts plus the selected names in rank order.
#[derive(Debug, Clone, Default)]
pub struct PlacementResult {
    pub evaluations: Vec<TargetEvaluation>,
    /// Selected target names, descending score, ties broken by name.
    pub ranked: Vec<String>,
}

impl PlacementEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate one candidate. `None` models a missing target and is always
    /// rejected.
    pub fn evaluate_target(
        &self,
        policy: &PlacementSpec,
        target: Option<&SyncTarget>,
    ) -> (bool, String) {
        let Some(target) = target else {
            return (false, REASON_NIL_TARGET.to_string());
        };

        if let Some(selector) = &policy.namespace_selector {
            match selector.compile() {
                Err(err) => {
                    return (false, format!("invalid namespace selector: {err}"));
                }
                Ok(compiled) => {
                    if !compiled.matches(&target.metadata.labels) {
                        return (false, REASON_NAMESPACE_SELECTOR.to_string());
                    }
                }
            }
        }

        if let Some(locations) = &policy.location_selector {
            if !locations.required_locations.is_empty() {
                let matched = target
                    .spec
                    .location
                    .as_deref()
                    .is_some_and(|location| {
                        !location.is_empty()
                            && locations.required_locations.iter().any(|l| l == location)
                    });
                if !matched {
                    return (false, REASON_LOCATION.to_string());
                }
            }
        }

        if let Some(requirements) = &policy.resource_requirements {
            let allocatable = &target.status.allocatable;
            let cpu = allocatable.get(resource_names::REQUESTS_CPU).or_else(|| allocatable.get("cpu"));
            let memory = allocatable
                .get(resource_names::REQUESTS_MEMORY)
                .or_else(|| allocatable.get("memory"));

            // A target reporting no capacity data at all is accepted
            // conservatively.
            if cpu.is_some() || memory.is_some() {
                if let Some(min_cpu) = &requirements.min_cpu {
                    match Quantity::parse(min_cpu) {
                        Err(err) => {
                            return (false, format!("invalid resource requirements: {err}"));
                        }
                        Ok(required) => {
                            if cpu.copied().unwrap_or_default() < required {
                                return (false, REASON_RESOURCES.to_string());
                            }
                        }
                    }
                }
                if let Some(min_memory) = &requirements.min_memory {
                    match Quantity::parse(min_memory) {
                        Err(err) => {
                            return (false, format!("invalid resource requirements: {err}"));
                        }
                        Ok(required) => {
                            if memory.copied().unwrap_or_default() < required {
                                return (false, REASON_RESOURCES.to_string());
                            }
                        }
                    }
                }
            }
        }

        (true, REASON_ACCEPTED.to_string())
    }

    /// Score a target against the policy. Monotone in match strength and
    /// independent of the filter decision.
    pub fn score_target(&self, policy: &PlacementSpec, target: &SyncTarget) -> f64 {
        let mut score = 0.0;

        if let Some(locations) = &policy.location_selector {
            if let Some(location) = target.spec.location.as_deref() {
                for preferred in &locations.preferred_locations {
                    if preferred == location {
                        score += PREFERRED_LOCATION_SCORE;
                    }
                }
            }
        }

        if let Some(selector) = &policy.namespace_selector {
            for requirement in &selector.match_expressions {
                let single = weft_api::selector::LabelSelector {
                    match_expressions: vec![requirement.clone()],
                    ..Default::default()
                };
                if let Ok(compiled) = single.compile() {
                    if compiled.matches(&target.metadata.labels) {
                        score += EXPRESSION_MATCH_SCORE;
                    }
                }
            }
        }

        score += headroom_score(&target.status.allocatable, &target.status.allocated);
        score
    }

    /// Evaluate and rank a snapshot of candidates.
    pub fn evaluate(&self, policy: &PlacementSpec, targets: &[SyncTarget]) -> PlacementResult {
        tracing::debug!(candidates = targets.len(), "evaluating placement policy");
        let mut evaluations = Vec::with_capacity(targets.len());
        for target in targets {
            let (selected, reason) = self.evaluate_target(policy, Some(target));
            let score = self.score_target(policy, target);
            evaluations.push(TargetEvaluation {
                target_name: target.metadata.name.clone(),
                workspace: target.metadata.workspace.clone(),
                selected,
                reason,
                score,
            });
        }

        let mut ranked: Vec<&TargetEvaluation> =
            evaluations.iter().filter(|e| e.selected).collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.target_name.cmp(&b.target_name))
        });
        let ranked = ranked.into_iter().map(|e| e.target_name.clone()).collect();

        PlacementResult {
            evaluations,
            ranked,
        }
    }
}

/// 0-20 linear score on min(cpu headroom ratio, memory headroom ratio),
/// where headroom is the allocatable share not yet allocated. Targets with
/// no capacity data score zero headroom.
fn headroom_score(
    allocatable: &BTreeMap<String, Quantity>,
    allocated: &BTreeMap<String, Quantity>,
) -> f64 {
    let ratio = |resource: &str, alias: &str| -> Option<f64> {
        let total = allocatable.get(resource).or_else(|| allocatable.get(alias))?;
        if total.millis() <= 0 {
            return None;
        }
        let used = allocated
            .get(resource)
            .or_else(|| allocated.get(alias))
            .copied()
            .unwrap_or_default();
        let free = (total.millis() - used.millis()).max(0) as f64;
        Some(free / total.millis() as f64)
    };

    let cpu = ratio(resource_names::REQUESTS_CPU, "cpu");
    let memory = ratio(resource_names::REQUESTS_MEMORY, "memory");
    match (cpu, memory) {
        (Some(c), Some(m)) => MAX_HEADROOM_SCORE * c.min(m).clamp(0.0, 1.0),
        (Some(c), None) => MAX_HEADROOM_SCORE * c.clamp(0.0, 1.0),
        (None, Some(m)) => MAX_HEADROOM_SCORE * m.clamp(0.0, 1.0),
        (None, None) => 0.0,
    }
}
