//! Replica distribution math
//!
//! Turns a distribution spec and an ordered location list into per-location
//! replica counts and a deterministic rollout order.

use std::collections::BTreeMap;
use weft_api::distribution::{DistributionSpec, DEFAULT_LOCATION_PRIORITY};

/// Per-location replica counts plus the order locations are rolled out in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaPlan {
    pub replicas: BTreeMap<String, i32>,
    /// Ascending priority (lower rolls out first), ties broken by name.
    pub rollout_order: Vec<String>,
}

impl ReplicaPlan {
    pub fn total(&self) -> i32 {
        self.replicas.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

/// Compute the replica plan for `spec` over `locations`.
///
/// Explicit distributions pass through untouched. Otherwise replicas are
/// split evenly: every location gets `total / len`, and the first
/// `total % len` locations in the input order get one extra.
pub fn plan(spec: &DistributionSpec, locations: &[String]) -> ReplicaPlan {
    let mut replicas = BTreeMap::new();
    let mut priorities: BTreeMap<String, i32> = BTreeMap::new();

    if !spec.distributions.is_empty() {
        for entry in &spec.distributions {
            replicas.insert(entry.location_name.clone(), entry.replicas);
            priorities.insert(
                entry.location_name.clone(),
                entry.priority.unwrap_or(DEFAULT_LOCATION_PRIORITY),
            );
        }
    } else {
        if locations.is_empty() {
            return ReplicaPlan::default();
        }
        let total = spec.total_replicas.max(0);
        let count = locations.len() as i32;
        let base = total / count;
        let remainder = (total % count) as usize;

        for (i, location) in locations.iter().enumerate() {
            let extra = if i < remainder { 1 } else { 0 };
            replicas.insert(location.clone(), base + extra);
            priorities.insert(location.clone(), DEFAULT_LOCATION_PRIORITY);
        }
    }

    let mut rollout_order: Vec<String> = replicas.keys().cloned().collect();
    rollout_order.sort_by(|a, b| {
        let pa = priorities.get(a).copied().unwrap_or(DEFAULT_LOCATION_PRIORITY);
        let pb = priorities.get(b).copied().unwrap_or(DEFAULT_LOCATION_PRIORITY);
        pa.cmp(&pb).then_with(|| a.cmp(b))
    });

    ReplicaPlan {
        replicas,
        rollout_order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_api::distribution::LocationDistribution;

    fn spec_with_total(total: i32) -> DistributionSpec {
        DistributionSpec {
            total_replicas: total,
            ..Default::default()
        }
    }

    fn locations(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn even_split_assigns_remainder_to_first_locations() {
        let plan = plan(&spec_with_total(10), &locations(&["a", "b", "c"]));
        assert_eq!(plan.replicas.get("a"), Some(&4));
        assert_eq!(plan.replicas.get("b"), Some(&3));
        assert_eq!(plan.replicas.get("c"), Some(&3));
        assert_eq!(plan.total(), 10);
    }

    #[test]
    fn split_preserves_input_order_for_remainder() {
        let plan = plan(&spec_with_total(7), &locations(&["zulu", "alpha", "mike"]));
        assert_eq!(plan.replicas.get("zulu"), Some(&3));
        assert_eq!(plan.replicas.get("alpha"), Some(&2));
        assert_eq!(plan.replicas.get("mike"), Some(&2));
    }

    #[test]
    fn sum_always_equals_total() {
        for total in 0..25 {
            for count in 1..6 {
                let names: Vec<String> = (0..count).map(|i| format!("loc-{i}")).collect();
                let plan = plan(&spec_with_total(total), &names);
                assert_eq!(plan.total(), total, "total={total} count={count}");
                let base = total / count;
                assert!(plan.replicas.values().all(|&r| r >= base));
            }
        }
    }

    #[test]
    fn no_locations_yields_empty_plan() {
        let plan = plan(&spec_with_total(5), &[]);
        assert!(plan.is_empty());
        assert!(plan.rollout_order.is_empty());
    }

    #[test]
    fn explicit_distributions_pass_through() {
        let mut spec = spec_with_total(7);
        spec.distributions = vec![
            LocationDistribution {
                location_name: "a".into(),
                replicas: 3,
                priority: None,
            },
            LocationDistribution {
                location_name: "b".into(),
                replicas: 4,
                priority: None,
            },
        ];
        let plan = plan(&spec, &[]);
        assert_eq!(plan.replicas.get("a"), Some(&3));
        assert_eq!(plan.replicas.get("b"), Some(&4));
        assert_eq!(plan.total(), 7);
    }

    #[test]
    fn rollout_order_is_priority_then_name() {
        let mut spec = spec_with_total(9);
        spec.distributions = vec![
            LocationDistribution {
                location_name: "canary".into(),
                replicas: 1,
                priority: Some(10),
            },
            LocationDistribution {
                location_name: "west".into(),
                replicas: 4,
                priority: None,
            },
            LocationDistribution {
                location_name: "east".into(),
                replicas: 4,
                priority: None,
            },
        ];
        let plan = plan(&spec, &[]);
        assert_eq!(plan.rollout_order, vec!["canary", "east", "west"]);
    }

    #[test]
    fn placement_derived_locations_order_by_name_at_default_priority() {
        let plan = plan(&spec_with_total(3), &locations(&["west", "east", "north"]));
        assert_eq!(plan.rollout_order, vec!["east", "north", "west"]);
    }
}
