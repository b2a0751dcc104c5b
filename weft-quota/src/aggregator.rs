//! Usage aggregation and violation detection

use weft_api::meta::ResourceList;
use weft_api::quota::{
    resource_names, PodObservation, PvcObservation, PvcPhase, ResourceQuota, ResourceQuotaStatus,
};
use weft_shared::{Quantity, Timestamp};

/// Rolls up observed inventory into quota status.
#[derive(Debug, Default)]
pub struct QuotaAggregator;

impl QuotaAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Compute the full status for one quota from the namespace inventory.
    /// `hard` is echoed, `used` is the aggregate, and violations list every
    /// hard resource whose usage exceeds its limit.
    pub fn aggregate(
        &self,
        quota: &ResourceQuota,
        pods: &[PodObservation],
        pvcs: &[PvcObservation],
    ) -> ResourceQuotaStatus {
        let used = aggregate_usage(pods, pvcs);
        let violations = detect_violations(&quota.spec.hard, &used);
        if !violations.is_empty() {
            tracing::warn!(
                namespace = quota.metadata.namespace.as_deref().unwrap_or_default(),
                workspace = %quota.metadata.workspace,
                count = violations.len(),
                "quota violations detected"
            );
        }
        ResourceQuotaStatus {
            hard: quota.spec.hard.clone(),
            used,
            violations,
            last_updated: Some(Timestamp::now()),
            ..Default::default()
        }
    }
}

/// Sum container requests of every quota-consuming pod and the storage of
/// every bound PVC. Pods in Succeeded or Failed phases do not count.
pub fn aggregate_usage(pods: &[PodObservation], pvcs: &[PvcObservation]) -> ResourceList {
    let mut used = ResourceList::new();

    let mut add = |name: &str, amount: Quantity| {
        let entry = used.entry(name.to_string()).or_insert_with(Quantity::zero);
        *entry = entry.saturating_add(&amount);
    };

    for pod in pods {
        if !pod.consumes_quota() {
            continue;
        }
        add(resource_names::PODS, Quantity::from_units(1));
        for container in &pod.containers {
            if let Some(cpu) = container.requests.get(resource_names::REQUESTS_CPU)
                .or_else(|| container.requests.get("cpu"))
            {
                add(resource_names::REQUESTS_CPU, *cpu);
            }
            if let Some(memory) = container.requests.get(resource_names::REQUESTS_MEMORY)
                .or_else(|| container.requests.get("memory"))
            {
                add(resource_names::REQUESTS_MEMORY, *memory);
            }
        }
    }

    for pvc in pvcs {
        if pvc.phase != PvcPhase::Bound {
            continue;
        }
        add(resource_names::PERSISTENT_VOLUME_CLAIMS, Quantity::from_units(1));
        if let Some(storage) = &pvc.storage_request {
            add(resource_names::REQUESTS_STORAGE, *storage);
        }
    }

    used
}

/// One violation string per hard resource whose usage exceeds the limit.
pub fn detect_violations(hard: &ResourceList, used: &ResourceList) -> Vec<String> {
    let mut violations = Vec::new();
    for (resource, limit) in hard {
        if let Some(usage) = used.get(resource) {
            if usage > limit {
                violations.push(format!("{resource}: used {usage} exceeds limit {limit}"));
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_api::meta::ObjectMeta;
    use weft_api::quota::{ContainerResources, PodPhase, ResourceQuotaSpec};

    fn pod(name: &str, phase: PodPhase, cpu: &str, memory: &str) -> PodObservation {
        PodObservation {
            metadata: ObjectMeta::namespaced("root:org", "default", name),
            phase,
            containers: vec![ContainerResources {
                name: "main".into(),
                requests: [
                    (
                        resource_names::REQUESTS_CPU.to_string(),
                        Quantity::parse(cpu).unwrap(),
                    ),
                    (
                        resource_names::REQUESTS_MEMORY.to_string(),
                        Quantity::parse(memory).unwrap(),
                    ),
                ]
                .into_iter()
                .collect(),
            }],
        }
    }

    fn pvc(name: &str, phase: PvcPhase, storage: &str) -> PvcObservation {
        PvcObservation {
            metadata: ObjectMeta::namespaced("root:org", "default", name),
            phase,
            storage_request: Some(Quantity::parse(storage).unwrap()),
        }
    }

    #[test]
    fn usage_counts_running_and_pending_pods_only() {
        let pods = vec![
            pod("running", PodPhase::Running, "2", "1Gi"),
            pod("pending", PodPhase::Pending, "1", "512Mi"),
            pod("done", PodPhase::Succeeded, "4", "8Gi"),
            pod("crashed", PodPhase::Failed, "4", "8Gi"),
        ];
        let used = aggregate_usage(&pods, &[]);

        assert_eq!(used.get(resource_names::PODS).unwrap(), &Quantity::from_units(2));
        assert_eq!(
            used.get(resource_names::REQUESTS_CPU).unwrap(),
            &Quantity::from_units(3)
        );
        assert_eq!(
            used.get(resource_names::REQUESTS_MEMORY).unwrap(),
            &Quantity::parse("1536Mi").unwrap()
        );
    }

    #[test]
    fn usage_counts_bound_pvcs_only() {
        let pvcs = vec![
            pvc("data-0", PvcPhase::Bound, "10Gi"),
            pvc("data-1", PvcPhase::Bound, "10Gi"),
            pvc("stuck", PvcPhase::Pending, "100Gi"),
        ];
        let used = aggregate_usage(&[], &pvcs);

        assert_eq!(
            used.get(resource_names::PERSISTENT_VOLUME_CLAIMS).unwrap(),
            &Quantity::from_units(2)
        );
        assert_eq!(
            used.get(resource_names::REQUESTS_STORAGE).unwrap(),
            &Quantity::parse("20Gi").unwrap()
        );
    }

    #[test]
    fn violation_string_format() {
        let hard: ResourceList = [(
            resource_names::REQUESTS_CPU.to_string(),
            Quantity::from_units(5),
        )]
        .into_iter()
        .collect();
        let used: ResourceList = [(
            resource_names::REQUESTS_CPU.to_string(),
            Quantity::from_units(8),
        )]
        .into_iter()
        .collect();

        let violations = detect_violations(&hard, &used);
        assert_eq!(violations, vec!["requests.cpu: used 8 exceeds limit 5"]);
    }

    #[test]
    fn usage_at_the_limit_is_not_a_violation() {
        let hard: ResourceList = [(
            resource_names::PODS.to_string(),
            Quantity::from_units(3),
        )]
        .into_iter()
        .collect();
        let used: ResourceList = [(
            resource_names::PODS.to_string(),
            Quantity::from_units(3),
        )]
        .into_iter()
        .collect();
        assert!(detect_violations(&hard, &used).is_empty());
    }

    #[test]
    fn aggregate_fills_status() {
        let quota = ResourceQuota {
            metadata: ObjectMeta::namespaced("root:org", "default", "compute"),
            spec: ResourceQuotaSpec {
                hard: [(
                    resource_names::REQUESTS_CPU.to_string(),
                    Quantity::from_units(5),
                )]
                .into_iter()
                .collect(),
            },
            status: ResourceQuotaStatus::default(),
        };
        let pods = vec![
            pod("a", PodPhase::Running, "4", "1Gi"),
            pod("b", PodPhase::Running, "4", "1Gi"),
        ];

        let status = QuotaAggregator::new().aggregate(&quota, &pods, &[]);
        assert_eq!(status.hard, quota.spec.hard);
        assert_eq!(
            status.used.get(resource_names::REQUESTS_CPU).unwrap(),
            &Quantity::from_units(8)
        );
        assert_eq!(
            status.violations,
            vec!["requests.cpu: used 8 exceeds limit 5"]
        );
        assert!(status.last_updated.is_some());
    }
}
