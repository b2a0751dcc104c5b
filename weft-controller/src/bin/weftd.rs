//! weftd - the Weft control plane daemon
//!
//! Wires the in-memory store, work queues, event pumps and controllers
//! together and runs until interrupted. The store backing and the syncer
//! transport are the two seams a production deployment replaces.

use clap::Parser;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use weft_api::distribution::WorkloadDistribution;
use weft_api::meta::WeftObject;
use weft_api::placement::ClusterWorkloadPlacement;
use weft_api::quota::{PodObservation, PvcObservation, ResourceQuota};
use weft_api::store::ObjectStore;
use weft_api::synctarget::SyncTarget;
use weft_controller::handlers::{
    distribution_keys_for_workspace, own_key, placement_keys_for_workspace,
    quota_keys_for_namespace, spawn_event_pump,
};
use weft_controller::reconcilers::{
    DistributionReconciler, PlacementReconciler, QuotaReconciler, SyncTargetReconciler,
};
use weft_controller::{Controller, LoggingDispatcher, MemoryStore};
use weft_queue::{by_namespace, by_resource_type, by_workspace, by_workspace_and_namespace};
use weft_queue::{index_names, IndexedQueue, PriorityQueue, WorkQueue};
use weft_shared::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "weftd", about = "Weft multi-cluster workload control plane")]
struct Args {
    /// Path to a TOML engine configuration file
    #[arg(long)]
    config: Option<String>,
}

fn indexed_queue(name: &str, kind: &'static str) -> IndexedQueue {
    let queue = IndexedQueue::new(name);
    let indexers = [
        (index_names::BY_WORKSPACE, by_workspace()),
        (index_names::BY_NAMESPACE, by_namespace()),
        (index_names::BY_RESOURCE_TYPE, by_resource_type(kind)),
        (
            index_names::BY_WORKSPACE_AND_NAMESPACE,
            by_workspace_and_namespace(),
        ),
    ];
    for (index_name, func) in indexers {
        queue
            .add_indexer(index_name, func)
            .expect("indexers registered once at startup");
    }
    queue
}

/// Periodically re-enqueue every object of one kind, with jitter so the
/// controllers do not resync in lockstep.
fn spawn_resync<T, Q>(
    store: Arc<MemoryStore<T>>,
    queue: Q,
    interval: Duration,
    shutdown: CancellationToken,
) where
    T: WeftObject,
    Q: WorkQueue + Clone,
{
    if interval.is_zero() {
        return;
    }
    tokio::spawn(async move {
        loop {
            let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=5_000));
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval + jitter) => {}
            }
            if let Ok(objects) = store.list(None).await {
                for object in objects {
                    if let Ok(key) = object.key() {
                        queue.add(&key.to_string());
                    }
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    tracing::info!(workers = config.worker.count, "starting weftd");

    // Stores
    let targets = MemoryStore::<SyncTarget>::new();
    let placements = MemoryStore::<ClusterWorkloadPlacement>::new();
    let distributions = MemoryStore::<WorkloadDistribution>::new();
    let quotas = MemoryStore::<ResourceQuota>::new();
    let pods = MemoryStore::<PodObservation>::new();
    let pvcs = MemoryStore::<PvcObservation>::new();

    // Queues
    let target_queue = indexed_queue("synctargets", SyncTarget::KIND);
    let placement_queue = indexed_queue("placements", ClusterWorkloadPlacement::KIND);
    let distribution_queue = PriorityQueue::new();
    let quota_queue = indexed_queue("quotas", ResourceQuota::KIND);

    let shutdown = CancellationToken::new();

    // Event wiring: every object re-reconciles itself, sync-target changes
    // fan out to the placements in their workspace, placement changes fan
    // out to distributions, and inventory changes re-aggregate quotas.
    let mut pumps = Vec::new();
    pumps.push(spawn_event_pump(
        targets.watch(),
        target_queue.clone(),
        shutdown.clone(),
        |event| async move { own_key(&event) },
    ));
    {
        let placements = placements.clone();
        pumps.push(spawn_event_pump(
            targets.watch(),
            placement_queue.clone(),
            shutdown.clone(),
            move |event| {
                let placements = placements.clone();
                async move { placement_keys_for_workspace(&placements, event.key.workspace()).await }
            },
        ));
    }
    pumps.push(spawn_event_pump(
        placements.watch(),
        placement_queue.clone(),
        shutdown.clone(),
        |event| async move { own_key(&event) },
    ));
    {
        let distributions = distributions.clone();
        pumps.push(spawn_event_pump(
            placements.watch(),
            distribution_queue.clone(),
            shutdown.clone(),
            move |event| {
                let distributions = distributions.clone();
                async move {
                    distribution_keys_for_workspace(&distributions, event.key.workspace()).await
                }
            },
        ));
    }
    pumps.push(spawn_event_pump(
        distributions.watch(),
        distribution_queue.clone(),
        shutdown.clone(),
        |event| async move { own_key(&event) },
    ));
    pumps.push(spawn_event_pump(
        quotas.watch(),
        quota_queue.clone(),
        shutdown.clone(),
        |event| async move { own_key(&event) },
    ));
    for inventory_events in [pods.watch(), pvcs.watch()] {
        let quotas = quotas.clone();
        pumps.push(spawn_event_pump(
            inventory_events,
            quota_queue.clone(),
            shutdown.clone(),
            move |event| {
                let quotas = quotas.clone();
                async move {
                    let Some(namespace) = event.key.namespace().map(String::from) else {
                        return Vec::new();
                    };
                    quota_keys_for_namespace(&quotas, event.key.workspace(), &namespace).await
                }
            },
        ));
    }

    // Periodic resync recovers from missed events.
    let resync = Duration::from_secs(config.resync.interval_secs);
    spawn_resync(targets.clone(), target_queue.clone(), resync, shutdown.clone());
    spawn_resync(placements.clone(), placement_queue.clone(), resync, shutdown.clone());
    spawn_resync(distributions.clone(), distribution_queue.clone(), resync, shutdown.clone());
    spawn_resync(quotas.clone(), quota_queue.clone(), resync, shutdown.clone());

    // Controllers
    let dispatcher = Arc::new(LoggingDispatcher);
    let workers = config.worker.count;
    let max_retries = config.worker.max_retries;

    let controllers = vec![
        tokio::spawn(
            Controller::new(
                "synctarget",
                target_queue,
                Arc::new(SyncTargetReconciler::new(targets.clone())),
                workers,
                max_retries,
            )
            .run(shutdown.clone()),
        ),
        tokio::spawn(
            Controller::new(
                "placement",
                placement_queue,
                Arc::new(PlacementReconciler::new(placements.clone(), targets.clone())),
                workers,
                max_retries,
            )
            .run(shutdown.clone()),
        ),
        tokio::spawn(
            Controller::new(
                "distribution",
                distribution_queue,
                Arc::new(DistributionReconciler::new(
                    distributions.clone(),
                    placements.clone(),
                    dispatcher,
                )),
                workers,
                max_retries,
            )
            .run(shutdown.clone()),
        ),
        tokio::spawn(
            Controller::new(
                "quota",
                quota_queue,
                Arc::new(QuotaReconciler::new(quotas.clone(), pods.clone(), pvcs.clone())),
                workers,
                max_retries,
            )
            .run(shutdown.clone()),
        ),
    ];

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received; draining workers");
    shutdown.cancel();
    for controller in controllers {
        let _ = controller.await;
    }
    for pump in pumps {
        let _ = pump.await;
    }
    tracing::info!("weftd stopped");
    Ok(())
}
