//! Rollout intent dispatch
//!
//! The engine computes what should happen to each location; a separate
//! syncer makes it happen on the physical clusters. This is the seam between
//! the two: the distribution reconciler hands every tick's intents to an
//! `IntentDispatcher`.

use async_trait::async_trait;
use parking_lot::Mutex;
use weft_scheduler::rollout::RolloutIntent;
use weft_shared::{ClusterKey, Result};

/// Receives the per-tick intents for one distribution.
#[async_trait]
pub trait IntentDispatcher: Send + Sync + 'static {
    async fn dispatch(&self, distribution: &ClusterKey, intents: &[RolloutIntent]) -> Result<()>;
}

/// Default dispatcher: logs intents at debug level. Stands in until a real
/// syncer transport is wired up.
#[derive(Debug, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl IntentDispatcher for LoggingDispatcher {
    async fn dispatch(&self, distribution: &ClusterKey, intents: &[RolloutIntent]) -> Result<()> {
        for intent in intents {
            match intent {
                RolloutIntent::Scale {
                    location,
                    updated_replicas,
                    legacy_replicas,
                    generation,
                } => {
                    tracing::debug!(
                        distribution = %distribution,
                        location = %location,
                        updated = updated_replicas,
                        legacy = legacy_replicas,
                        generation,
                        "scale intent"
                    );
                }
                RolloutIntent::SwitchService { activate, retire } => {
                    tracing::debug!(
                        distribution = %distribution,
                        activate = %activate,
                        retire = %retire,
                        "service switch intent"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Test dispatcher that records everything it receives.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    recorded: Mutex<Vec<(ClusterKey, Vec<RolloutIntent>)>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<(ClusterKey, Vec<RolloutIntent>)> {
        self.recorded.lock().clone()
    }

    pub fn last_intents(&self) -> Vec<RolloutIntent> {
        self.recorded
            .lock()
            .last()
            .map(|(_, intents)| intents.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IntentDispatcher for RecordingDispatcher {
    async fn dispatch(&self, distribution: &ClusterKey, intents: &[RolloutIntent]) -> Result<()> {
        self.recorded
            .lock()
            .push((distribution.clone(), intents.to_vec()));
        Ok(())
    }
}
