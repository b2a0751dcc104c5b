//! Weft Scheduler - Placement, distribution and rollout sequencing
//!
//! This crate is the decision core of the control plane:
//! - [`evaluator`] filters and ranks sync targets against a placement policy
//! - [`distribution`] turns a distribution spec and a location list into a
//!   per-location replica plan with a deterministic rollout order
//! - [`rollout`] drives the plan through the RollingUpdate / Recreate /
//!   BlueGreen state machines, emitting intents for the syncer

pub mod distribution;
pub mod evaluator;
pub mod rollout;

pub use distribution::ReplicaPlan;
pub use evaluator::{PlacementEvaluator, PlacementResult, TargetEvaluation};
pub use rollout::{RolloutError, RolloutIntent, RolloutSequencer, SequencerInput, SequencerOutcome};
