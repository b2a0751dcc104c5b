//! Reconcilers
//!
//! One reconciler per entity kind. Each follows the same shape: re-read the
//! object by key (not-found is success), compute the desired status, and
//! write it back through the store's compare-and-swap. Conflicts bubble up
//! as retryable errors; terminal problems land in status and are not
//! retried until the spec generation moves.

mod distribution;
mod placement;
mod quota;
mod synctarget;

pub use distribution::DistributionReconciler;
pub use placement::PlacementReconciler;
pub use quota::QuotaReconciler;
pub use synctarget::SyncTargetReconciler;
