//! Sync between local groups and the remote favorite set.
//!
//! `GroupSyncEngine` owns the group store and a `RemoteFavoriteClient`.
//! Snapshots are all-or-nothing: a listing failure leaves the target group
//! untouched. Load and unload are best-effort and report per-item outcomes.
//! `switch_group` composes the three in an order that never loses the live
//! favorites.

mod engine;
mod report;

pub use engine::{GroupSyncEngine, SyncOptions, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_PAGE_SIZE};
pub use report::{
    BatchAction, BatchReport, ItemFailure, SnapshotReport, SwitchOutcome, SwitchPhase, SwitchReport,
};
