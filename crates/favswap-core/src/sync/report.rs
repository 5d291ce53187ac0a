//! Structured results of sync operations.
//!
//! The engine never prints; callers render these.

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchAction {
    /// Favorite every record of a group.
    Load,
    /// Unfavorite every record of a group.
    Unload,
}

impl BatchAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchAction::Load => "load",
            BatchAction::Unload => "unload",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub reason: String,
}

/// Per-item outcome of a best-effort batch, in group order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub group: String,
    pub action: BatchAction,
    pub attempted: usize,
    pub succeeded: Vec<String>,
    /// Items that were already in the requested state.
    pub already_satisfied: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn new(group: &str, action: BatchAction) -> Self {
        Self {
            group: group.to_string(),
            action,
            attempted: 0,
            succeeded: Vec::new(),
            already_satisfied: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn failed_ids(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.item_id.clone()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// `Err(PartialBatchFailure)` when any item failed.
    pub fn into_result(self) -> Result<Self> {
        if self.is_clean() {
            return Ok(self);
        }
        Err(Error::PartialBatchFailure {
            failed_ids: self.failed_ids(),
            group: self.group,
            action: self.action.as_str(),
            attempted: self.attempted,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotReport {
    pub group: String,
    pub count: usize,
    pub pages: usize,
}

/// Steps of `switch_group`, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwitchPhase {
    BackingUp,
    Unloading,
    Loading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SwitchOutcome {
    Done,
    /// All phases ran, but some items failed to unload or load.
    DoneWithWarnings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchReport {
    pub target: String,
    pub backup: String,
    pub snapshot: SnapshotReport,
    pub unload: BatchReport,
    pub load: BatchReport,
    pub outcome: SwitchOutcome,
}

impl SwitchReport {
    /// Every item failure from the unload and load phases.
    pub fn warnings(&self) -> impl Iterator<Item = (BatchAction, &ItemFailure)> {
        self.unload
            .failed
            .iter()
            .map(|f| (BatchAction::Unload, f))
            .chain(self.load.failed.iter().map(|f| (BatchAction::Load, f)))
    }
}
