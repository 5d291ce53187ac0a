//! Group synchronization between the local `GroupStore` and remote favorites.
//!
//! None of these operations are transactional; the service has no
//! multi-item primitive. Batches are best-effort: each item succeeds or
//! fails on its own and the report says which. `switch_group` is ordered so
//! that the only phase allowed to abort (the backup snapshot) runs before
//! anything is mutated remotely.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{ApiError, FavoriteOutcome, RemoteFavoriteClient};
use crate::auth::SessionToken;
use crate::error::{Error, Result};
use crate::groups::GroupStore;
use crate::models::{FavoriteRecord, Group, GroupSummary};

use super::report::{
    BatchAction, BatchReport, ItemFailure, SnapshotReport, SwitchOutcome, SwitchPhase, SwitchReport,
};

// ============================================================================
// Constants
// ============================================================================

/// Page size for favorites listing; the service caps pages at 100.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Parallel add/remove calls within one batch.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Upper bound on pages fetched for one snapshot. A service that keeps
/// returning full pages past this is treated as misbehaving.
const MAX_SNAPSHOT_PAGES: usize = 200;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub page_size: usize,
    pub max_concurrent_requests: usize,
    pub include_offline: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            include_offline: true,
        }
    }
}

/// Orchestrates save/load/unload/switch between local groups and the
/// remote favorite set.
pub struct GroupSyncEngine {
    client: RemoteFavoriteClient,
    store: Mutex<GroupStore>,
    options: SyncOptions,
}

impl GroupSyncEngine {
    pub fn new(client: RemoteFavoriteClient, store: GroupStore, options: SyncOptions) -> Self {
        Self {
            client,
            store: Mutex::new(store),
            options,
        }
    }

    pub fn client(&self) -> &RemoteFavoriteClient {
        &self.client
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<SessionToken> {
        self.client.session().login(username, password).await
    }

    // ===== Local groups =====

    pub async fn list_groups(&self) -> Vec<GroupSummary> {
        self.store.lock().await.list()
    }

    pub async fn group(&self, name: &str) -> Option<Group> {
        self.store.lock().await.get(name).cloned()
    }

    pub async fn create_group(&self, name: &str) -> Result<Group> {
        self.store.lock().await.create(name)
    }

    pub async fn delete_group(&self, name: &str) -> Result<bool> {
        self.store.lock().await.delete(name)
    }

    /// Delete every group and the group file.
    pub async fn clear_all(&self) -> Result<()> {
        self.store.lock().await.clear_all()
    }

    async fn require_group(&self, name: &str) -> Result<()> {
        if self.store.lock().await.contains(name) {
            Ok(())
        } else {
            Err(Error::GroupNotFound(name.to_string()))
        }
    }

    // ===== Snapshot =====

    /// Fetch the complete remote favorites list, page by page, in order.
    pub async fn fetch_all_favorites(&self) -> Result<(Vec<FavoriteRecord>, usize)> {
        let page_size = self.options.page_size.max(1);
        let mut records = Vec::new();
        let mut pages = 0;

        loop {
            if pages == MAX_SNAPSHOT_PAGES {
                return Err(ApiError::InvalidResponse(format!(
                    "favorites listing did not end after {} pages",
                    MAX_SNAPSHOT_PAGES
                ))
                .into());
            }

            let page = self
                .client
                .list_favorites(records.len(), page_size, self.options.include_offline)
                .await?;
            pages += 1;
            let last = page.len() < page_size;
            records.extend(page);
            if last {
                break;
            }
        }

        debug!(count = records.len(), pages, "Fetched all favorites");
        Ok((records, pages))
    }

    /// Overwrite `name` with the current remote favorites.
    ///
    /// A failed listing aborts before the group is touched; a partial
    /// listing is never stored.
    pub async fn save_snapshot(&self, name: &str) -> Result<SnapshotReport> {
        self.require_group(name).await?;

        let (records, pages) = self.fetch_all_favorites().await?;
        let count = records.len();
        self.store.lock().await.replace_records(name, records)?;

        info!(group = %name, count, "Saved favorites snapshot");
        Ok(SnapshotReport {
            group: name.to_string(),
            count,
            pages,
        })
    }

    // ===== Batches =====

    /// Unfavorite every record of `name`, best-effort.
    ///
    /// Entry ids are looked up again from a fresh listing first, since the
    /// service issues a new one each time an item is favorited. A failed
    /// listing aborts before anything is removed. Records whose item is not
    /// favorited keep their stored id and are reported as failures.
    pub async fn unload_group(&self, name: &str) -> Result<BatchReport> {
        let records = self.store.lock().await.records(name)?;
        let records = self.resolve_favorite_ids(records).await?;
        Ok(self.run_batch(name, BatchAction::Unload, records).await)
    }

    async fn resolve_favorite_ids(&self, mut records: Vec<FavoriteRecord>) -> Result<Vec<FavoriteRecord>> {
        if records.is_empty() {
            return Ok(records);
        }
        let (live, _) = self.fetch_all_favorites().await?;
        let current: HashMap<String, String> = live
            .into_iter()
            .map(|r| (r.item_id, r.favorite_id))
            .collect();

        for record in &mut records {
            if let Some(favorite_id) = current.get(&record.item_id) {
                if *favorite_id != record.favorite_id {
                    debug!(item_id = %record.item_id, "Favorite entry id changed since the group was saved");
                    record.favorite_id = favorite_id.clone();
                }
            }
        }
        Ok(records)
    }

    /// Favorite every record of `name`, best-effort.
    pub async fn load_group(&self, name: &str) -> Result<BatchReport> {
        let records = self.store.lock().await.records(name)?;
        Ok(self.run_batch(name, BatchAction::Load, records).await)
    }

    async fn apply(&self, action: BatchAction, record: &FavoriteRecord) -> Result<FavoriteOutcome> {
        match action {
            BatchAction::Load => {
                self.client
                    .add_favorite_detailed(record.kind, &record.item_id, &record.tags)
                    .await
            }
            BatchAction::Unload => self.client.remove_favorite_detailed(&record.favorite_id).await,
        }
    }

    async fn run_batch(&self, group: &str, action: BatchAction, records: Vec<FavoriteRecord>) -> BatchReport {
        info!(group, action = action.as_str(), count = records.len(), "Starting batch");

        // The stream is the only consumer of results, so no shared state
        // is needed across in-flight calls.
        let mut outcomes: Vec<(usize, String, Result<FavoriteOutcome>)> = stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| async move {
                let outcome = self.apply(action, &record).await;
                (index, record.item_id, outcome)
            })
            .buffer_unordered(self.options.max_concurrent_requests.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut report = BatchReport::new(group, action);
        report.attempted = outcomes.len();
        for (_, item_id, outcome) in outcomes {
            match outcome {
                Ok(FavoriteOutcome::Applied) => report.succeeded.push(item_id),
                Ok(FavoriteOutcome::AlreadySatisfied) => {
                    debug!(group, item_id = %item_id, action = action.as_str(), "Already in requested state");
                    report.already_satisfied.push(item_id);
                }
                Ok(FavoriteOutcome::Rejected { status, message }) => {
                    warn!(group, item_id = %item_id, action = action.as_str(), status, "Item rejected");
                    report.failed.push(ItemFailure {
                        item_id,
                        reason: format!("Status {}: {}", status, message),
                    });
                }
                Err(e) => {
                    warn!(group, item_id = %item_id, action = action.as_str(), error = %e, "Item failed");
                    report.failed.push(ItemFailure {
                        item_id,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            group,
            action = action.as_str(),
            succeeded = report.succeeded.len(),
            already = report.already_satisfied.len(),
            failed = report.failed.len(),
            "Batch complete"
        );
        report
    }

    // ===== Switch =====

    /// Replace the live favorites with `target`, saving them to `backup` first.
    ///
    /// 1. snapshot live favorites into `backup` (failure aborts, nothing mutated)
    /// 2. unload `backup` from the live set, best-effort
    /// 3. load `target` into the live set, best-effort
    pub async fn switch_group(&self, target: &str, backup: &str) -> Result<SwitchReport> {
        if target == backup {
            return Err(Error::SameGroup(target.to_string()));
        }
        {
            let store = self.store.lock().await;
            for name in [backup, target] {
                if !store.contains(name) {
                    return Err(Error::GroupNotFound(name.to_string()));
                }
            }
        }

        info!(phase = ?SwitchPhase::BackingUp, target, backup, "Switching groups");
        let snapshot = match self.save_snapshot(backup).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(phase = ?SwitchPhase::BackingUp, backup, error = %e, "Switch aborted, favorites untouched");
                return Err(Error::SwitchAborted {
                    backup: backup.to_string(),
                    source: Box::new(e),
                });
            }
        };

        info!(phase = ?SwitchPhase::Unloading, backup, count = snapshot.count, "Switching groups");
        // The snapshot just taken carries current entry ids
        let records = self.store.lock().await.records(backup)?;
        let unload = self.run_batch(backup, BatchAction::Unload, records).await;

        info!(phase = ?SwitchPhase::Loading, target, "Switching groups");
        let load = self.load_group(target).await?;

        let outcome = if unload.is_clean() && load.is_clean() {
            SwitchOutcome::Done
        } else {
            SwitchOutcome::DoneWithWarnings
        };
        info!(target, backup, ?outcome, "Switch complete");

        Ok(SwitchReport {
            target: target.to_string(),
            backup: backup.to_string(),
            snapshot,
            unload,
            load,
            outcome,
        })
    }
}
