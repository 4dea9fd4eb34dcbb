//! Startup crash recovery.
//!
//! A record stuck in Running means a controller died mid-cycle. The sweep
//! re-queues such records when their workspace survived, after committing
//! whatever uncommitted work the crash left behind, and fails them when the
//! workspace is gone. Every transition goes through the store's conditional
//! status update, so a sweep racing a live controller (or a second sweep)
//! never clobbers real state. Cycle counts are never reset.

use std::sync::Arc;

use crate::domain::RunStatus;
use crate::error::Result;
use crate::store::StateStore;
use crate::vcs::Vcs;

/// What one sweep did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryStats {
    /// Records moved Running -> Pending
    pub recovered: usize,
    /// Records moved Running -> Failed because the workspace is gone
    pub failed_missing: usize,
    /// Records left alone because their status changed under us
    pub skipped: usize,
    /// Salvage commits made in surviving workspaces
    pub auto_commits: usize,
}

/// Scans for orphaned Running records and re-queues or fails them
pub struct RecoverySweep<S, G> {
    store: Arc<S>,
    vcs: Arc<G>,
}

impl<S: StateStore, G: Vcs> RecoverySweep<S, G> {
    pub fn new(store: Arc<S>, vcs: Arc<G>) -> Self {
        Self { store, vcs }
    }

    pub async fn run(&self) -> Result<RecoveryStats> {
        let mut stats = RecoveryStats::default();
        let orphans = self.store.list_by_status(RunStatus::Running)?;

        for record in orphans {
            if !self.vcs.workspace_exists(&record.workspace) {
                log::warn!(
                    "workspace {} for run {} is gone, failing it",
                    record.workspace.display(),
                    record.id
                );
                if self
                    .store
                    .compare_and_set_status(&record.id, RunStatus::Running, RunStatus::Failed)?
                {
                    stats.failed_missing += 1;
                } else {
                    stats.skipped += 1;
                }
                continue;
            }

            // Salvage uncommitted work before the record becomes claimable
            match self
                .vcs
                .commit(&record.workspace, "cyclr: recovery checkpoint")
                .await
            {
                Ok(Some(id)) => {
                    log::info!("salvaged uncommitted work for run {} as {}", record.id, id);
                    stats.auto_commits += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("salvage commit for run {} failed: {}", record.id, e);
                }
            }

            // The note must land before the record becomes claimable; a
            // Running record cannot be claimed, so this cannot be raced.
            if let Err(e) = self.store.append_progress(
                &record.id,
                "recovered after crash; re-queued from last checkpoint",
            ) {
                log::warn!("could not annotate run {}: {}", record.id, e);
            }

            if self
                .store
                .compare_and_set_status(&record.id, RunStatus::Running, RunStatus::Pending)?
            {
                log::info!(
                    "recovered run {} at cycle {}",
                    record.id,
                    record.cycle_count
                );
                stats.recovered += 1;
            } else {
                stats.skipped += 1;
            }
        }

        Ok(stats)
    }
}
