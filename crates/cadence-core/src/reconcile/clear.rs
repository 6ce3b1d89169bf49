//! Bulk "clear history".
//!
//! The clear runs as an explicit state machine:
//!
//! ```text
//! Idle -> OptimisticApplied -> RemoteSyncing -> Settled -> Idle
//! ```
//!
//! [`Controller::begin_clear`] empties the local cache in one write before
//! any remote call is made, and hands back a [`ClearRun`]. Only a run can
//! start the remote phase ([`ClearRun::sync_remote`]), and only the synced
//! result can settle ([`SyncedClear::settle`]), so the ordering is fixed by
//! the types. Dropping a run at any point returns the controller to `Idle`.
//!
//! Remote deletes are independent: one failing does not stop the others,
//! and the outcome reports how many succeeded and failed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use super::{Controller, Notification, ReconcileError, Snapshot};
use crate::model::{CompletionEvent, EventId};

/// Phase of the bulk-clear state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPhase {
    #[default]
    Idle,
    /// Local cache emptied; remote not touched yet.
    OptimisticApplied,
    /// Remote deletes in progress.
    RemoteSyncing,
    /// Remote phase done; re-merging.
    Settled,
}

/// Returns the controller to `Idle` when a run ends, however it ends.
struct PhaseGuard<'a> {
    controller: &'a Controller,
}

impl PhaseGuard<'_> {
    fn advance(&self, phase: ClearPhase) {
        info!(?phase, "history clear phase");
        self.controller.set_phase(phase);
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.controller.set_phase(ClearPhase::Idle);
    }
}

/// A clear whose local part has been applied.
pub struct ClearRun<'a> {
    guard: PhaseGuard<'a>,
    optimistic: Vec<CompletionEvent>,
}

/// A clear whose remote deletes have all been attempted.
pub struct SyncedClear<'a> {
    guard: PhaseGuard<'a>,
    removed: usize,
    failed: usize,
    fetch_failed: bool,
}

/// Final tally of a bulk clear.
#[derive(Debug, Clone, Serialize)]
pub struct ClearOutcome {
    /// Server activities deleted.
    pub removed: usize,
    /// Server activities whose delete failed.
    pub failed: usize,
    /// The server listing could not be fetched, so no delete was attempted.
    pub fetch_failed: bool,
    /// Re-merged view after the remote phase.
    pub snapshot: Snapshot,
}

impl ClearOutcome {
    /// One-line tally, e.g. `removed: 2, failed: 1`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!("removed: {}, failed: {}", self.removed, self.failed)
    }
}

impl Controller {
    /// Empty the local cache and start a bulk clear.
    ///
    /// `previous` is the timeline currently on display; the run's
    /// [`ClearRun::optimistic_timeline`] is its server-origin part. If the
    /// cache write fails nothing changes and the phase stays `Idle`.
    pub fn begin_clear(&self, previous: &[CompletionEvent]) -> Result<ClearRun<'_>, ReconcileError> {
        {
            let mut phase = self.lock_phase();
            if *phase != ClearPhase::Idle {
                return Err(ReconcileError::ClearInProgress);
            }
            if let Err(err) = self.cache.write_activities(&[]) {
                error!(error = %err, "could not clear local history");
                self.notify(Notification::error("Failed to clear history"));
                return Err(err.into());
            }
            *phase = ClearPhase::OptimisticApplied;
        }
        info!(phase = ?ClearPhase::OptimisticApplied, "history clear phase");

        let optimistic = previous
            .iter()
            .filter(|event| !event.is_local())
            .cloned()
            .collect();
        self.notify(Notification::success(
            "Cleared local history immediately. Server cleanup running in background.",
        ));

        Ok(ClearRun {
            guard: PhaseGuard { controller: self },
            optimistic,
        })
    }

    /// Run every phase of a bulk clear.
    pub fn clear_history(
        &self,
        previous: &[CompletionEvent],
        now: DateTime<Utc>,
    ) -> Result<ClearOutcome, ReconcileError> {
        Ok(self.begin_clear(previous)?.sync_remote().settle(now))
    }
}

impl<'a> ClearRun<'a> {
    /// Timeline to show while the remote phase runs.
    #[must_use]
    pub fn optimistic_timeline(&self) -> &[CompletionEvent] {
        &self.optimistic
    }

    /// Delete every server activity, one call each.
    #[must_use]
    pub fn sync_remote(self) -> SyncedClear<'a> {
        let guard = self.guard;
        guard.advance(ClearPhase::RemoteSyncing);
        let remote = guard.controller.remote();

        let mut removed = 0;
        let mut failed = 0;
        let fetch_failed = match remote.fetch_activities() {
            Ok(records) => {
                for id in records.into_iter().filter_map(|record| record.id) {
                    let id = EventId::new(id);
                    match remote.delete_activity(&id) {
                        Ok(()) => removed += 1,
                        Err(err) => {
                            warn!(%id, error = %err, "failed to delete server activity");
                            failed += 1;
                        }
                    }
                }
                false
            }
            Err(err) => {
                warn!(error = %err, "could not fetch server activities for cleanup");
                true
            }
        };

        SyncedClear {
            guard,
            removed,
            failed,
            fetch_failed,
        }
    }
}

impl SyncedClear<'_> {
    /// Re-merge against the cache as it is now and report the tally.
    #[must_use]
    pub fn settle(self, now: DateTime<Utc>) -> ClearOutcome {
        self.guard.advance(ClearPhase::Settled);
        let controller = self.guard.controller;
        let snapshot = controller.refresh(now);

        if self.fetch_failed {
            controller.notify(Notification::warning(
                "Could not reach the server; server history was not cleared.",
            ));
        }
        controller.notify(Notification::success(format!(
            "Server removed: {}. Failed: {}.",
            self.removed, self.failed
        )));
        info!(
            removed = self.removed,
            failed = self.failed,
            remaining = snapshot.timeline.len(),
            "history clear settled"
        );

        ClearOutcome {
            removed: self.removed,
            failed: self.failed,
            fetch_failed: self.fetch_failed,
            snapshot,
        }
    }
}
