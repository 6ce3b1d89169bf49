//! Reconciliation between the local cache and the remote store.
//!
//! The [`Controller`] owns the cache service, the remote collaborator and a
//! notification sink. Every view it produces is a fresh merge of server
//! events with whatever the cache holds *at that moment*; nothing is kept
//! between calls except the bulk-clear phase.
//!
//! # Operations
//!
//! - [`Controller::refresh`] — merged timeline, streak and summary.
//! - [`Controller::begin_clear`] / [`Controller::clear_history`] — bulk
//!   clear, see [`clear`].
//! - [`Controller::undo_today`] — remove today's completion of one item.
//! - [`Controller::clear_item_history`] / [`Controller::delete_item`] —
//!   per-item management, see [`manage`].
//! - [`Controller::mark_done`] — record a completion, offline fallback.
//! - [`Controller::complete_goal`] — flag a goal completed.
//! - [`Controller::sync_pending`] — upload local-only completions.
//!
//! Remote failures never corrupt the cache: transient fetch failures degrade
//! to "no server data", and per-item failures are tallied.

pub mod clear;
pub mod manage;
pub mod notify;

pub use clear::{ClearOutcome, ClearPhase, ClearRun, SyncedClear};
pub use manage::{ItemCleanup, ManageOutcome};
pub use notify::{LogNotifier, Notification, Notifier, NotifyLevel, RecordingNotifier};

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheError, CacheService};
use crate::consistency::{
    ConsistencyFilter, ConsistencyRecord, TimelineSummary, aggregate, completion_count,
    filter_records, is_done_today, summarize,
};
use crate::day::{DayKey, DayPolicy};
use crate::error::ErrorCode;
use crate::merge::{MergeReport, merge_with_report};
use crate::model::{
    ActivityRecord, CompletionEvent, EventId, Goal, GoalPatch, MergeKey, NewActivity, Origin,
    ParentType, Routine,
};
use crate::remote::{RemoteError, RemoteStore, fetch_goals_or_empty, fetch_server_events};
use crate::streak::compute_streak;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failure of a reconciliation operation.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("goal '{0}' is already completed")]
    AlreadyCompleted(String),

    #[error("{parent_type} '{id}' not found")]
    NotFound { parent_type: ParentType, id: String },

    #[error("a history clear is already in progress")]
    ClearInProgress,
}

impl ReconcileError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Cache(err) => err.code(),
            Self::Remote(err) => err.code(),
            Self::AlreadyCompleted(_) => ErrorCode::GoalAlreadyCompleted,
            Self::NotFound { .. } => ErrorCode::ItemNotFound,
            Self::ClearInProgress => ErrorCode::ClearInProgress,
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A merged view of the timeline as of one refresh.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub today: DayKey,
    /// Deduplicated completions, newest first.
    pub timeline: Vec<CompletionEvent>,
    pub streak: u32,
    pub summary: TimelineSummary,
    pub report: MergeReport,
    /// False when the server could not be read and only local data is shown.
    pub server_reachable: bool,
}

/// A routine with its status for today.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutineStatus {
    pub routine: Routine,
    pub done_today: bool,
    /// Timeline entries for this routine.
    pub completions: usize,
}

/// Routine list with today's status, possibly served from the cache.
#[derive(Debug, Clone, Serialize)]
pub struct RoutineBoard {
    pub today: DayKey,
    pub routines: Vec<RoutineStatus>,
    /// True when the server was unreachable and the cached list was used.
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkDoneOutcome {
    /// Stored on the server.
    Recorded(CompletionEvent),
    /// Server unreachable; kept in the local cache for a later sync.
    RecordedLocally(CompletionEvent),
    /// The item already has a completion today. Nothing was written.
    AlreadyDone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndoOutcome {
    Undone(CompletionEvent),
    NothingToUndo,
}

/// Result of uploading local-only completions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Local events created on the server and removed from the cache.
    pub uploaded: usize,
    /// Local events the server already had, removed from the cache.
    pub pruned: usize,
    /// Local events that could not be uploaded and were kept.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Coordinates the cache, the remote store and user notifications.
pub struct Controller {
    cache: CacheService,
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    phase: Mutex<ClearPhase>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("cache", &self.cache)
            .field("phase", &self.clear_phase())
            .finish_non_exhaustive()
    }
}

impl Controller {
    pub fn new(
        cache: CacheService,
        remote: Arc<dyn RemoteStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            cache,
            remote,
            notifier,
            phase: Mutex::new(ClearPhase::Idle),
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &CacheService {
        &self.cache
    }

    #[must_use]
    pub fn remote(&self) -> &dyn RemoteStore {
        self.remote.as_ref()
    }

    #[must_use]
    pub const fn policy(&self) -> DayPolicy {
        self.cache.policy()
    }

    /// Current bulk-clear phase.
    #[must_use]
    pub fn clear_phase(&self) -> ClearPhase {
        *self.lock_phase()
    }

    fn lock_phase(&self) -> MutexGuard<'_, ClearPhase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: ClearPhase) {
        *self.lock_phase() = phase;
    }

    fn notify(&self, notification: Notification) {
        self.notifier.notify(notification);
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Merge server events and completed goals with the cache as it is now.
    #[must_use]
    pub fn refresh(&self, now: DateTime<Utc>) -> Snapshot {
        let goals = fetch_goals_or_empty(self.remote.as_ref());
        self.snapshot_with(&goals, now)
    }

    fn snapshot_with(&self, goals: &[Goal], now: DateTime<Utc>) -> Snapshot {
        let policy = self.policy();
        let (mut server, server_reachable) = match fetch_server_events(self.remote.as_ref(), policy) {
            Ok(events) => (events, true),
            Err(err) => {
                warn!(error = %err, "could not fetch server activities, using local data only");
                (Vec::new(), false)
            }
        };
        // After the activities, so an explicit same-day record wins the key.
        server.extend(goals.iter().filter_map(|goal| goal.implicit_completion(policy)));
        let local = self.cache.activities();
        let merged = merge_with_report(&server, &local);
        let today = policy.today(&now);

        Snapshot {
            today,
            streak: compute_streak(&merged.events, today),
            summary: summarize(&merged.events),
            timeline: merged.events,
            report: merged.report,
            server_reachable,
        }
    }

    /// Consistency records for completed goals and the merged routine events.
    #[must_use]
    pub fn consistency(&self, now: DateTime<Utc>, filter: ConsistencyFilter) -> Vec<ConsistencyRecord> {
        let goals = fetch_goals_or_empty(self.remote.as_ref());
        let snapshot = self.snapshot_with(&goals, now);
        let routine_events: Vec<CompletionEvent> = snapshot
            .timeline
            .into_iter()
            .filter(|event| event.parent_type == ParentType::Routine)
            .collect();
        let records = aggregate(&goals, &routine_events, self.policy());
        filter_records(&records, filter)
    }

    /// Routines with today's status. Falls back to the last cached list when
    /// the server is unreachable; a successful fetch refreshes that list.
    #[must_use]
    pub fn routine_board(&self, now: DateTime<Utc>, search: Option<&str>) -> RoutineBoard {
        let (routines, from_cache) = match self.remote.fetch_routines() {
            Ok(routines) => {
                if let Err(err) = self.cache.write_routines(&routines) {
                    warn!(error = %err, "could not cache routine list");
                }
                (routines, false)
            }
            Err(err) => {
                warn!(error = %err, "could not fetch routines, using cached list");
                (self.cache.routines(), true)
            }
        };

        let needle = search.map(|s| s.trim().to_lowercase()).filter(|s| !s.is_empty());
        let snapshot = self.refresh(now);
        let routines = routines
            .into_iter()
            .filter(|routine| {
                needle
                    .as_deref()
                    .is_none_or(|needle| routine.title.to_lowercase().contains(needle))
            })
            .map(|routine| RoutineStatus {
                done_today: is_done_today(
                    &snapshot.timeline,
                    ParentType::Routine,
                    &routine.id,
                    snapshot.today,
                ),
                completions: completion_count(&snapshot.timeline, ParentType::Routine, &routine.id),
                routine,
            })
            .collect();

        RoutineBoard {
            today: snapshot.today,
            routines,
            from_cache,
        }
    }

    // -----------------------------------------------------------------------
    // Single-item mutations
    // -----------------------------------------------------------------------

    /// Record a completion of `parent_ref` unless it is already done today.
    ///
    /// A transient remote failure stores the completion locally instead; any
    /// other remote failure is reported and nothing is written.
    pub fn mark_done(
        &self,
        parent_type: ParentType,
        parent_ref: &str,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<MarkDoneOutcome, ReconcileError> {
        let snapshot = self.refresh(now);
        if is_done_today(&snapshot.timeline, parent_type, parent_ref, snapshot.today) {
            self.notify(Notification::warning(format!("\"{title}\" is already done today")));
            return Ok(MarkDoneOutcome::AlreadyDone);
        }

        let activity = NewActivity::new(parent_type, parent_ref, title, now, self.policy());
        match self.remote.create_activity(&activity) {
            Ok(record) => {
                let event = self.confirmed_event(record, &activity);
                info!(id = %event.id, %parent_type, parent_ref, "completion recorded");
                self.notify(Notification::success(format!("Marked \"{title}\" done")));
                Ok(MarkDoneOutcome::Recorded(event))
            }
            Err(err) if err.is_transient() => {
                let event = activity.to_local_event();
                if let Err(cache_err) = self.cache.append_activity(event.clone()) {
                    self.notify(Notification::error("Failed to record activity"));
                    return Err(cache_err.into());
                }
                warn!(error = %err, id = %event.id, "server unreachable, completion kept locally");
                self.notify(Notification::warning(format!(
                    "Marked \"{title}\" done offline. It will sync when the server is reachable."
                )));
                Ok(MarkDoneOutcome::RecordedLocally(event))
            }
            Err(err) => {
                self.notify(Notification::error("Failed to record activity"));
                Err(err.into())
            }
        }
    }

    fn confirmed_event(&self, record: ActivityRecord, activity: &NewActivity) -> CompletionEvent {
        let server_id = record.id.clone();
        record
            .into_event(Origin::Server, self.policy())
            .unwrap_or_else(|| {
                let mut event = activity.to_local_event();
                event.origin = Origin::Server;
                if let Some(id) = server_id {
                    event.id = EventId::new(id);
                }
                event
            })
    }

    /// Remove today's completion of `parent_ref` from `timeline`.
    ///
    /// Local events are removed from the cache, server events are deleted
    /// remotely and a completed goal is reopened. The timeline entry is only
    /// dropped once that succeeds.
    pub fn undo_today(
        &self,
        parent_type: ParentType,
        parent_ref: &str,
        timeline: &mut Vec<CompletionEvent>,
        now: DateTime<Utc>,
    ) -> Result<UndoOutcome, ReconcileError> {
        let today = self.policy().today(&now);
        let Some(position) = timeline
            .iter()
            .position(|event| event.day_key == today && event.belongs_to(parent_type, parent_ref))
        else {
            debug!(%parent_type, parent_ref, %today, "nothing to undo");
            return Ok(UndoOutcome::NothingToUndo);
        };

        let target = timeline[position].clone();
        let removed: Result<bool, ReconcileError> = match (target.origin, target.implicit_goal()) {
            (Origin::Local, _) => self.cache.remove_activity(&target.id).map_err(Into::into),
            (Origin::Server, Some(goal_id)) => self
                .remote
                .update_goal(goal_id, &GoalPatch::reopen())
                .map(|_| true)
                .map_err(Into::into),
            (Origin::Server, None) => self
                .remote
                .delete_activity(&target.id)
                .map(|()| true)
                .map_err(Into::into),
        };
        match removed {
            Ok(true) => {}
            Ok(false) => {
                debug!(id = %target.id, "local completion already gone");
                return Ok(UndoOutcome::NothingToUndo);
            }
            Err(err) => {
                self.notify(Notification::error("Failed to undo activity"));
                return Err(err);
            }
        }

        // A shadowed local copy would resurface on the next merge.
        if let Err(err) = self.cache.remove_activities_where(|event| {
            event.day_key == today && event.belongs_to(parent_type, parent_ref)
        }) {
            warn!(error = %err, "could not purge shadowed local copies");
        }

        timeline.remove(position);
        info!(id = %target.id, origin = %target.origin, "completion undone");
        self.notify(Notification::success("Undone for today"));
        Ok(UndoOutcome::Undone(target))
    }

    /// Flag goal `id` completed. Rejected if it already is.
    pub fn complete_goal(&self, id: &str) -> Result<Goal, ReconcileError> {
        let goals = self.remote.fetch_goals().inspect_err(|_| {
            self.notify(Notification::error("Failed to complete goal"));
        })?;
        let Some(goal) = goals.into_iter().find(|goal| goal.id == id) else {
            self.notify(Notification::error("Goal not found"));
            return Err(ReconcileError::NotFound {
                parent_type: ParentType::Goal,
                id: id.to_string(),
            });
        };
        if goal.completed {
            self.notify(Notification::warning(format!(
                "\"{}\" is already completed",
                goal.title
            )));
            return Err(ReconcileError::AlreadyCompleted(id.to_string()));
        }

        match self.remote.complete_goal(id) {
            Ok(goal) => {
                info!(id, "goal completed");
                self.notify(Notification::success(format!("Completed \"{}\"", goal.title)));
                Ok(goal)
            }
            Err(err) => {
                self.notify(Notification::error("Failed to complete goal"));
                Err(err.into())
            }
        }
    }

    /// Upload local-only completions.
    ///
    /// Events the server already has for the same key are pruned from the
    /// cache. Transient failures keep the event for the next run; an
    /// authorization failure stops the sync.
    pub fn sync_pending(&self, now: DateTime<Utc>) -> Result<SyncReport, ReconcileError> {
        let policy = self.policy();
        let server = fetch_server_events(self.remote.as_ref(), policy)?;
        let mut known: HashSet<MergeKey> = server.iter().map(CompletionEvent::merge_key).collect();
        let mut report = SyncReport::default();

        for event in self.cache.activities() {
            let key = event.merge_key();
            if known.contains(&key) {
                self.cache.remove_activity(&event.id)?;
                report.pruned += 1;
                continue;
            }
            let Some(parent_ref) = event.parent_ref.clone() else {
                warn!(id = %event.id, "local event without a parent cannot be uploaded");
                report.failed += 1;
                continue;
            };

            let activity = NewActivity {
                parent_type: event.parent_type,
                ref_id: parent_ref,
                title: event.title.clone(),
                completed_at: event
                    .completed_at
                    .or_else(|| event.day_key.date().and_hms_opt(12, 0, 0).map(|dt| dt.and_utc()))
                    .unwrap_or(now),
                date_string: event.day_key,
            };
            match self.remote.create_activity(&activity) {
                Ok(_) => {
                    self.cache.remove_activity(&event.id)?;
                    known.insert(key);
                    report.uploaded += 1;
                }
                Err(err @ RemoteError::Unauthorized(_)) => {
                    self.notify(Notification::error("Sync stopped: not authorized"));
                    return Err(err.into());
                }
                Err(err) => {
                    warn!(error = %err, id = %event.id, "could not upload local completion");
                    report.failed += 1;
                }
            }
        }

        info!(
            uploaded = report.uploaded,
            pruned = report.pruned,
            failed = report.failed,
            "local completions synced"
        );
        let notification = format!(
            "Uploaded: {}. Already on server: {}. Failed: {}.",
            report.uploaded, report.pruned, report.failed
        );
        if report.failed == 0 {
            self.notify(Notification::success(notification));
        } else {
            self.notify(Notification::warning(notification));
        }
        Ok(report)
    }
}
