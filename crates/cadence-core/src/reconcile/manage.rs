//! Per-item management: clear one item's history, or delete the item.
//!
//! Both operations touch the cache and the server, and both always finish
//! with a fresh merge so the caller sees the real state even when a step
//! failed halfway.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::{Controller, Notification, ReconcileError, Snapshot};
use crate::model::{GoalPatch, ItemRef, ParentType};
use crate::remote::fetch_server_events;

/// What an item cleanup removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemCleanup {
    pub local_removed: usize,
    pub remote_removed: usize,
    pub remote_failed: usize,
    /// The server activity list could not be read; none were deleted.
    pub fetch_failed: bool,
}

impl ItemCleanup {
    /// True when some server history may have been left behind.
    #[must_use]
    pub const fn is_partial(&self) -> bool {
        self.fetch_failed || self.remote_failed > 0
    }
}

/// Result of a manage operation plus the re-merged view.
#[derive(Debug)]
pub struct ManageOutcome {
    pub item: ItemRef,
    pub result: Result<ItemCleanup, ReconcileError>,
    pub snapshot: Snapshot,
}

impl Controller {
    /// Remove every completion of `item`, locally and on the server.
    ///
    /// Goals are additionally reopened, since a completed goal counts as a
    /// completion on its own.
    pub fn clear_item_history(&self, item: &ItemRef, now: DateTime<Utc>) -> ManageOutcome {
        let result = self.clear_item(item);
        match &result {
            Ok(cleanup) if cleanup.fetch_failed => self.notify(Notification::warning(
                "History partly cleared: server entries could not be listed.",
            )),
            Ok(cleanup) if cleanup.remote_failed > 0 => self.notify(Notification::warning(format!(
                "History partly cleared: {} server entries could not be removed.",
                cleanup.remote_failed
            ))),
            Ok(_) => self.notify(Notification::success("History cleared")),
            Err(_) => self.notify(Notification::error("Failed to clear history")),
        }
        ManageOutcome {
            item: item.clone(),
            result,
            snapshot: self.refresh(now),
        }
    }

    /// Delete `item` on the server, then every completion of it.
    ///
    /// Success is judged by the item delete alone; leftover history is
    /// reported in the [`ItemCleanup`].
    pub fn delete_item(&self, item: &ItemRef, now: DateTime<Utc>) -> ManageOutcome {
        let result = self.delete(item);
        let noun = match item.parent_type {
            ParentType::Goal => "goal",
            ParentType::Routine => "routine",
        };
        match &result {
            Ok(cleanup) if cleanup.is_partial() => self.notify(Notification::warning(format!(
                "Removed {noun}, but some of its server history could not be removed."
            ))),
            Ok(_) => self.notify(Notification::success(format!(
                "Removed {noun} successfully"
            ))),
            Err(_) => self.notify(Notification::error(format!("Failed to delete {noun}"))),
        }
        ManageOutcome {
            item: item.clone(),
            result,
            snapshot: self.refresh(now),
        }
    }

    fn clear_item(&self, item: &ItemRef) -> Result<ItemCleanup, ReconcileError> {
        let local_removed = self.cache.remove_activities_where(|event| item.owns(event))?;
        let cleanup = ItemCleanup {
            local_removed,
            ..self.purge_remote_events(item)
        };
        if item.parent_type == ParentType::Goal {
            self.remote.update_goal(&item.id, &GoalPatch::reopen())?;
        }
        info!(
            parent_type = %item.parent_type,
            id = %item.id,
            local_removed = cleanup.local_removed,
            remote_removed = cleanup.remote_removed,
            remote_failed = cleanup.remote_failed,
            fetch_failed = cleanup.fetch_failed,
            "item history cleared"
        );
        Ok(cleanup)
    }

    fn delete(&self, item: &ItemRef) -> Result<ItemCleanup, ReconcileError> {
        match item.parent_type {
            ParentType::Goal => self.remote.delete_goal(&item.id)?,
            ParentType::Routine => {
                self.remote.delete_routine(&item.id)?;
                let cached = self.cache.routines();
                if cached.iter().any(|routine| routine.id == item.id) {
                    let kept: Vec<_> = cached
                        .into_iter()
                        .filter(|routine| routine.id != item.id)
                        .collect();
                    if let Err(err) = self.cache.write_routines(&kept) {
                        warn!(error = %err, "could not drop deleted routine from cache");
                    }
                }
            }
        }

        // The item is gone; history cleanup from here on is best effort.
        let mut cleanup = self.purge_remote_events(item);
        match self.cache.remove_activities_where(|event| item.owns(event)) {
            Ok(removed) => cleanup.local_removed = removed,
            Err(err) => warn!(error = %err, "could not drop deleted item's local completions"),
        }
        info!(parent_type = %item.parent_type, id = %item.id, "item deleted");
        Ok(cleanup)
    }

    /// Delete the item's server activities one by one. A failed listing is
    /// flagged and leaves the server untouched.
    fn purge_remote_events(&self, item: &ItemRef) -> ItemCleanup {
        let mut cleanup = ItemCleanup::default();
        let server = match fetch_server_events(self.remote.as_ref(), self.policy()) {
            Ok(events) => events,
            Err(err) => {
                warn!(error = %err, "could not list server activities, none deleted");
                cleanup.fetch_failed = true;
                return cleanup;
            }
        };
        for event in server.iter().filter(|event| item.owns(event)) {
            match self.remote.delete_activity(&event.id) {
                Ok(()) => cleanup.remote_removed += 1,
                Err(err) => {
                    warn!(id = %event.id, error = %err, "failed to delete server activity");
                    cleanup.remote_failed += 1;
                }
            }
        }
        cleanup
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheService;
    use crate::day::DayPolicy;
    use crate::model::{CompletionEvent, Goal, NewActivity, Routine};
    use crate::reconcile::RecordingNotifier;
    use crate::remote::MemoryRemote;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).single().expect("valid")
    }

    fn setup() -> (Arc<MemoryRemote>, Arc<RecordingNotifier>, Controller) {
        let remote = Arc::new(MemoryRemote::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let controller = Controller::new(
            CacheService::in_memory(DayPolicy::Utc),
            remote.clone(),
            notifier.clone(),
        );
        (remote, notifier, controller)
    }

    fn seed(remote: &MemoryRemote, parent: &str, day: u32) {
        remote.seed_activity(&NewActivity::new(
            ParentType::Routine,
            parent,
            parent,
            at(day, 8),
            DayPolicy::Utc,
        ));
    }

    fn local(parent: &str, day: u32) -> CompletionEvent {
        CompletionEvent::local(ParentType::Routine, parent, parent, at(day, 9), DayPolicy::Utc)
    }

    fn routine(id: &str) -> Routine {
        Routine {
            id: id.to_string(),
            title: id.to_string(),
            start_time: None,
            duration_minutes: 5,
            created_at: None,
        }
    }

    #[test]
    fn clear_routine_history_leaves_other_items() {
        let (remote, _notifier, controller) = setup();
        seed(&remote, "r1", 9);
        seed(&remote, "r1", 10);
        seed(&remote, "r2", 10);
        controller
            .cache()
            .write_activities(&[local("r1", 8), local("r2", 8)])
            .expect("write");

        let outcome = controller.clear_item_history(&ItemRef::routine("r1"), at(10, 12));
        let cleanup = outcome.result.expect("cleared");
        assert_eq!(cleanup.local_removed, 1);
        assert_eq!(cleanup.remote_removed, 2);
        assert!(
            outcome
                .snapshot
                .timeline
                .iter()
                .all(|event| event.parent_ref.as_deref() == Some("r2"))
        );
        assert_eq!(outcome.snapshot.timeline.len(), 2);
    }

    #[test]
    fn clear_goal_history_reopens_goal() {
        let (remote, _notifier, controller) = setup();
        remote.add_goal(Goal {
            id: "g1".to_string(),
            title: "Ship".to_string(),
            description: None,
            completed: true,
            completed_at: Some(at(8, 12)),
            created_at: None,
        });
        let outcome = controller.clear_item_history(&ItemRef::goal("g1"), at(10, 12));
        assert!(outcome.result.is_ok());
        assert!(remote.goal("g1").is_some_and(|g| !g.completed && g.completed_at.is_none()));
    }

    #[test]
    fn delete_routine_removes_item_and_events() {
        let (remote, notifier, controller) = setup();
        remote.add_routine(routine("r1"));
        remote.add_routine(routine("r2"));
        controller
            .cache()
            .write_routines(&[routine("r1"), routine("r2")])
            .expect("write");
        seed(&remote, "r1", 10);
        controller
            .cache()
            .append_activity(local("r1", 9))
            .expect("append");

        let outcome = controller.delete_item(&ItemRef::routine("r1"), at(10, 12));
        assert!(outcome.result.is_ok());
        assert_eq!(remote.routine_count(), 1);
        assert_eq!(remote.activity_count(), 0);
        assert!(outcome.snapshot.timeline.is_empty());
        assert_eq!(controller.cache().routines(), vec![routine("r2")]);
        assert_eq!(
            notifier.last().map(|n| n.message),
            Some("Removed routine successfully".to_string())
        );
    }

    #[test]
    fn failed_delete_still_remerges() {
        let (_remote, notifier, controller) = setup();
        controller
            .cache()
            .append_activity(local("r9", 10))
            .expect("append");
        let outcome = controller.delete_item(&ItemRef::routine("r9"), at(10, 12));
        assert!(matches!(outcome.result, Err(ReconcileError::Remote(_))));
        assert_eq!(outcome.snapshot.timeline.len(), 1);
        assert_eq!(
            notifier.last().map(|n| n.message),
            Some("Failed to delete routine".to_string())
        );
    }
}
