//! End-to-end reconciliation scenarios against the in-memory remote and
//! both cache backends.

use std::sync::Arc;
use std::time::Duration;

use cadence_core::cache::{CacheService, FileCache, LocalCache, MemoryCache};
use cadence_core::day::DayPolicy;
use cadence_core::model::{CompletionEvent, EventId, Goal, ItemRef, NewActivity, ParentType};
use cadence_core::reconcile::{
    ClearPhase, Controller, MarkDoneOutcome, NotifyLevel, RecordingNotifier,
};
use cadence_core::remote::{FaultConfig, MemoryRemote};
use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn controller_over(
    store: Arc<dyn LocalCache>,
) -> (Arc<MemoryRemote>, Arc<RecordingNotifier>, Controller) {
    let remote = Arc::new(MemoryRemote::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let controller = Controller::new(
        CacheService::new(store, DayPolicy::Utc),
        remote.clone(),
        notifier.clone(),
    );
    (remote, notifier, controller)
}

fn seed(remote: &MemoryRemote, parent: &str, when: DateTime<Utc>) -> EventId {
    remote.seed_activity(&NewActivity::new(
        ParentType::Routine,
        parent,
        parent,
        when,
        DayPolicy::Utc,
    ))
}

fn local(parent: &str, when: DateTime<Utc>) -> CompletionEvent {
    CompletionEvent::local(ParentType::Routine, parent, parent, when, DayPolicy::Utc)
}

#[test]
fn bulk_clear_with_one_failing_delete() {
    let (remote, notifier, controller) = controller_over(Arc::new(MemoryCache::new()));
    seed(&remote, "a", at(8, 8));
    let stuck = seed(&remote, "b", at(9, 8));
    seed(&remote, "c", at(10, 8));
    remote.fail_delete_of(&stuck);
    controller
        .cache()
        .write_activities(&[local("d", at(10, 9)), local("e", at(9, 9))])
        .expect("seed local");

    let before = controller.refresh(at(10, 20));
    assert_eq!(before.timeline.len(), 5);

    let run = controller.begin_clear(&before.timeline).expect("begin");
    assert!(controller.cache().activities().is_empty());
    assert_eq!(remote.delete_attempts(), 0, "no remote call before the local clear");
    assert_eq!(run.optimistic_timeline().len(), 3);

    let outcome = run.sync_remote().settle(at(10, 20));
    assert_eq!(outcome.removed, 2);
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.summary(), "removed: 2, failed: 1");
    assert_eq!(remote.activity_count(), 1);
    assert!(controller.cache().activities().is_empty());
    assert_eq!(outcome.snapshot.timeline.len(), 1);
    assert_eq!(outcome.snapshot.timeline[0].id, stuck);
    assert_eq!(controller.clear_phase(), ClearPhase::Idle);

    let last = notifier.last().expect("settle notification");
    assert_eq!(last.level, NotifyLevel::Success);
    assert_eq!(last.message, "Server removed: 2. Failed: 1.");
}

#[test]
fn write_landing_during_remote_phase_survives_settle() {
    let (remote, _notifier, controller) = controller_over(Arc::new(MemoryCache::new()));
    seed(&remote, "a", at(9, 8));

    let run = controller.begin_clear(&[]).expect("begin");
    let synced = run.sync_remote();

    // Another view records a completion while the clear is still running.
    remote.set_fail_creates(true);
    let outcome = controller
        .mark_done(ParentType::Routine, "late", "Late", at(10, 19))
        .expect("mark done");
    assert!(matches!(outcome, MarkDoneOutcome::RecordedLocally(_)));

    let settled = synced.settle(at(10, 20));
    assert_eq!(settled.snapshot.timeline.len(), 1);
    assert_eq!(
        settled.snapshot.timeline[0].parent_ref.as_deref(),
        Some("late")
    );
    assert_eq!(controller.cache().activities().len(), 1);
}

#[test]
fn file_backed_clear_round_trip() {
    let tmp = TempDir::new().expect("tempdir");
    let store = Arc::new(
        FileCache::new(tmp.path().join(".cadence/cache")).with_lock_timeout(Duration::from_secs(2)),
    );
    let (remote, _notifier, controller) = controller_over(store.clone());
    seed(&remote, "a", at(9, 8));
    controller
        .cache()
        .append_activity(local("b", at(10, 8)))
        .expect("append");
    assert!(store.path_for(cadence_core::cache::CacheKey::Activities).exists());

    let before = controller.refresh(at(10, 20));
    let outcome = controller
        .clear_history(&before.timeline, at(10, 21))
        .expect("clear");
    assert_eq!(outcome.summary(), "removed: 1, failed: 0");
    assert!(outcome.snapshot.timeline.is_empty());

    // A second service over the same directory sees the emptied cache.
    let reopened = CacheService::new(
        Arc::new(FileCache::new(tmp.path().join(".cadence/cache"))),
        DayPolicy::Utc,
    );
    assert!(reopened.activities().is_empty());
}

#[test]
fn offline_completion_syncs_later() {
    let (remote, _notifier, controller) = controller_over(Arc::new(MemoryCache::new()));
    remote.set_fail_creates(true);
    controller
        .mark_done(ParentType::Routine, "r1", "Stretch", at(10, 8))
        .expect("offline");
    assert_eq!(remote.activity_count(), 0);
    assert_eq!(controller.refresh(at(10, 9)).streak, 1);

    remote.set_fail_creates(false);
    let report = controller.sync_pending(at(10, 9)).expect("sync");
    assert_eq!(report.uploaded, 1);
    assert_eq!(remote.activity_count(), 1);
    assert!(controller.cache().activities().is_empty());

    let snapshot = controller.refresh(at(10, 9));
    assert_eq!(snapshot.timeline.len(), 1);
    assert!(!snapshot.timeline[0].is_local());
}

fn completed_goal(id: &str) -> Goal {
    Goal {
        id: id.to_string(),
        title: "Run a marathon".to_string(),
        description: None,
        completed: true,
        completed_at: Some(at(9, 18)),
        created_at: Some(at(1, 9)),
    }
}

#[test]
fn clearing_goal_history_with_unlistable_server_still_reopens_goal() {
    let (remote, notifier, controller) = controller_over(Arc::new(MemoryCache::new()));
    remote.add_goal(completed_goal("g1"));
    controller
        .cache()
        .append_activity(CompletionEvent::local(
            ParentType::Goal,
            "g1",
            "Run a marathon",
            at(8, 7),
            DayPolicy::Utc,
        ))
        .expect("append");
    remote.set_fail_fetches(true);

    let outcome = controller.clear_item_history(&ItemRef::goal("g1"), at(10, 12));
    let cleanup = outcome.result.expect("goal reopened");
    assert_eq!(cleanup.local_removed, 1);
    assert!(cleanup.fetch_failed);
    assert_eq!(cleanup.remote_removed, 0);

    remote.set_fail_fetches(false);
    assert!(remote.goal("g1").is_some_and(|g| !g.completed && g.completed_at.is_none()));
    assert!(controller.cache().activities().is_empty());
    assert_eq!(notifier.last().map(|n| n.level), Some(NotifyLevel::Warning));
}

#[test]
fn deleting_goal_with_unlistable_server_reports_the_delete() {
    let (remote, notifier, controller) = controller_over(Arc::new(MemoryCache::new()));
    remote.add_goal(completed_goal("g1"));
    remote.set_faults(FaultConfig {
        fail_fetches: true,
        ..FaultConfig::default()
    });

    let outcome = controller.delete_item(&ItemRef::goal("g1"), at(10, 12));
    let cleanup = outcome.result.expect("goal deleted");
    assert!(cleanup.fetch_failed);
    assert!(cleanup.is_partial());

    remote.set_faults(FaultConfig::default());
    assert!(remote.goal("g1").is_none());
    let last = notifier.last().expect("notified");
    assert_eq!(last.level, NotifyLevel::Warning);
    assert_eq!(
        last.message,
        "Removed goal, but some of its server history could not be removed."
    );
}

#[test]
fn goal_completed_today_carries_the_streak() {
    let (remote, _notifier, controller) = controller_over(Arc::new(MemoryCache::new()));
    remote.add_goal(Goal {
        completed_at: Some(at(10, 9)),
        ..completed_goal("g1")
    });
    seed(&remote, "r1", at(9, 8));

    let snapshot = controller.refresh(at(10, 20));
    assert_eq!(snapshot.timeline.len(), 2);
    assert_eq!(snapshot.timeline[0].parent_type, ParentType::Goal);
    assert_eq!(snapshot.streak, 2);
}
