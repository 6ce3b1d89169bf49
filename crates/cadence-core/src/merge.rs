//! Timeline merge of server-recorded and locally cached completion events.
//!
//! # Merge Semantics
//!
//! A completion is identified by `(parent_type, parent_ref, day_key)`: an
//! item completed twice on the same day surfaces once. Server events are
//! inserted first and win every tie; a local event is only kept when the
//! server has nothing for its key. Events without a parent reference are
//! keyed by their own id and never collide.
//!
//! ## Sort Order
//!
//! Newest `completed_at` first. Events whose timestamp is missing sort as
//! the oldest. The sort is stable, so ties keep insertion order (server
//! events before local ones, each in input order).
//!
//! The merge is pure and idempotent: feeding its output back in as the local
//! side adds nothing new, so callers may re-run it as often as they like.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;
use tracing::debug;

use crate::model::{CompletionEvent, MergeKey};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Counters describing what a merge kept and dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Events surfaced from the server side.
    pub from_server: usize,
    /// Events surfaced from the local side.
    pub from_local: usize,
    /// Local events hidden because the server already has their key.
    pub shadowed_local: usize,
    /// Events dropped because their own side already produced the key.
    pub duplicates_skipped: usize,
}

/// The merged timeline plus its [`MergeReport`].
#[derive(Debug, Clone)]
pub struct MergeResult {
    /// Deduplicated events, newest first.
    pub events: Vec<CompletionEvent>,
    pub report: MergeReport,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Server,
    Local,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Merge server and local events into one deduplicated timeline.
///
/// # Examples
///
/// ```
/// use cadence_core::merge::merge;
///
/// assert!(merge(&[], &[]).is_empty());
/// ```
#[must_use]
pub fn merge(server: &[CompletionEvent], local: &[CompletionEvent]) -> Vec<CompletionEvent> {
    merge_with_report(server, local).events
}

/// Like [`merge`], also reporting how many events were shadowed or dropped.
#[must_use]
pub fn merge_with_report(server: &[CompletionEvent], local: &[CompletionEvent]) -> MergeResult {
    let mut seen: HashMap<MergeKey, Side> = HashMap::with_capacity(server.len() + local.len());
    let mut events: Vec<CompletionEvent> = Vec::with_capacity(server.len() + local.len());
    let mut report = MergeReport::default();

    for event in server {
        match seen.entry(event.merge_key()) {
            Entry::Occupied(_) => report.duplicates_skipped += 1,
            Entry::Vacant(slot) => {
                slot.insert(Side::Server);
                events.push(event.clone());
                report.from_server += 1;
            }
        }
    }

    for event in local {
        match seen.entry(event.merge_key()) {
            Entry::Occupied(slot) => match slot.get() {
                Side::Server => report.shadowed_local += 1,
                Side::Local => report.duplicates_skipped += 1,
            },
            Entry::Vacant(slot) => {
                slot.insert(Side::Local);
                events.push(event.clone());
                report.from_local += 1;
            }
        }
    }

    sort_timeline(&mut events);

    debug!(
        from_server = report.from_server,
        from_local = report.from_local,
        shadowed_local = report.shadowed_local,
        duplicates_skipped = report.duplicates_skipped,
        "merged timeline"
    );

    MergeResult { events, report }
}

/// Stable sort, newest `completed_at` first, missing timestamps last.
pub fn sort_timeline(events: &mut [CompletionEvent]) {
    // `None < Some(_)`, so comparing b to a puts missing timestamps at the end.
    events.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::day::DayKey;
    use crate::model::{EventId, Origin, ParentType};
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    // -----------------------------------------------------------------------
    // Test helpers
    // -----------------------------------------------------------------------

    fn event(id: &str, parent: Option<&str>, day: u32, hour: u32, origin: Origin) -> CompletionEvent {
        CompletionEvent {
            id: EventId::new(id),
            parent_type: ParentType::Routine,
            parent_ref: parent.map(str::to_string),
            title: parent.unwrap_or("orphan").to_string(),
            completed_at: Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).single(),
            day_key: DayKey::from_ymd(2024, 1, day).expect("valid day"),
            origin,
        }
    }

    fn server(id: &str, parent: &str, day: u32, hour: u32) -> CompletionEvent {
        event(id, Some(parent), day, hour, Origin::Server)
    }

    fn local(id: &str, parent: &str, day: u32, hour: u32) -> CompletionEvent {
        event(id, Some(parent), day, hour, Origin::Local)
    }

    fn ids(events: &[CompletionEvent]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    // -----------------------------------------------------------------------
    // Basic cases
    // -----------------------------------------------------------------------

    #[test]
    fn merge_both_empty() {
        let result = merge_with_report(&[], &[]);
        assert!(result.events.is_empty());
        assert_eq!(result.report, MergeReport::default());
    }

    #[test]
    fn disjoint_sides_are_unioned_newest_first() {
        let s = [server("s1", "a", 9, 8)];
        let l = [local("l1", "b", 10, 8)];
        let merged = merge(&s, &l);
        assert_eq!(ids(&merged), vec!["l1", "s1"]);
    }

    #[test]
    fn server_wins_same_key() {
        let s = [server("s1", "a", 9, 20)];
        let l = [local("l1", "a", 9, 7)];
        let result = merge_with_report(&s, &l);
        assert_eq!(ids(&result.events), vec!["s1"]);
        assert_eq!(result.report.shadowed_local, 1);
        assert_eq!(result.events[0].origin, Origin::Server);
    }

    #[test]
    fn same_item_same_day_collapses() {
        let l = [local("l1", "a", 9, 7), local("l2", "a", 9, 12), local("l3", "a", 9, 22)];
        let result = merge_with_report(&[], &l);
        assert_eq!(ids(&result.events), vec!["l1"]);
        assert_eq!(result.report.duplicates_skipped, 2);
    }

    #[test]
    fn first_server_duplicate_wins() {
        let s = [server("s1", "a", 9, 7), server("s2", "a", 9, 12)];
        let merged = merge(&s, &[]);
        assert_eq!(ids(&merged), vec!["s1"]);
    }

    #[test]
    fn same_ref_different_type_does_not_collide() {
        let mut goal = server("g", "x", 9, 8);
        goal.parent_type = ParentType::Goal;
        let routine = server("r", "x", 9, 8);
        assert_eq!(merge(&[goal, routine], &[]).len(), 2);
    }

    #[test]
    fn orphans_are_all_kept() {
        let l = [
            event("o1", None, 9, 8, Origin::Local),
            event("o2", None, 9, 8, Origin::Local),
        ];
        assert_eq!(merge(&[], &l).len(), 2);
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn missing_timestamp_sorts_oldest() {
        let mut undated = server("u", "z", 10, 0);
        undated.completed_at = None;
        let s = [undated, server("s1", "a", 1, 8), server("s2", "b", 5, 8)];
        let merged = merge(&s, &[]);
        assert_eq!(ids(&merged), vec!["s2", "s1", "u"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let s = [server("s1", "a", 9, 8), server("s2", "b", 9, 8)];
        let l = [local("l1", "c", 9, 8)];
        assert_eq!(ids(&merge(&s, &l)), vec!["s1", "s2", "l1"]);
    }

    // -----------------------------------------------------------------------
    // Properties on fixed data (proptest versions live in tests/)
    // -----------------------------------------------------------------------

    #[test]
    fn remerge_is_idempotent() {
        let s = [server("s1", "a", 9, 8), server("s2", "b", 8, 8)];
        let l = [local("l1", "a", 9, 6), local("l2", "c", 7, 8), local("l3", "c", 7, 9)];
        let once = merge(&s, &l);
        let twice = merge(&s, &once);
        let a: HashSet<_> = ids(&once).into_iter().collect();
        let b: HashSet<_> = ids(&twice).into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn output_keys_are_unique() {
        let s = [server("s1", "a", 9, 8), server("s2", "a", 9, 9)];
        let l = [local("l1", "a", 9, 6), local("l2", "a", 8, 8)];
        let merged = merge(&s, &l);
        let keys: HashSet<_> = merged.iter().map(CompletionEvent::merge_key).collect();
        assert_eq!(keys.len(), merged.len());
    }
}
