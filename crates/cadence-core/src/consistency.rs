//! Per-item consistency records and timeline views.
//!
//! A [`ConsistencyRecord`] counts the distinct days an item was completed
//! on. Completed goals contribute one implicit completion; routines
//! contribute their explicit events. Filtering by item type happens after
//! aggregation so the counts never depend on the active view.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use serde::Serialize;

use crate::day::{DayKey, DayPolicy};
use crate::model::{CompletionEvent, Goal, ParentType};

/// Distinct-day completion count for one goal or routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsistencyRecord {
    pub parent_type: ParentType,
    pub parent_ref: String,
    pub title: String,
    pub days_count: usize,
    /// The distinct days, newest first.
    pub recent_days: Vec<DayKey>,
}

/// Which records a view shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyFilter {
    #[default]
    All,
    Goal,
    Routine,
}

impl ConsistencyFilter {
    #[must_use]
    pub fn admits(self, parent_type: ParentType) -> bool {
        match self {
            Self::All => true,
            Self::Goal => parent_type == ParentType::Goal,
            Self::Routine => parent_type == ParentType::Routine,
        }
    }
}

impl FromStr for ConsistencyFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "goal" | "goals" => Ok(Self::Goal),
            "routine" | "routines" => Ok(Self::Routine),
            other => Err(format!("unknown filter '{other}': expected all, goal, or routine")),
        }
    }
}

struct Group {
    title: String,
    days: BTreeSet<DayKey>,
}

/// Build one record per item from completed goals and routine events.
///
/// Events without a parent reference are grouped under their own id.
/// Output is sorted by `days_count` descending, then title (byte order),
/// then `parent_ref`.
#[must_use]
pub fn aggregate(
    goals: &[Goal],
    routine_events: &[CompletionEvent],
    policy: DayPolicy,
) -> Vec<ConsistencyRecord> {
    let implicit: Vec<CompletionEvent> = goals
        .iter()
        .filter_map(|goal| goal.implicit_completion(policy))
        .collect();

    let mut groups: BTreeMap<(ParentType, String), Group> = BTreeMap::new();
    for event in implicit.iter().chain(routine_events) {
        let anchor = event
            .parent_ref
            .clone()
            .unwrap_or_else(|| event.id.as_str().to_string());
        groups
            .entry((event.parent_type, anchor))
            .or_insert_with(|| Group {
                title: event.title.clone(),
                days: BTreeSet::new(),
            })
            .days
            .insert(event.day_key);
    }

    let mut records: Vec<ConsistencyRecord> = groups
        .into_iter()
        .map(|((parent_type, parent_ref), group)| ConsistencyRecord {
            parent_type,
            parent_ref,
            title: group.title,
            days_count: group.days.len(),
            recent_days: group.days.into_iter().rev().collect(),
        })
        .collect();

    records.sort_by(|a, b| {
        b.days_count
            .cmp(&a.days_count)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.parent_ref.cmp(&b.parent_ref))
    });
    records
}

/// Apply a view filter to already aggregated records.
#[must_use]
pub fn filter_records(
    records: &[ConsistencyRecord],
    filter: ConsistencyFilter,
) -> Vec<ConsistencyRecord> {
    records
        .iter()
        .filter(|record| filter.admits(record.parent_type))
        .cloned()
        .collect()
}

/// Entry counts over a merged timeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimelineSummary {
    pub total: usize,
    pub goals: usize,
    pub routines: usize,
}

#[must_use]
pub fn summarize(timeline: &[CompletionEvent]) -> TimelineSummary {
    timeline
        .iter()
        .fold(TimelineSummary::default(), |mut summary, event| {
            summary.total += 1;
            match event.parent_type {
                ParentType::Goal => summary.goals += 1,
                ParentType::Routine => summary.routines += 1,
            }
            summary
        })
}

/// Timeline entries that share a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayGroup {
    pub day: DayKey,
    pub events: Vec<CompletionEvent>,
}

/// Group a timeline by day, newest day first, entries in timeline order.
#[must_use]
pub fn group_by_day(timeline: &[CompletionEvent]) -> Vec<DayGroup> {
    let mut days: BTreeMap<DayKey, Vec<CompletionEvent>> = BTreeMap::new();
    for event in timeline {
        days.entry(event.day_key).or_default().push(event.clone());
    }
    days.into_iter()
        .rev()
        .map(|(day, events)| DayGroup { day, events })
        .collect()
}

/// Entries completed on `today`.
#[must_use]
pub fn todays(timeline: &[CompletionEvent], today: DayKey) -> Vec<&CompletionEvent> {
    timeline.iter().filter(|event| event.day_key == today).collect()
}

/// Whether `parent_ref` already has a completion on `today`.
#[must_use]
pub fn is_done_today(
    timeline: &[CompletionEvent],
    parent_type: ParentType,
    parent_ref: &str,
    today: DayKey,
) -> bool {
    timeline
        .iter()
        .any(|event| event.day_key == today && event.belongs_to(parent_type, parent_ref))
}

/// Number of timeline entries for `parent_ref`.
#[must_use]
pub fn completion_count(timeline: &[CompletionEvent], parent_type: ParentType, parent_ref: &str) -> usize {
    timeline
        .iter()
        .filter(|event| event.belongs_to(parent_type, parent_ref))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EventId, Origin};
    use chrono::{TimeZone, Utc};

    fn day(s: &str) -> DayKey {
        s.parse().expect("valid day")
    }

    fn routine_on(id: &str, parent: &str, title: &str, d: &str) -> CompletionEvent {
        CompletionEvent {
            id: EventId::new(id),
            parent_type: ParentType::Routine,
            parent_ref: Some(parent.to_string()),
            title: title.to_string(),
            completed_at: None,
            day_key: day(d),
            origin: Origin::Local,
        }
    }

    fn goal(id: &str, title: &str, completed_day: Option<u32>) -> Goal {
        Goal {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            completed: completed_day.is_some(),
            completed_at: completed_day
                .and_then(|d| Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).single()),
            created_at: Utc.with_ymd_and_hms(2023, 12, 1, 12, 0, 0).single(),
        }
    }

    #[test]
    fn same_day_repeats_count_once() {
        let events = [
            routine_on("1", "a", "Read", "2024-01-10"),
            routine_on("2", "a", "Read", "2024-01-10"),
            routine_on("3", "a", "Read", "2024-01-10"),
        ];
        let records = aggregate(&[], &events, DayPolicy::Utc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].days_count, 1);
    }

    #[test]
    fn distinct_days_are_counted_and_listed_newest_first() {
        let events = [
            routine_on("1", "a", "Read", "2024-01-10"),
            routine_on("2", "a", "Read", "2024-01-09"),
            routine_on("3", "a", "Read", "2024-01-07"),
        ];
        let records = aggregate(&[], &events, DayPolicy::Utc);
        assert_eq!(records[0].days_count, 3);
        assert_eq!(
            records[0].recent_days,
            vec![day("2024-01-10"), day("2024-01-09"), day("2024-01-07")]
        );
    }

    #[test]
    fn completed_goals_contribute_one_day() {
        let goals = [goal("g1", "Ship", Some(8)), goal("g2", "Open goal", None)];
        let records = aggregate(&goals, &[], DayPolicy::Utc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].parent_type, ParentType::Goal);
        assert_eq!(records[0].days_count, 1);
        assert_eq!(records[0].recent_days, vec![day("2024-01-08")]);
    }

    #[test]
    fn sorted_by_count_then_title() {
        let events = [
            routine_on("1", "b", "beta", "2024-01-10"),
            routine_on("2", "a", "Alpha", "2024-01-10"),
            routine_on("3", "c", "gamma", "2024-01-10"),
            routine_on("4", "c", "gamma", "2024-01-09"),
        ];
        let records = aggregate(&[], &events, DayPolicy::Utc);
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        // Case-sensitive: uppercase sorts before lowercase.
        assert_eq!(titles, vec!["gamma", "Alpha", "beta"]);
    }

    #[test]
    fn filter_does_not_change_counts() {
        let goals = [goal("g1", "Ship", Some(8))];
        let events = [
            routine_on("1", "a", "Read", "2024-01-10"),
            routine_on("2", "a", "Read", "2024-01-09"),
        ];
        let all = aggregate(&goals, &events, DayPolicy::Utc);
        let routines = filter_records(&all, ConsistencyFilter::Routine);
        let goals_only = filter_records(&all, ConsistencyFilter::Goal);
        assert_eq!(routines.len(), 1);
        assert_eq!(routines[0].days_count, 2);
        assert_eq!(goals_only.len(), 1);
        assert_eq!(filter_records(&all, ConsistencyFilter::All), all);
    }

    #[test]
    fn filter_parses_plural_forms() {
        assert_eq!("Routines".parse::<ConsistencyFilter>(), Ok(ConsistencyFilter::Routine));
        assert_eq!("goal".parse::<ConsistencyFilter>(), Ok(ConsistencyFilter::Goal));
        assert!("habits".parse::<ConsistencyFilter>().is_err());
    }

    #[test]
    fn summary_counts_by_type() {
        let mut g = routine_on("g", "g1", "Ship", "2024-01-08");
        g.parent_type = ParentType::Goal;
        let timeline = [routine_on("1", "a", "Read", "2024-01-10"), g];
        assert_eq!(
            summarize(&timeline),
            TimelineSummary {
                total: 2,
                goals: 1,
                routines: 1
            }
        );
    }

    #[test]
    fn groups_newest_day_first() {
        let timeline = [
            routine_on("1", "a", "Read", "2024-01-10"),
            routine_on("2", "b", "Run", "2024-01-10"),
            routine_on("3", "a", "Read", "2024-01-08"),
        ];
        let groups = group_by_day(&timeline);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].day, day("2024-01-10"));
        assert_eq!(groups[0].events.len(), 2);
        assert_eq!(groups[1].day, day("2024-01-08"));
    }

    #[test]
    fn done_today_and_counts() {
        let timeline = [
            routine_on("1", "a", "Read", "2024-01-10"),
            routine_on("2", "a", "Read", "2024-01-09"),
            routine_on("3", "b", "Run", "2024-01-09"),
        ];
        let today = day("2024-01-10");
        assert!(is_done_today(&timeline, ParentType::Routine, "a", today));
        assert!(!is_done_today(&timeline, ParentType::Routine, "b", today));
        assert!(!is_done_today(&timeline, ParentType::Goal, "a", today));
        assert_eq!(completion_count(&timeline, ParentType::Routine, "a"), 2);
        assert_eq!(todays(&timeline, today).len(), 1);
    }
}
