//! Consecutive-day streaks over a merged timeline.
//!
//! The streak is the length of the contiguous run of days with at least one
//! completion, ending today. If nothing has been logged today yet the run
//! may end yesterday instead, so an unbroken streak is not reported as zero
//! just because the day is not over. Days after `today` are ignored.

use std::collections::HashSet;

use crate::day::DayKey;
use crate::model::CompletionEvent;

/// Streak length for `timeline` as seen on `today`.
#[must_use]
pub fn compute_streak(timeline: &[CompletionEvent], today: DayKey) -> u32 {
    let days: HashSet<DayKey> = timeline.iter().map(|event| event.day_key).collect();
    streak_from_days(&days, today)
}

/// Streak length over an already materialized set of active days.
#[must_use]
pub fn streak_from_days(days: &HashSet<DayKey>, today: DayKey) -> u32 {
    let mut cursor = if days.contains(&today) {
        today
    } else {
        today.pred()
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        let prev = cursor.pred();
        if prev == cursor {
            break;
        }
        cursor = prev;
    }
    streak
}
