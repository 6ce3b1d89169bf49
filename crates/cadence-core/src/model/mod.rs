pub mod event;
pub mod item;

pub use event::{ActivityRecord, CompletionEvent, EventId, MergeKey, NewActivity, Origin, ParentType};
pub use item::{Goal, GoalPatch, ItemRef, Routine};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parse an RFC 3339 timestamp, `None` when absent or malformed.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Serde helper: an optional timestamp that degrades to `None` instead of
/// failing the whole document when the value is missing or unparseable.
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) => parse_timestamp(Some(&s)),
        _ => None,
    })
}
