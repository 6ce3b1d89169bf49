//! Completion events: the immutable fact "item X was completed at time T".
//!
//! Events reach the core from two places: the remote activity API and the
//! local cache. Both speak the same JSON record shape ([`ActivityRecord`]),
//! which is parsed leniently and then stamped with an explicit [`Origin`].
//! Nothing downstream inspects identifier text to decide where an event
//! came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

use crate::day::{DayKey, DayPolicy};
use crate::model::item::IMPLICIT_GOAL_PREFIX;
use crate::model::parse_timestamp;

/// The kind of item a completion belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentType {
    Goal,
    Routine,
}

impl ParentType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Routine => "routine",
        }
    }
}

impl fmt::Display for ParentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "goal" => Ok(Self::Goal),
            "routine" => Ok(Self::Routine),
            other => Err(format!("unknown item type '{other}': expected goal or routine")),
        }
    }
}

/// Where an event was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Recorded on this device, not (yet) confirmed by the server.
    Local,
    /// Assigned an identifier by the server.
    #[default]
    Server,
}

impl Origin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque event identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh identifier for a locally recorded event.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single completion of a goal or routine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "ActivityRecord")]
pub struct CompletionEvent {
    pub id: EventId,
    pub parent_type: ParentType,
    /// `None` only for malformed legacy records.
    pub parent_ref: Option<String>,
    pub title: String,
    /// `None` when the source timestamp was missing or unparseable.
    pub completed_at: Option<DateTime<Utc>>,
    pub day_key: DayKey,
    pub origin: Origin,
}

impl CompletionEvent {
    /// A new local-origin completion of `parent_ref` at `completed_at`.
    pub fn local(
        parent_type: ParentType,
        parent_ref: impl Into<String>,
        title: impl Into<String>,
        completed_at: DateTime<Utc>,
        policy: DayPolicy,
    ) -> Self {
        Self {
            id: EventId::generate(),
            parent_type,
            parent_ref: Some(parent_ref.into()),
            title: title.into(),
            completed_at: Some(completed_at),
            day_key: policy.day_key(&completed_at),
            origin: Origin::Local,
        }
    }

    /// Dedup key used by the merge engine.
    #[must_use]
    pub fn merge_key(&self) -> MergeKey {
        let anchor = self.parent_ref.as_ref().map_or_else(
            || Anchor::Orphan(self.id.clone()),
            |parent| Anchor::Parent(parent.clone()),
        );
        MergeKey {
            parent_type: self.parent_type,
            anchor,
            day_key: self.day_key,
        }
    }

    /// True when this event completes `parent_ref` of the given type.
    #[must_use]
    pub fn belongs_to(&self, parent_type: ParentType, parent_ref: &str) -> bool {
        self.parent_type == parent_type && self.parent_ref.as_deref() == Some(parent_ref)
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }

    /// The goal id when this is the implicit completion of a completed goal.
    #[must_use]
    pub fn implicit_goal(&self) -> Option<&str> {
        if self.parent_type != ParentType::Goal {
            return None;
        }
        let goal_id = self.id.as_str().strip_prefix(IMPLICIT_GOAL_PREFIX)?;
        (self.parent_ref.as_deref() == Some(goal_id)).then_some(goal_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Anchor {
    Parent(String),
    /// Events without a parent reference never collide with anything else.
    Orphan(EventId),
}

/// `(parent_type, parent_ref, day_key)` identity of a completion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    parent_type: ParentType,
    anchor: Anchor,
    day_key: DayKey,
}

/// JSON shape of an activity, shared by the remote API and the cache files.
///
/// Every field is optional so a single bad record never poisons a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub parent_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

impl ActivityRecord {
    /// Convert into a [`CompletionEvent`] stamped with `origin`.
    ///
    /// Returns `None` when the record has no recognizable item type, or when
    /// neither a `dateString` nor a usable timestamp places it on a day. A
    /// missing `completedAt` falls back to `createdAt`.
    #[must_use]
    pub fn into_event(self, origin: Origin, policy: DayPolicy) -> Option<CompletionEvent> {
        let parent_type = self.parent_type.as_deref()?.parse::<ParentType>().ok()?;
        let completed_at = parse_timestamp(self.completed_at.as_deref())
            .or_else(|| parse_timestamp(self.created_at.as_deref()));
        let day_key = self
            .date_string
            .as_deref()
            .and_then(|raw| raw.parse::<DayKey>().ok())
            .or_else(|| completed_at.as_ref().map(|at| policy.day_key(at)))?;

        Some(CompletionEvent {
            id: self.id.map_or_else(EventId::generate, EventId::new),
            parent_type,
            parent_ref: self.ref_id.filter(|r| !r.is_empty()),
            title: self.title.unwrap_or_default(),
            completed_at,
            day_key,
            origin,
        })
    }
}

impl From<CompletionEvent> for ActivityRecord {
    fn from(event: CompletionEvent) -> Self {
        Self {
            id: Some(event.id.0),
            parent_type: Some(event.parent_type.as_str().to_string()),
            title: Some(event.title),
            ref_id: event.parent_ref,
            date_string: Some(event.day_key.to_string()),
            completed_at: event.completed_at.map(|at| at.to_rfc3339()),
            created_at: None,
            origin: Some(event.origin),
        }
    }
}

/// Convert a batch of records, dropping the ones that cannot be placed.
pub fn events_from_records(
    records: Vec<ActivityRecord>,
    origin: Origin,
    policy: DayPolicy,
) -> Vec<CompletionEvent> {
    let total = records.len();
    let events: Vec<CompletionEvent> = records
        .into_iter()
        .filter_map(|record| record.into_event(origin, policy))
        .collect();
    if events.len() < total {
        tracing::warn!(
            dropped = total - events.len(),
            %origin,
            "dropped activity records without a usable type or day"
        );
    }
    events
}

/// Request body for recording a completion on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub parent_type: ParentType,
    pub ref_id: String,
    pub title: String,
    pub completed_at: DateTime<Utc>,
    pub date_string: DayKey,
}

impl NewActivity {
    pub fn new(
        parent_type: ParentType,
        ref_id: impl Into<String>,
        title: impl Into<String>,
        completed_at: DateTime<Utc>,
        policy: DayPolicy,
    ) -> Self {
        Self {
            parent_type,
            ref_id: ref_id.into(),
            title: title.into(),
            completed_at,
            date_string: policy.day_key(&completed_at),
        }
    }

    /// The same completion as a local-origin event, for offline fallback.
    #[must_use]
    pub fn to_local_event(&self) -> CompletionEvent {
        CompletionEvent {
            id: EventId::generate(),
            parent_type: self.parent_type,
            parent_ref: Some(self.ref_id.clone()),
            title: self.title.clone(),
            completed_at: Some(self.completed_at),
            day_key: self.date_string,
            origin: Origin::Local,
        }
    }
}
