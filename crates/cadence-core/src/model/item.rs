use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::day::DayPolicy;
use crate::model::event::{CompletionEvent, EventId, Origin, ParentType};
use crate::model::lenient_timestamp;

/// Id prefix of the events synthesized by [`Goal::implicit_completion`].
pub(crate) const IMPLICIT_GOAL_PREFIX: &str = "goal:";

/// A long-term goal. Completion is a flag on the goal itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Goal {
    /// The implicit completion event of a completed goal.
    ///
    /// Uses `completed_at`, falling back to `created_at`. `None` for open
    /// goals and for completed goals carrying neither timestamp.
    #[must_use]
    pub fn implicit_completion(&self, policy: DayPolicy) -> Option<CompletionEvent> {
        if !self.completed {
            return None;
        }
        let at = self.completed_at.or(self.created_at)?;
        Some(CompletionEvent {
            id: EventId::new(format!("{IMPLICIT_GOAL_PREFIX}{}", self.id)),
            parent_type: ParentType::Goal,
            parent_ref: Some(self.id.clone()),
            title: self.title.clone(),
            completed_at: Some(at),
            day_key: policy.day_key(&at),
            origin: Origin::Server,
        })
    }
}

/// A recurring daily routine. Completions are explicit events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    /// Scheduled start, `HH:MM` in 24-hour time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Partial update of a goal's completion flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalPatch {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl GoalPatch {
    /// Patch that clears a goal's completion.
    #[must_use]
    pub const fn reopen() -> Self {
        Self {
            completed: false,
            completed_at: None,
        }
    }
}

/// Reference to a goal or routine by type and identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemRef {
    pub parent_type: ParentType,
    pub id: String,
}

impl ItemRef {
    pub fn goal(id: impl Into<String>) -> Self {
        Self {
            parent_type: ParentType::Goal,
            id: id.into(),
        }
    }

    pub fn routine(id: impl Into<String>) -> Self {
        Self {
            parent_type: ParentType::Routine,
            id: id.into(),
        }
    }

    /// True when `event` is a completion of this item.
    #[must_use]
    pub fn owns(&self, event: &CompletionEvent) -> bool {
        event.belongs_to(self.parent_type, &self.id)
    }
}
