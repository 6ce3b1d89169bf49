//! The remote goal/routine/activity store.
//!
//! The core never speaks HTTP itself; it talks to a [`RemoteStore`]. The CLI
//! provides an HTTP implementation, tests and simulations use
//! [`MemoryRemote`]. Every call may fail independently, and every call is a
//! point where other work may interleave with the caller.

pub mod memory;

pub use memory::{FaultConfig, MemoryRemote};

use tracing::warn;

use crate::day::DayPolicy;
use crate::error::ErrorCode;
use crate::model::event::events_from_records;
use crate::model::{ActivityRecord, CompletionEvent, EventId, Goal, GoalPatch, NewActivity, Origin, Routine};

/// Failure of a single remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    /// Network failure, timeout or server-side error. Worth retrying later.
    #[error("remote unavailable: {0}")]
    Transient(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Transient(_) => ErrorCode::RemoteUnavailable,
            Self::Unauthorized(_) => ErrorCode::RemoteUnauthorized,
            Self::NotFound(_) => ErrorCode::ItemNotFound,
            Self::Rejected { .. } => ErrorCode::RemoteRejected,
        }
    }
}

/// Operations the core needs from the server.
///
/// Fetches return raw records; [`fetch_server_events`] turns activities into
/// origin-stamped events, [`fetch_goals_or_empty`] and friends degrade
/// failures to empty lists.
pub trait RemoteStore: Send + Sync {
    fn fetch_goals(&self) -> Result<Vec<Goal>, RemoteError>;

    fn fetch_routines(&self) -> Result<Vec<Routine>, RemoteError>;

    fn fetch_activities(&self) -> Result<Vec<ActivityRecord>, RemoteError>;

    /// Record a completion. Returns the stored record with its server id.
    fn create_activity(&self, activity: &NewActivity) -> Result<ActivityRecord, RemoteError>;

    fn delete_activity(&self, id: &EventId) -> Result<(), RemoteError>;

    fn update_goal(&self, id: &str, patch: &GoalPatch) -> Result<Goal, RemoteError>;

    fn complete_goal(&self, id: &str) -> Result<Goal, RemoteError>;

    fn delete_goal(&self, id: &str) -> Result<(), RemoteError>;

    fn delete_routine(&self, id: &str) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// Degrading fetch helpers
// ---------------------------------------------------------------------------

/// Server activities as events stamped [`Origin::Server`].
pub fn fetch_server_events(
    remote: &dyn RemoteStore,
    policy: DayPolicy,
) -> Result<Vec<CompletionEvent>, RemoteError> {
    let records = remote.fetch_activities()?;
    Ok(events_from_records(records, Origin::Server, policy))
}

#[must_use]
pub fn fetch_goals_or_empty(remote: &dyn RemoteStore) -> Vec<Goal> {
    remote.fetch_goals().unwrap_or_else(|err| {
        warn!(error = %err, "could not fetch goals, treating as empty");
        Vec::new()
    })
}

#[must_use]
pub fn fetch_routines_or_empty(remote: &dyn RemoteStore) -> Vec<Routine> {
    remote.fetch_routines().unwrap_or_else(|err| {
        warn!(error = %err, "could not fetch routines, treating as empty");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(RemoteError::Transient("timeout".into()).is_transient());
        assert!(!RemoteError::Unauthorized("bad token".into()).is_transient());
        assert!(!RemoteError::NotFound("x".into()).is_transient());
        assert!(
            !RemoteError::Rejected {
                status: 400,
                message: "nope".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn codes_map() {
        assert_eq!(
            RemoteError::Transient(String::new()).code(),
            ErrorCode::RemoteUnavailable
        );
        assert_eq!(
            RemoteError::Unauthorized(String::new()).code(),
            ErrorCode::RemoteUnauthorized
        );
        assert_eq!(RemoteError::NotFound(String::new()).code(), ErrorCode::ItemNotFound);
    }

    #[test]
    fn failed_fetch_degrades_to_empty() {
        let remote = MemoryRemote::new();
        remote.set_fail_fetches(true);
        assert!(fetch_server_events(&remote, DayPolicy::Utc).is_err());
        assert!(fetch_goals_or_empty(&remote).is_empty());
        assert!(fetch_routines_or_empty(&remote).is_empty());
    }
}
