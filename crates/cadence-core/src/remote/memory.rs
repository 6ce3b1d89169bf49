use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;

use super::{RemoteError, RemoteStore};
use crate::model::{ActivityRecord, EventId, Goal, GoalPatch, NewActivity, Routine};

/// Fault injection switches for [`MemoryRemote`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultConfig {
    /// Every fetch fails with a transient error.
    pub fail_fetches: bool,
    /// Every `create_activity` fails with a transient error.
    pub fail_creates: bool,
    /// Every call fails with `Unauthorized`.
    pub unauthorized: bool,
    /// Activity ids whose delete fails with a transient error.
    pub failing_deletes: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct State {
    goals: Vec<Goal>,
    routines: Vec<Routine>,
    activities: Vec<ActivityRecord>,
    next_id: u64,
    faults: FaultConfig,
    delete_attempts: usize,
}

impl State {
    fn check_auth(&self) -> Result<(), RemoteError> {
        if self.faults.unauthorized {
            return Err(RemoteError::Unauthorized("token rejected".to_string()));
        }
        Ok(())
    }

    fn check_fetch(&self) -> Result<(), RemoteError> {
        self.check_auth()?;
        if self.faults.fail_fetches {
            return Err(RemoteError::Transient("injected fetch failure".to_string()));
        }
        Ok(())
    }

    fn mint_id(&mut self) -> String {
        self.next_id += 1;
        format!("srv-{}", self.next_id)
    }
}

/// In-process [`RemoteStore`] with fault injection.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_goal(&self, goal: Goal) {
        self.state().goals.push(goal);
    }

    pub fn add_routine(&self, routine: Routine) {
        self.state().routines.push(routine);
    }

    /// Store an activity directly, bypassing faults. Returns its server id.
    pub fn seed_activity(&self, activity: &NewActivity) -> EventId {
        let mut state = self.state();
        let id = state.mint_id();
        state.activities.push(record_for(&id, activity));
        EventId::new(id)
    }

    #[must_use]
    pub fn activity_count(&self) -> usize {
        self.state().activities.len()
    }

    #[must_use]
    pub fn goal(&self, id: &str) -> Option<Goal> {
        self.state().goals.iter().find(|goal| goal.id == id).cloned()
    }

    #[must_use]
    pub fn routine_count(&self) -> usize {
        self.state().routines.len()
    }

    /// Number of `delete_activity` calls received, failed ones included.
    #[must_use]
    pub fn delete_attempts(&self) -> usize {
        self.state().delete_attempts
    }

    pub fn set_faults(&self, faults: FaultConfig) {
        self.state().faults = faults;
    }

    pub fn set_fail_fetches(&self, fail: bool) {
        self.state().faults.fail_fetches = fail;
    }

    pub fn set_fail_creates(&self, fail: bool) {
        self.state().faults.fail_creates = fail;
    }

    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.state().faults.unauthorized = unauthorized;
    }

    pub fn fail_delete_of(&self, id: &EventId) {
        self.state()
            .faults
            .failing_deletes
            .insert(id.as_str().to_string());
    }
}

fn record_for(id: &str, activity: &NewActivity) -> ActivityRecord {
    ActivityRecord {
        id: Some(id.to_string()),
        parent_type: Some(activity.parent_type.as_str().to_string()),
        title: Some(activity.title.clone()),
        ref_id: Some(activity.ref_id.clone()),
        date_string: Some(activity.date_string.to_string()),
        completed_at: Some(activity.completed_at.to_rfc3339()),
        created_at: Some(activity.completed_at.to_rfc3339()),
        origin: None,
    }
}

impl RemoteStore for MemoryRemote {
    fn fetch_goals(&self) -> Result<Vec<Goal>, RemoteError> {
        let state = self.state();
        state.check_fetch()?;
        Ok(state.goals.clone())
    }

    fn fetch_routines(&self) -> Result<Vec<Routine>, RemoteError> {
        let state = self.state();
        state.check_fetch()?;
        Ok(state.routines.clone())
    }

    fn fetch_activities(&self) -> Result<Vec<ActivityRecord>, RemoteError> {
        let state = self.state();
        state.check_fetch()?;
        Ok(state.activities.clone())
    }

    fn create_activity(&self, activity: &NewActivity) -> Result<ActivityRecord, RemoteError> {
        let mut state = self.state();
        state.check_auth()?;
        if state.faults.fail_creates {
            return Err(RemoteError::Transient("injected create failure".to_string()));
        }
        let id = state.mint_id();
        let record = record_for(&id, activity);
        state.activities.push(record.clone());
        Ok(record)
    }

    fn delete_activity(&self, id: &EventId) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.delete_attempts += 1;
        state.check_auth()?;
        if state.faults.failing_deletes.contains(id.as_str()) {
            return Err(RemoteError::Transient(format!("injected delete failure for {id}")));
        }
        let before = state.activities.len();
        state
            .activities
            .retain(|record| record.id.as_deref() != Some(id.as_str()));
        if state.activities.len() == before {
            return Err(RemoteError::NotFound(format!("activity {id}")));
        }
        Ok(())
    }

    fn update_goal(&self, id: &str, patch: &GoalPatch) -> Result<Goal, RemoteError> {
        let mut state = self.state();
        state.check_auth()?;
        let goal = state
            .goals
            .iter_mut()
            .find(|goal| goal.id == id)
            .ok_or_else(|| RemoteError::NotFound(format!("goal {id}")))?;
        goal.completed = patch.completed;
        goal.completed_at = patch.completed_at;
        Ok(goal.clone())
    }

    fn complete_goal(&self, id: &str) -> Result<Goal, RemoteError> {
        let mut state = self.state();
        state.check_auth()?;
        let goal = state
            .goals
            .iter_mut()
            .find(|goal| goal.id == id)
            .ok_or_else(|| RemoteError::NotFound(format!("goal {id}")))?;
        if goal.completed {
            return Err(RemoteError::Rejected {
                status: 400,
                message: "goal already completed".to_string(),
            });
        }
        goal.completed = true;
        goal.completed_at = Some(Utc::now());
        Ok(goal.clone())
    }

    fn delete_goal(&self, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.check_auth()?;
        let before = state.goals.len();
        state.goals.retain(|goal| goal.id != id);
        if state.goals.len() == before {
            return Err(RemoteError::NotFound(format!("goal {id}")));
        }
        Ok(())
    }

    fn delete_routine(&self, id: &str) -> Result<(), RemoteError> {
        let mut state = self.state();
        state.check_auth()?;
        let before = state.routines.len();
        state.routines.retain(|routine| routine.id != id);
        if state.routines.len() == before {
            return Err(RemoteError::NotFound(format!("routine {id}")));
        }
        Ok(())
    }
}
