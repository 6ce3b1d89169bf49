pub mod clear;
pub mod complete;
pub mod consistency;
pub mod done;
pub mod manage;
pub mod routines;
pub mod streak;
pub mod sync;
pub mod timeline;
pub mod undo;

use cadence_core::model::{ItemRef, ParentType};
use cadence_core::reconcile::Controller;
use cadence_core::remote::{fetch_goals_or_empty, fetch_routines_or_empty};
use clap::Args;

/// A goal or routine addressed on the command line.
#[derive(Args, Debug, Clone)]
pub struct ItemArgs {
    /// Item type: goal or routine.
    pub kind: ParentType,

    /// Item identifier as assigned by the server.
    pub id: String,
}

impl ItemArgs {
    pub fn item_ref(&self) -> ItemRef {
        ItemRef {
            parent_type: self.kind,
            id: self.id.clone(),
        }
    }
}

/// Display title of an item, falling back to its id when it cannot be found.
///
/// Routines are also looked up in the cached routine list so titles survive
/// an unreachable server.
pub fn item_title(controller: &Controller, kind: ParentType, id: &str) -> String {
    let found = match kind {
        ParentType::Goal => fetch_goals_or_empty(controller.remote())
            .into_iter()
            .find(|goal| goal.id == id)
            .map(|goal| goal.title),
        ParentType::Routine => fetch_routines_or_empty(controller.remote())
            .into_iter()
            .find(|routine| routine.id == id)
            .or_else(|| {
                controller
                    .cache()
                    .routines()
                    .into_iter()
                    .find(|routine| routine.id == id)
            })
            .map(|routine| routine.title),
    };
    found.unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::cache::CacheService;
    use cadence_core::day::DayPolicy;
    use cadence_core::model::Routine;
    use cadence_core::reconcile::RecordingNotifier;
    use cadence_core::remote::MemoryRemote;
    use clap::Parser;
    use std::sync::Arc;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        item: ItemArgs,
    }

    fn routine(id: &str, title: &str) -> Routine {
        Routine {
            id: id.to_string(),
            title: title.to_string(),
            start_time: None,
            duration_minutes: 15,
            created_at: None,
        }
    }

    #[test]
    fn item_args_parse_kind_and_id() {
        let w = Wrapper::parse_from(["test", "routine", "r1"]);
        assert_eq!(w.item.item_ref(), ItemRef::routine("r1"));
        assert!(Wrapper::try_parse_from(["test", "habit", "r1"]).is_err());
    }

    #[test]
    fn title_falls_back_to_cache_then_id() {
        let remote = Arc::new(MemoryRemote::new());
        let controller = Controller::new(
            CacheService::in_memory(DayPolicy::Utc),
            remote.clone(),
            Arc::new(RecordingNotifier::new()),
        );
        remote.add_routine(routine("r1", "Stretch"));
        assert_eq!(item_title(&controller, ParentType::Routine, "r1"), "Stretch");

        controller
            .cache()
            .write_routines(&[routine("r2", "Read")])
            .expect("cache routines");
        remote.set_fail_fetches(true);
        assert_eq!(item_title(&controller, ParentType::Routine, "r2"), "Read");
        assert_eq!(item_title(&controller, ParentType::Goal, "g9"), "g9");
    }
}
