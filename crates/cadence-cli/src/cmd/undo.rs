//! `cad undo` — remove today's completion of a goal or routine.

use std::io::Write;

use cadence_core::model::CompletionEvent;
use cadence_core::reconcile::{Controller, UndoOutcome};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::cmd::ItemArgs;
use crate::output::{OutputMode, fail, render};

#[derive(Args, Debug)]
pub struct UndoArgs {
    #[command(flatten)]
    pub item: ItemArgs,
}

#[derive(Debug, Serialize)]
struct UndoView {
    undone: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<CompletionEvent>,
    remaining_today: usize,
}

pub fn run_undo(
    args: &UndoArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let snapshot = controller.refresh(now);
    let mut timeline = snapshot.timeline;
    let outcome = controller
        .undo_today(args.item.kind, &args.item.id, &mut timeline, now)
        .map_err(|err| fail(output, &err))?;

    let remaining_today = timeline
        .iter()
        .filter(|event| event.day_key == snapshot.today)
        .count();
    let view = match outcome {
        UndoOutcome::Undone(event) => UndoView {
            undone: true,
            event: Some(event),
            remaining_today,
        },
        UndoOutcome::NothingToUndo => UndoView {
            undone: false,
            event: None,
            remaining_today,
        },
    };

    render(output, &view, |v, w| {
        if output.is_pretty() {
            if !v.undone {
                writeln!(w, "Nothing recorded today for {} '{}'.", args.item.kind, args.item.id)?;
            }
            return Ok(());
        }
        let status = if v.undone { "undone" } else { "nothing_to_undo" };
        writeln!(w, "{status}\t{}", v.remaining_today)
    })
}
