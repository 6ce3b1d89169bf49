//! `cad complete-goal` — flag a goal as completed.

use std::io::Write;

use cadence_core::reconcile::Controller;
use clap::Args;

use crate::output::{OutputMode, fail, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct CompleteGoalArgs {
    /// Goal identifier.
    pub id: String,
}

pub fn run_complete_goal(
    args: &CompleteGoalArgs,
    output: OutputMode,
    controller: &Controller,
) -> anyhow::Result<()> {
    let goal = controller
        .complete_goal(&args.id)
        .map_err(|err| fail(output, &err))?;

    render_mode(
        output,
        &goal,
        |g, w| writeln!(w, "completed\t{}\t{}", g.id, g.title),
        |g, w| {
            pretty_kv(w, "Completed", &g.title)?;
            if let Some(at) = g.completed_at {
                pretty_kv(w, "At", at.format("%Y-%m-%d %H:%M UTC").to_string())?;
            }
            Ok(())
        },
    )
}
