//! `cad routines` — routine list with today's status.

use std::io::{self, Write};

use cadence_core::reconcile::{Controller, RoutineBoard, RoutineStatus};
use chrono::{DateTime, Utc};
use clap::Args;

use crate::output::{OutputMode, pretty_section, render_mode};

#[derive(Args, Debug, Default)]
pub struct RoutinesArgs {
    /// Case-insensitive title search.
    #[arg(long, short)]
    pub search: Option<String>,
}

fn schedule(status: &RoutineStatus) -> String {
    let start = status.routine.start_time.as_deref().unwrap_or("--:--");
    format!("{start} · {} min", status.routine.duration_minutes)
}

fn write_text(board: &RoutineBoard, w: &mut dyn Write) -> io::Result<()> {
    for status in &board.routines {
        writeln!(
            w,
            "{}\t{}\t{}\t{}",
            status.routine.id,
            if status.done_today { "done" } else { "open" },
            status.completions,
            status.routine.title
        )?;
    }
    Ok(())
}

fn write_pretty(board: &RoutineBoard, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, &format!("Routines for {}", board.today))?;
    if board.from_cache {
        writeln!(w, "! Server unreachable; showing the last known routine list.")?;
    }
    if board.routines.is_empty() {
        writeln!(w, "No routines found.")?;
        return Ok(());
    }
    for status in &board.routines {
        let check = if status.done_today { "x" } else { " " };
        writeln!(
            w,
            "[{check}] {:<28} {}  ({} total)",
            status.routine.title,
            schedule(status),
            status.completions
        )?;
    }
    Ok(())
}

pub fn run_routines(
    args: &RoutinesArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let board = controller.routine_board(now, args.search.as_deref());
    render_mode(output, &board, write_text, write_pretty)
}
