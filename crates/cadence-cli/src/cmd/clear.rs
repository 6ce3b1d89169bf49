//! `cad clear-history` — wipe every recorded completion.
//!
//! The local cache is emptied first; server deletions follow and are
//! tallied once they all finish.

use std::io::Write;

use cadence_core::reconcile::Controller;
use chrono::{DateTime, Utc};
use clap::Args;

use crate::output::{CliError, OutputMode, fail, pretty_kv, render_error, render_mode};

#[derive(Args, Debug)]
pub struct ClearHistoryArgs {
    /// Confirm that every completion, local and on the server, is removed.
    #[arg(long)]
    pub yes: bool,
}

pub fn run_clear_history(
    args: &ClearHistoryArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    if !args.yes {
        let err = CliError::needs_confirmation(
            "clear-history removes every completion, locally and on the server",
        );
        render_error(output, &err)?;
        anyhow::bail!("{}", err.message);
    }

    let previous = controller.refresh(now).timeline;
    let run = controller
        .begin_clear(&previous)
        .map_err(|err| fail(output, &err))?;
    tracing::info!(
        pending = run.optimistic_timeline().len(),
        "local history cleared, removing server entries"
    );

    let outcome = run.sync_remote().settle(now);

    render_mode(
        output,
        &outcome,
        |o, w| writeln!(w, "{}", o.summary()),
        |o, w| {
            pretty_kv(w, "Removed", o.removed.to_string())?;
            pretty_kv(w, "Failed", o.failed.to_string())?;
            pretty_kv(w, "Remaining", o.snapshot.timeline.len().to_string())?;
            if o.fetch_failed {
                writeln!(w, "! Server history was not cleared; run again once it is reachable.")?;
            }
            Ok(())
        },
    )
}
