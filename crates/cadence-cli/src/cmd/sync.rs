//! `cad sync` — upload completions recorded while the server was unreachable.

use std::io::Write;

use cadence_core::reconcile::Controller;
use chrono::{DateTime, Utc};
use clap::Args;

use crate::output::{OutputMode, fail, pretty_kv, render_mode};

#[derive(Args, Debug, Default)]
pub struct SyncArgs {}

pub fn run_sync(
    _args: &SyncArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let pending = controller.cache().activities().len();
    let report = controller
        .sync_pending(now)
        .map_err(|err| fail(output, &err))?;
    tracing::debug!(pending, "sync finished");

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "{}\t{}\t{}", r.uploaded, r.pruned, r.failed),
        |r, w| {
            pretty_kv(w, "Uploaded", r.uploaded.to_string())?;
            pretty_kv(w, "On server", r.pruned.to_string())?;
            pretty_kv(w, "Failed", r.failed.to_string())
        },
    )
}
