//! `cad clear-item` and `cad delete-item` — per-item history management.

use std::io::Write;

use cadence_core::model::ParentType;
use cadence_core::reconcile::{Controller, ItemCleanup, ManageOutcome};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::cmd::ItemArgs;
use crate::output::{CliError, OutputMode, fail, pretty_kv, render_error, render_mode};

#[derive(Args, Debug)]
pub struct ClearItemArgs {
    #[command(flatten)]
    pub item: ItemArgs,
}

#[derive(Args, Debug)]
pub struct DeleteItemArgs {
    #[command(flatten)]
    pub item: ItemArgs,

    /// Confirm deletion of the item and its history.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Serialize)]
struct ManageView<'a> {
    action: &'static str,
    #[serde(rename = "type")]
    parent_type: ParentType,
    id: &'a str,
    #[serde(flatten)]
    cleanup: ItemCleanup,
    remaining: usize,
}

fn report(
    action: &'static str,
    outcome: ManageOutcome,
    output: OutputMode,
) -> anyhow::Result<()> {
    let cleanup = outcome.result.map_err(|err| fail(output, &err))?;
    let view = ManageView {
        action,
        parent_type: outcome.item.parent_type,
        id: &outcome.item.id,
        cleanup,
        remaining: outcome.snapshot.timeline.len(),
    };

    render_mode(
        output,
        &view,
        |v, w| {
            writeln!(
                w,
                "{}\t{}\t{}\t{}\t{}",
                v.action,
                v.id,
                v.cleanup.local_removed,
                v.cleanup.remote_removed,
                v.cleanup.remote_failed
            )
        },
        |v, w| {
            pretty_kv(w, "Item", format!("{} {}", v.parent_type, v.id))?;
            pretty_kv(w, "Local", format!("{} removed", v.cleanup.local_removed))?;
            let server = if v.cleanup.fetch_failed {
                "unreachable, history left in place".to_string()
            } else {
                format!(
                    "{} removed, {} failed",
                    v.cleanup.remote_removed, v.cleanup.remote_failed
                )
            };
            pretty_kv(w, "Server", server)?;
            pretty_kv(w, "Remaining", format!("{} entries", v.remaining))
        },
    )
}

pub fn run_clear_item(
    args: &ClearItemArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let outcome = controller.clear_item_history(&args.item.item_ref(), now);
    report("cleared", outcome, output)
}

pub fn run_delete_item(
    args: &DeleteItemArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    if !args.yes {
        let err = CliError::needs_confirmation(format!(
            "delete-item removes {} '{}' and all of its completions",
            args.item.kind, args.item.id
        ));
        render_error(output, &err)?;
        anyhow::bail!("{}", err.message);
    }

    let outcome = controller.delete_item(&args.item.item_ref(), now);
    report("deleted", outcome, output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: DeleteItemArgs,
    }

    #[test]
    fn delete_args_parse() {
        let w = Wrapper::parse_from(["test", "routine", "r1", "--yes"]);
        assert_eq!(w.args.item.kind, ParentType::Routine);
        assert!(w.args.yes);
    }

    #[test]
    fn view_flattens_cleanup_counts() {
        let view = ManageView {
            action: "cleared",
            parent_type: ParentType::Goal,
            id: "g1",
            cleanup: ItemCleanup {
                local_removed: 1,
                remote_removed: 2,
                remote_failed: 0,
                fetch_failed: false,
            },
            remaining: 4,
        };
        let json = serde_json::to_value(&view).expect("json");
        assert_eq!(json["type"], "goal");
        assert_eq!(json["remote_removed"], 2);
        assert_eq!(json["fetch_failed"], false);
        assert_eq!(json["remaining"], 4);
    }
}
