//! `cad done` — record today's completion of a goal or routine.

use std::io::Write;

use cadence_core::model::CompletionEvent;
use cadence_core::reconcile::{Controller, MarkDoneOutcome};
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::cmd::{ItemArgs, item_title};
use crate::output::{OutputMode, fail, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct DoneArgs {
    #[command(flatten)]
    pub item: ItemArgs,

    /// Title to record. Looked up from the server when omitted.
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
struct DoneView {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<CompletionEvent>,
}

impl From<MarkDoneOutcome> for DoneView {
    fn from(outcome: MarkDoneOutcome) -> Self {
        match outcome {
            MarkDoneOutcome::Recorded(event) => Self {
                status: "recorded",
                event: Some(event),
            },
            MarkDoneOutcome::RecordedLocally(event) => Self {
                status: "recorded_locally",
                event: Some(event),
            },
            MarkDoneOutcome::AlreadyDone => Self {
                status: "already_done",
                event: None,
            },
        }
    }
}

pub fn run_done(
    args: &DoneArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let title = args
        .title
        .clone()
        .unwrap_or_else(|| item_title(controller, args.item.kind, &args.item.id));

    let outcome = controller
        .mark_done(args.item.kind, &args.item.id, &title, now)
        .map_err(|err| fail(output, &err))?;
    let view = DoneView::from(outcome);

    render_mode(
        output,
        &view,
        |v, w| {
            let id = v.event.as_ref().map_or("-", |event| event.id.as_str());
            writeln!(w, "{}\t{id}", v.status)
        },
        |v, w| {
            if let Some(event) = &v.event {
                pretty_kv(w, "Recorded", &event.title)?;
                pretty_kv(w, "Day", event.day_key.to_string())?;
                pretty_kv(w, "Id", event.id.as_str())?;
            }
            Ok(())
        },
    )
}
