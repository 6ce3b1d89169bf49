//! `cad timeline` — merged completion history, grouped by day.

use std::io::{self, Write};

use cadence_core::consistency::{group_by_day, summarize};
use cadence_core::model::CompletionEvent;
use cadence_core::reconcile::{Controller, Snapshot};
use chrono::{DateTime, Duration, Utc};
use clap::Args;

use crate::output::{OutputMode, Renderable, pretty_kv, pretty_section, render_mode, write_list};

#[derive(Args, Debug, Default)]
pub struct TimelineArgs {
    /// Only show entries from the last N days, today included.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub days: Option<u32>,
}

fn clock(event: &CompletionEvent) -> String {
    event
        .completed_at
        .map_or_else(|| "--:--".to_string(), |at| at.format("%H:%M").to_string())
}

impl Renderable for CompletionEvent {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let marker = if self.is_local() { "  (not synced)" } else { "" };
        writeln!(
            w,
            "  {}  {:<8} {}{marker}",
            clock(self),
            self.parent_type.as_str(),
            self.title
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.day_key,
            clock(self),
            self.parent_type,
            self.parent_ref.as_deref().unwrap_or("-"),
            self.title,
            self.origin
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["DAY", "TIME", "TYPE", "REF", "TITLE", "ORIGIN"]
    }
}

/// Drop entries older than the last `days` days and recount.
fn restrict_to_recent(snapshot: &mut Snapshot, days: u32) {
    let Some(earliest) = snapshot
        .today
        .date()
        .checked_sub_signed(Duration::days(i64::from(days.saturating_sub(1))))
    else {
        return;
    };
    snapshot
        .timeline
        .retain(|event| event.day_key.date() >= earliest);
    snapshot.summary = summarize(&snapshot.timeline);
}

fn write_pretty(snapshot: &Snapshot, w: &mut dyn Write) -> io::Result<()> {
    pretty_section(w, "Timeline")?;
    pretty_kv(w, "Today", snapshot.today.to_string())?;
    pretty_kv(w, "Streak", format!("{} day(s)", snapshot.streak))?;
    pretty_kv(
        w,
        "Entries",
        format!(
            "{} ({} goals, {} routines)",
            snapshot.summary.total, snapshot.summary.goals, snapshot.summary.routines
        ),
    )?;
    if !snapshot.server_reachable {
        writeln!(w, "! Server unreachable; showing locally recorded entries only.")?;
    }

    if snapshot.timeline.is_empty() {
        writeln!(w)?;
        writeln!(w, "No completions yet.")?;
        return Ok(());
    }
    for group in group_by_day(&snapshot.timeline) {
        writeln!(w)?;
        writeln!(w, "{}", group.day)?;
        write_list(w, &group.events, OutputMode::Pretty)?;
    }
    Ok(())
}

pub fn run_timeline(
    args: &TimelineArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let mut snapshot = controller.refresh(now);
    if let Some(days) = args.days {
        restrict_to_recent(&mut snapshot, days);
    }

    render_mode(
        output,
        &snapshot,
        |s, w| write_list(w, &s.timeline, OutputMode::Text),
        write_pretty,
    )
}
