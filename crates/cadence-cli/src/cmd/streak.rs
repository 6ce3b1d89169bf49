//! `cad streak` — consecutive days with at least one completion.

use std::io::Write;

use cadence_core::consistency::todays;
use cadence_core::day::DayKey;
use cadence_core::reconcile::Controller;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;

use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug, Default)]
pub struct StreakArgs {}

#[derive(Debug, Serialize)]
struct StreakView {
    today: DayKey,
    streak: u32,
    done_today: usize,
    server_reachable: bool,
}

pub fn run_streak(
    _args: &StreakArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let snapshot = controller.refresh(now);
    let view = StreakView {
        today: snapshot.today,
        streak: snapshot.streak,
        done_today: todays(&snapshot.timeline, snapshot.today).len(),
        server_reachable: snapshot.server_reachable,
    };

    render_mode(
        output,
        &view,
        |v, w| writeln!(w, "{}", v.streak),
        |v, w| {
            pretty_kv(w, "Streak", format!("{} day(s)", v.streak))?;
            pretty_kv(w, "Today", format!("{} completion(s)", v.done_today))?;
            if v.done_today == 0 && v.streak > 0 {
                writeln!(w, "Complete something today to extend the streak.")?;
            }
            if !v.server_reachable {
                writeln!(w, "! Server unreachable; counted local entries only.")?;
            }
            Ok(())
        },
    )
}
