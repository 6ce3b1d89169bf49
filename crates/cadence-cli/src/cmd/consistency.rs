//! `cad consistency` — distinct completion days per goal and routine.

use std::io::{self, Write};

use cadence_core::consistency::{ConsistencyFilter, ConsistencyRecord};
use cadence_core::reconcile::Controller;
use chrono::{DateTime, Utc};
use clap::Args;

use crate::output::{OutputMode, Renderable, pretty_section, render_list};

#[derive(Args, Debug)]
pub struct ConsistencyArgs {
    /// Which items to show: all, goal, or routine.
    #[arg(long, short, default_value = "all")]
    pub filter: ConsistencyFilter,
}

fn last_day(record: &ConsistencyRecord) -> String {
    record
        .recent_days
        .first()
        .map_or_else(|| "-".to_string(), ToString::to_string)
}

impl Renderable for ConsistencyRecord {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{:>4}d  {:<8} {}  (last: {})",
            self.days_count,
            self.parent_type.as_str(),
            self.title,
            last_day(self)
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}\t{}\t{}\t{}\t{}",
            self.days_count,
            self.parent_type,
            self.parent_ref,
            self.title,
            last_day(self)
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["DAYS", "TYPE", "REF", "TITLE", "LAST"]
    }
}

pub fn run_consistency(
    args: &ConsistencyArgs,
    output: OutputMode,
    controller: &Controller,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let records = controller.consistency(now, args.filter);

    if output.is_pretty() {
        let mut out = io::stdout().lock();
        pretty_section(&mut out, "Consistency")?;
        if records.is_empty() {
            writeln!(out, "No completions yet.")?;
            return Ok(());
        }
    }
    render_list(&records, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::write_list;
    use cadence_core::day::DayKey;
    use cadence_core::model::ParentType;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ConsistencyArgs,
    }

    #[test]
    fn filter_defaults_to_all_and_accepts_plurals() {
        assert_eq!(Wrapper::parse_from(["test"]).args.filter, ConsistencyFilter::All);
        assert_eq!(
            Wrapper::parse_from(["test", "--filter", "routines"]).args.filter,
            ConsistencyFilter::Routine
        );
        assert!(Wrapper::try_parse_from(["test", "--filter", "habits"]).is_err());
    }

    #[test]
    fn rows_show_count_and_last_day() {
        let record = ConsistencyRecord {
            parent_type: ParentType::Routine,
            parent_ref: "r1".into(),
            title: "Stretch".into(),
            days_count: 3,
            recent_days: vec![
                "2024-03-10".parse::<DayKey>().expect("day"),
                "2024-03-08".parse::<DayKey>().expect("day"),
            ],
        };
        let mut buf = Vec::new();
        write_list(&mut buf, &[record], OutputMode::Text).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text.lines().nth(1), Some("3\troutine\tr1\tStretch\t2024-03-10"));
    }
}
