//! Daily usage report command.

use std::io::Write;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde::Serialize;

use ht_db::{DailyAppStats, Database};

/// JSON shape of a daily report.
#[derive(Serialize)]
struct Report<'a> {
    date: String,
    total_time: i64,
    apps: &'a [DailyAppStats],
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    date: Option<NaiveDate>,
    json: bool,
) -> Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());
    let stats = db.daily_stats(date)?;
    let total = db.total_time_for_date(date)?;

    if json {
        let report = Report {
            date: date.format("%Y-%m-%d").to_string(),
            total_time: total,
            apps: &stats,
        };
        serde_json::to_writer_pretty(&mut *writer, &report)?;
        writeln!(writer)?;
        return Ok(());
    }

    writeln!(writer, "Screen time for {date}")?;
    if stats.is_empty() {
        writeln!(writer, "No usage recorded.")?;
        return Ok(());
    }
    for entry in &stats {
        writeln!(
            writer,
            "{:<24} {:>10}  ({} opens)",
            entry.class,
            format_duration(entry.total_time),
            entry.open_count
        )?;
    }
    writeln!(writer, "Total: {}", format_duration(total))?;
    Ok(())
}

/// Formats whole seconds as `2h 5m 42s`, dropping leading zero units.
fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
