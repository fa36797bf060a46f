//! Daily focus summary.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use fi_core::DailySummary;
use fi_db::Database;

use super::util::format_seconds;

pub fn run<W: Write>(writer: &mut W, db: &Database, date: NaiveDate, json: bool) -> Result<()> {
    let summary = db
        .daily_summary(date)
        .with_context(|| format!("failed to summarize {date}"))?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&summary)?)?;
        return Ok(());
    }
    render(writer, &summary)
}

/// Human-readable summary block.
pub fn render<W: Write>(writer: &mut W, summary: &DailySummary) -> Result<()> {
    writeln!(writer, "Focus summary for {} (UTC)", summary.date)?;
    writeln!(
        writer,
        "Active time:      {}",
        format_seconds(summary.total_active_time)
    )?;
    writeln!(
        writer,
        "Idle time:        {}",
        format_seconds(summary.total_idle_time)
    )?;
    writeln!(writer, "Applications:     {}", summary.app_count)?;
    writeln!(writer, "Focus efficiency: {:.1}%", summary.focus_efficiency)?;
    Ok(())
}
