//! Applications or browser pages ranked by total focus time.

use std::io::Write;

use anyhow::{Context, Result};
use fi_core::AppAggregate;
use fi_db::Database;

use super::util::format_duration;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    limit: usize,
    pages: bool,
    json: bool,
    title_width: usize,
) -> Result<()> {
    let aggregates = if pages {
        db.top_pages(limit)
    } else {
        db.top_apps(limit)
    }
    .context("failed to load aggregates")?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&aggregates)?)?;
        return Ok(());
    }

    let heading = if pages { "Top pages" } else { "Top applications" };
    writeln!(writer, "{heading}")?;
    render(writer, &aggregates, title_width)
}

fn render<W: Write>(writer: &mut W, aggregates: &[AppAggregate], title_width: usize) -> Result<()> {
    if aggregates.is_empty() {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    }
    for (rank, aggregate) in aggregates.iter().enumerate() {
        let sessions = if aggregate.session_count == 1 {
            "session"
        } else {
            "sessions"
        };
        writeln!(
            writer,
            "{}. {}  {} ({} {sessions})",
            rank + 1,
            aggregate.identity.display(title_width),
            format_duration(aggregate.total_duration_ms),
            aggregate.session_count,
        )?;
    }
    Ok(())
}
