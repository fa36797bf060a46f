//! Session history listing.

use std::io::Write;

use anyhow::{Context, Result};
use fi_core::{SubjectKind, TimeRange};
use fi_db::Database;

use super::util::{format_duration, format_time};

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    range: &TimeRange,
    kind: SubjectKind,
    json: bool,
    title_width: usize,
) -> Result<()> {
    let sessions = db
        .query_sessions(range, kind)
        .context("failed to query sessions")?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&sessions)?)?;
        return Ok(());
    }

    let noun = match kind {
        SubjectKind::Window => "Window",
        SubjectKind::BrowserTab => "Browser",
    };
    writeln!(
        writer,
        "{noun} sessions from {} to {} (UTC)",
        format_time(range.start),
        format_time(range.end)
    )?;
    if sessions.is_empty() {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    }
    for session in &sessions {
        writeln!(
            writer,
            "{}  {:>7}  {}",
            format_time(session.start_time),
            format_duration(session.duration_ms()),
            session.identity.display(title_width)
        )?;
    }
    Ok(())
}
