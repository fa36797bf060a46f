//! Status command for showing what has been recorded.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use fi_core::{Session, SubjectKind};
use fi_db::Database;

use super::util::format_time;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    database_path: &Path,
    title_width: usize,
) -> Result<()> {
    let counts = db.record_counts()?;

    writeln!(writer, "Focus tracker status")?;
    writeln!(writer, "Database: {}", database_path.display())?;
    writeln!(writer, "Window sessions:  {}", counts.window_sessions)?;
    writeln!(writer, "Browser sessions: {}", counts.browser_sessions)?;
    writeln!(writer, "Input samples:    {}", counts.input_samples)?;
    writeln!(writer, "State changes:    {}", counts.state_changes)?;

    let last_window = db.last_session(SubjectKind::Window)?;
    let last_page = db.last_session(SubjectKind::BrowserTab)?;
    writeln!(
        writer,
        "Last window: {}",
        describe(last_window.as_ref(), title_width)
    )?;
    writeln!(
        writer,
        "Last page:   {}",
        describe(last_page.as_ref(), title_width)
    )?;
    Ok(())
}

fn describe(session: Option<&Session>, title_width: usize) -> String {
    session.map_or_else(
        || "none".to_string(),
        |session| {
            format!(
                "{} (ended {})",
                session.identity.display(title_width),
                format_time(session.end_time)
            )
        },
    )
}
