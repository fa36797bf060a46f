//! JSON export of sessions, aggregates and a summary.

use std::io::Write;

use anyhow::{Context, Result};
use fi_core::TimeRange;
use fi_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, range: &TimeRange) -> Result<()> {
    let export = db.export(range).context("failed to export records")?;
    tracing::debug!(
        sessions = export.sessions.len(),
        browser_sessions = export.browser_sessions.len(),
        "exporting"
    );
    serde_json::to_writer_pretty(&mut *writer, &export)?;
    writeln!(writer)?;
    Ok(())
}
