//! Retention cleanup.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use fi_db::Database;

use super::util::format_time;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    days: u32,
    now: DateTime<Utc>,
) -> Result<()> {
    let cutoff = now - Duration::days(i64::from(days));
    let stats = db
        .prune_before(cutoff)
        .context("failed to prune history")?;
    writeln!(
        writer,
        "Removed records older than {} (UTC):",
        format_time(cutoff)
    )?;
    writeln!(writer, "Sessions:      {}", stats.sessions)?;
    writeln!(writer, "Input samples: {}", stats.input_samples)?;
    writeln!(writer, "State changes: {}", stats.state_changes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use fi_core::{Identity, Session, SubjectKind};
    use insta::assert_snapshot;

    fn t(days: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::days(days)
    }

    #[test]
    fn prune_removes_history_past_retention() {
        let mut db = Database::open_in_memory().unwrap();
        for (start, end) in [(-40, -39), (-2, -1)] {
            db.insert_session(&Session::new(
                SubjectKind::Window,
                Identity::new("code.exe", "main.rs"),
                t(start),
                t(end),
            ))
            .unwrap();
        }

        let mut output = Vec::new();
        run(&mut output, &mut db, 30, t(0)).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Removed records older than 2024-12-16 09:00:00 (UTC):
        Sessions:      1
        Input samples: 0
        State changes: 0
        ");
        assert_eq!(db.record_counts().unwrap().window_sessions, 1);
        let top = db.top_apps(1).unwrap();
        assert_eq!(top[0].session_count, 1);
        assert_eq!(top, db.recompute_aggregates().unwrap());
    }
}
