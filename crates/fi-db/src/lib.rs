//! Storage layer for focus tracking.
//!
//! Persists sessions, input samples and idle/active transitions using
//! `rusqlite`, and maintains per-identity aggregates over the stored sessions.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not
//! `Sync`. Share one instance through `Arc<Mutex<Database>>`, or open one
//! `Database` per thread against the same file. Writes take an immediate
//! transaction and wait on the busy timeout, so separate connections never
//! interleave an aggregate update.
//!
//! # Schema
//!
//! Timestamps are TEXT in RFC 3339 with millisecond precision and a `Z`
//! suffix (`2025-01-15T10:30:00.000Z`). The fixed width makes lexicographic
//! order match chronological order, so range filters compare strings.
//!
//! - `sessions`: append-only history of closed sessions for both subject
//!   kinds, unique on `(subject_kind, app, title, start_time)`.
//! - `input_samples`: append-only periodic activity rates.
//! - `state_changes`: append-only idle/active transitions.
//! - `app_aggregates`: one row per `(subject_kind, app, title)`, updated in
//!   the same transaction as each session insert.

use std::path::Path;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use fi_core::{
    ActivityState, AppAggregate, DailySummary, DeviceClass, Export, Identity, InputActivitySample,
    Recorder, Session, StateChange, SubjectKind, TimeRange, millis_to_seconds,
};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use thiserror::Error;

const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp in {record}: {timestamp}")]
    TimestampParse {
        record: &'static str,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row holds a value outside its domain.
    #[error("invalid {record} record: {message}")]
    InvalidRecord {
        record: &'static str,
        message: String,
    },
}

/// Outcome of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    /// The row was written.
    New,
    /// An identical row already existed; nothing changed.
    Duplicate,
}

/// Rows removed by [`Database::prune_before`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub sessions: usize,
    pub input_samples: usize,
    pub state_changes: usize,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub window_sessions: i64,
    pub browser_sessions: i64,
    pub input_samples: i64,
    pub state_changes: i64,
    pub aggregates: i64,
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- Closed focus sessions; subject_kind is 'window' or 'browser_tab'
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject_kind TEXT NOT NULL,
                app TEXT NOT NULL,
                title TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                UNIQUE (subject_kind, app, title, start_time)
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_kind_start ON sessions(subject_kind, start_time);
            CREATE INDEX IF NOT EXISTS idx_sessions_end ON sessions(end_time);

            CREATE TABLE IF NOT EXISTS input_samples (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                device_class TEXT NOT NULL,
                event_count INTEGER NOT NULL,
                frequency_per_minute REAL NOT NULL,
                window_start TEXT NOT NULL,
                window_end TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_input_samples_end ON input_samples(window_end);

            -- idle_duration (seconds) is set only for 'idle' rows
            CREATE TABLE IF NOT EXISTS state_changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                state TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                idle_duration REAL
            );

            CREATE INDEX IF NOT EXISTS idx_state_changes_timestamp ON state_changes(timestamp);

            CREATE TABLE IF NOT EXISTS app_aggregates (
                subject_kind TEXT NOT NULL,
                app TEXT NOT NULL,
                title TEXT NOT NULL,
                total_duration_ms INTEGER NOT NULL,
                session_count INTEGER NOT NULL,
                last_used TEXT NOT NULL,
                PRIMARY KEY (subject_kind, app, title)
            );

            CREATE INDEX IF NOT EXISTS idx_app_aggregates_total
                ON app_aggregates(subject_kind, total_duration_ms);
            ",
        )?;
        Ok(())
    }

    /// Appends a closed session and folds it into its identity's aggregate.
    ///
    /// Both writes happen in one immediate transaction. A session already
    /// stored under the same `(kind, app, title, start_time)` is reported as
    /// [`Inserted::Duplicate`] and leaves the aggregate untouched, so
    /// redelivery after a failed write is safe.
    pub fn insert_session(&mut self, session: &Session) -> Result<Inserted, DbError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let kind = session.subject_kind.as_str();
        let start = format_timestamp(session.start_time);
        let end = format_timestamp(session.end_time);
        let duration_ms = session.duration_ms();

        let inserted = tx.execute(
            "
            INSERT OR IGNORE INTO sessions
            (subject_kind, app, title, start_time, end_time, duration_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                kind,
                session.identity.app,
                session.identity.title,
                start,
                end,
                duration_ms
            ],
        )?;
        if inserted == 0 {
            tracing::debug!(kind, identity = %session.identity, start = %start, "duplicate session ignored");
            return Ok(Inserted::Duplicate);
        }

        tx.execute(
            "
            INSERT INTO app_aggregates
            (subject_kind, app, title, total_duration_ms, session_count, last_used)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            ON CONFLICT (subject_kind, app, title) DO UPDATE SET
                total_duration_ms = total_duration_ms + excluded.total_duration_ms,
                session_count = session_count + 1,
                last_used = MAX(last_used, excluded.last_used)
            ",
            params![
                kind,
                session.identity.app,
                session.identity.title,
                duration_ms,
                end
            ],
        )?;
        tx.commit()?;
        Ok(Inserted::New)
    }

    /// Appends an idle/active transition.
    ///
    /// The table is append-only. Alternation of states is kept by the
    /// producer, see [`Database::last_state_change`].
    pub fn insert_state_change(&mut self, change: &StateChange) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO state_changes (state, timestamp, idle_duration) VALUES (?1, ?2, ?3)",
            params![
                change.state.as_str(),
                format_timestamp(change.timestamp),
                change.idle_duration
            ],
        )?;
        Ok(())
    }

    /// The most recently stored transition, in insertion order.
    pub fn last_state_change(&self) -> Result<Option<StateChange>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT state, timestamp, idle_duration
                FROM state_changes
                ORDER BY id DESC
                LIMIT 1
                ",
                [],
                StateChangeRow::from_row,
            )
            .optional()?;
        row.map(StateChangeRow::into_state_change).transpose()
    }

    /// Appends an input activity sample.
    pub fn insert_input_sample(&mut self, sample: &InputActivitySample) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO input_samples
            (device_class, event_count, frequency_per_minute, window_start, window_end)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                sample.device_class.as_str(),
                i64::from(sample.event_count),
                sample.frequency_per_minute,
                format_timestamp(sample.window_start),
                format_timestamp(sample.window_end)
            ],
        )?;
        Ok(())
    }

    /// Closed sessions of `kind` overlapping `range`, most recent first.
    pub fn query_sessions(
        &self,
        range: &TimeRange,
        kind: SubjectKind,
    ) -> Result<Vec<Session>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT subject_kind, app, title, start_time, end_time
            FROM sessions
            WHERE subject_kind = ?1 AND start_time < ?3 AND end_time > ?2
            ORDER BY start_time DESC, id DESC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                kind.as_str(),
                format_timestamp(range.start),
                format_timestamp(range.end)
            ],
            SessionRow::from_row,
        )?;
        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?.into_session()?);
        }
        Ok(sessions)
    }

    /// The most recently ended session of `kind`.
    pub fn last_session(&self, kind: SubjectKind) -> Result<Option<Session>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT subject_kind, app, title, start_time, end_time
                FROM sessions
                WHERE subject_kind = ?1
                ORDER BY end_time DESC, id DESC
                LIMIT 1
                ",
                params![kind.as_str()],
                SessionRow::from_row,
            )
            .optional()?;
        row.map(SessionRow::into_session).transpose()
    }

    /// Summary for the UTC day `date`.
    pub fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, DbError> {
        self.summary_for(date, &TimeRange::utc_day(date))
    }

    /// Summary of `range`, labelled with `date`.
    ///
    /// Window sessions count toward the range their `start_time` falls in;
    /// idle transitions count by their `timestamp`.
    pub fn summary_for(&self, date: NaiveDate, range: &TimeRange) -> Result<DailySummary, DbError> {
        let start = format_timestamp(range.start);
        let end = format_timestamp(range.end);
        let window = SubjectKind::Window.as_str();

        let (active_ms, app_count): (i64, i64) = self.conn.query_row(
            "
            SELECT COALESCE(SUM(duration_ms), 0), COUNT(DISTINCT app || char(31) || title)
            FROM sessions
            WHERE subject_kind = ?1 AND start_time >= ?2 AND start_time < ?3
            ",
            params![window, start, end],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let idle_seconds: f64 = self.conn.query_row(
            "
            SELECT COALESCE(SUM(idle_duration), 0.0)
            FROM state_changes
            WHERE state = ?1 AND timestamp >= ?2 AND timestamp < ?3
            ",
            params![ActivityState::Idle.as_str(), start, end],
            |row| row.get(0),
        )?;

        Ok(DailySummary::new(
            date,
            millis_to_seconds(active_ms),
            idle_seconds,
            app_count,
        ))
    }

    /// Window aggregates by total focus time, longest first.
    pub fn top_apps(&self, limit: usize) -> Result<Vec<AppAggregate>, DbError> {
        self.top_aggregates(SubjectKind::Window, limit)
    }

    /// Browser page aggregates by total focus time, longest first.
    pub fn top_pages(&self, limit: usize) -> Result<Vec<AppAggregate>, DbError> {
        self.top_aggregates(SubjectKind::BrowserTab, limit)
    }

    fn top_aggregates(&self, kind: SubjectKind, limit: usize) -> Result<Vec<AppAggregate>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "
            SELECT subject_kind, app, title, total_duration_ms, session_count, last_used
            FROM app_aggregates
            WHERE subject_kind = ?1
            ORDER BY total_duration_ms DESC, app ASC, title ASC
            LIMIT ?2
            ",
        )?;
        let rows = stmt.query_map(params![kind.as_str(), limit], AggregateRow::from_row)?;
        collect_aggregates(rows)
    }

    /// Every stored aggregate, ordered by kind then identity.
    pub fn aggregates(&self) -> Result<Vec<AppAggregate>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT subject_kind, app, title, total_duration_ms, session_count, last_used
            FROM app_aggregates
            ORDER BY subject_kind ASC, app ASC, title ASC
            ",
        )?;
        let rows = stmt.query_map([], AggregateRow::from_row)?;
        collect_aggregates(rows)
    }

    /// Aggregates re-derived by summing the stored session history.
    ///
    /// Matches [`Database::aggregates`] as long as no history was pruned.
    pub fn recompute_aggregates(&self) -> Result<Vec<AppAggregate>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT subject_kind, app, title, SUM(duration_ms), COUNT(*), MAX(end_time)
            FROM sessions
            GROUP BY subject_kind, app, title
            ORDER BY subject_kind ASC, app ASC, title ASC
            ",
        )?;
        let rows = stmt.query_map([], AggregateRow::from_row)?;
        collect_aggregates(rows)
    }

    /// Sessions, aggregates and the summary of the range's last day.
    pub fn export(&self, range: &TimeRange) -> Result<Export, DbError> {
        let last_day = if range.is_empty() {
            range.start.date_naive()
        } else {
            (range.end - Duration::milliseconds(1)).date_naive()
        };
        Ok(Export {
            sessions: self.query_sessions(range, SubjectKind::Window)?,
            browser_sessions: self.query_sessions(range, SubjectKind::BrowserTab)?,
            aggregates: self.aggregates()?,
            summary: self.daily_summary(last_day)?,
        })
    }

    /// Input samples whose window ends inside `range`, oldest first.
    pub fn list_input_samples(&self, range: &TimeRange) -> Result<Vec<InputActivitySample>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT device_class, event_count, frequency_per_minute, window_start, window_end
            FROM input_samples
            WHERE window_end >= ?1 AND window_end < ?2
            ORDER BY window_end ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![format_timestamp(range.start), format_timestamp(range.end)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, u32>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )?;
        let mut samples = Vec::new();
        for row in rows {
            let (class, event_count, frequency_per_minute, window_start, window_end) = row?;
            let device_class = class
                .parse::<DeviceClass>()
                .map_err(|err| DbError::InvalidRecord {
                    record: "input_samples",
                    message: err.to_string(),
                })?;
            samples.push(InputActivitySample {
                device_class,
                event_count,
                frequency_per_minute,
                window_start: parse_timestamp(&window_start, "input_samples")?,
                window_end: parse_timestamp(&window_end, "input_samples")?,
            });
        }
        Ok(samples)
    }

    /// State changes inside `range`, oldest first.
    pub fn list_state_changes(&self, range: &TimeRange) -> Result<Vec<StateChange>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT state, timestamp, idle_duration
            FROM state_changes
            WHERE timestamp >= ?1 AND timestamp < ?2
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![format_timestamp(range.start), format_timestamp(range.end)],
            StateChangeRow::from_row,
        )?;
        let mut changes = Vec::new();
        for row in rows {
            changes.push(row?.into_state_change()?);
        }
        Ok(changes)
    }

    /// Deletes history older than `cutoff`.
    ///
    /// Sessions are removed once they ended before the cutoff. Their time and
    /// count are taken back out of the aggregates in the same transaction, so
    /// aggregates keep matching the stored history; an aggregate left without
    /// sessions is dropped.
    pub fn prune_before(&mut self, cutoff: DateTime<Utc>) -> Result<PruneStats, DbError> {
        let cutoff = format_timestamp(cutoff);
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "
            UPDATE app_aggregates SET
                total_duration_ms = total_duration_ms - (
                    SELECT COALESCE(SUM(s.duration_ms), 0) FROM sessions s
                    WHERE s.subject_kind = app_aggregates.subject_kind
                        AND s.app = app_aggregates.app
                        AND s.title = app_aggregates.title
                        AND s.end_time < ?1
                ),
                session_count = session_count - (
                    SELECT COUNT(*) FROM sessions s
                    WHERE s.subject_kind = app_aggregates.subject_kind
                        AND s.app = app_aggregates.app
                        AND s.title = app_aggregates.title
                        AND s.end_time < ?1
                ),
                last_used = COALESCE((
                    SELECT MAX(s.end_time) FROM sessions s
                    WHERE s.subject_kind = app_aggregates.subject_kind
                        AND s.app = app_aggregates.app
                        AND s.title = app_aggregates.title
                        AND s.end_time >= ?1
                ), last_used)
            WHERE EXISTS (
                SELECT 1 FROM sessions s
                WHERE s.subject_kind = app_aggregates.subject_kind
                    AND s.app = app_aggregates.app
                    AND s.title = app_aggregates.title
                    AND s.end_time < ?1
            )
            ",
            params![cutoff],
        )?;
        let emptied = tx.execute("DELETE FROM app_aggregates WHERE session_count <= 0", [])?;
        tracing::debug!(emptied, "dropped aggregates without history");
        let stats = PruneStats {
            sessions: tx.execute("DELETE FROM sessions WHERE end_time < ?1", params![cutoff])?,
            input_samples: tx.execute(
                "DELETE FROM input_samples WHERE window_end < ?1",
                params![cutoff],
            )?,
            state_changes: tx.execute(
                "DELETE FROM state_changes WHERE timestamp < ?1",
                params![cutoff],
            )?,
        };
        tx.commit()?;
        tracing::info!(
            cutoff = %cutoff,
            sessions = stats.sessions,
            input_samples = stats.input_samples,
            state_changes = stats.state_changes,
            "pruned history"
        );
        Ok(stats)
    }

    /// Number of rows in each table.
    pub fn record_counts(&self) -> Result<RecordCounts, DbError> {
        let count = |sql: &str| -> Result<i64, DbError> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };
        Ok(RecordCounts {
            window_sessions: count("SELECT COUNT(*) FROM sessions WHERE subject_kind = 'window'")?,
            browser_sessions: count(
                "SELECT COUNT(*) FROM sessions WHERE subject_kind = 'browser_tab'",
            )?,
            input_samples: count("SELECT COUNT(*) FROM input_samples")?,
            state_changes: count("SELECT COUNT(*) FROM state_changes")?,
            aggregates: count("SELECT COUNT(*) FROM app_aggregates")?,
        })
    }
}

impl Recorder for Database {
    type Error = DbError;

    fn record_session(&mut self, session: &Session) -> Result<(), DbError> {
        self.insert_session(session).map(|_| ())
    }

    fn record_state_change(&mut self, change: &StateChange) -> Result<(), DbError> {
        self.insert_state_change(change)
    }

    fn record_input_sample(&mut self, sample: &InputActivitySample) -> Result<(), DbError> {
        self.insert_input_sample(sample)
    }

    fn last_state_change(&self) -> Result<Option<StateChange>, DbError> {
        Self::last_state_change(self)
    }
}

struct StateChangeRow {
    state: String,
    timestamp: String,
    idle_duration: Option<f64>,
}

impl StateChangeRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            state: row.get(0)?,
            timestamp: row.get(1)?,
            idle_duration: row.get(2)?,
        })
    }

    fn into_state_change(self) -> Result<StateChange, DbError> {
        let state = self
            .state
            .parse::<ActivityState>()
            .map_err(|err| DbError::InvalidRecord {
                record: "state_changes",
                message: err.to_string(),
            })?;
        Ok(StateChange {
            state,
            timestamp: parse_timestamp(&self.timestamp, "state_changes")?,
            idle_duration: self.idle_duration,
        })
    }
}

struct SessionRow {
    subject_kind: String,
    app: String,
    title: String,
    start_time: String,
    end_time: String,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            subject_kind: row.get(0)?,
            app: row.get(1)?,
            title: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
        })
    }

    fn into_session(self) -> Result<Session, DbError> {
        Ok(Session::new(
            parse_kind(&self.subject_kind, "sessions")?,
            Identity::new(self.app, self.title),
            parse_timestamp(&self.start_time, "sessions")?,
            parse_timestamp(&self.end_time, "sessions")?,
        ))
    }
}

struct AggregateRow {
    subject_kind: String,
    app: String,
    title: String,
    total_duration_ms: i64,
    session_count: i64,
    last_used: String,
}

impl AggregateRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            subject_kind: row.get(0)?,
            app: row.get(1)?,
            title: row.get(2)?,
            total_duration_ms: row.get(3)?,
            session_count: row.get(4)?,
            last_used: row.get(5)?,
        })
    }

    fn into_aggregate(self) -> Result<AppAggregate, DbError> {
        Ok(AppAggregate::new(
            parse_kind(&self.subject_kind, "app_aggregates")?,
            Identity::new(self.app, self.title),
            self.total_duration_ms,
            self.session_count,
            parse_timestamp(&self.last_used, "app_aggregates")?,
        ))
    }
}

fn collect_aggregates(
    rows: impl Iterator<Item = rusqlite::Result<AggregateRow>>,
) -> Result<Vec<AppAggregate>, DbError> {
    let mut aggregates = Vec::new();
    for row in rows {
        aggregates.push(row?.into_aggregate()?);
    }
    Ok(aggregates)
}

fn parse_kind(kind: &str, record: &'static str) -> Result<SubjectKind, DbError> {
    kind.parse().map_err(|err: fi_core::UnknownSubjectKind| DbError::InvalidRecord {
        record,
        message: err.to_string(),
    })
}

fn parse_timestamp(timestamp: &str, record: &'static str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            record,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
