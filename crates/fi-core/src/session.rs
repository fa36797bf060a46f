//! Focus sessions and the tracker that produces them.
//!
//! A [`SessionTracker`] owns at most one open session. Each polled sample is
//! fed to [`SessionTracker::observe`]; identity transitions close the open
//! session and queue it in the tracker's outbox until a [`SessionSink`]
//! accepts it.
//!
//! # Measurement error
//!
//! The tracker only learns about focus changes when the driver polls. With a
//! poll period `p`, a change that happens just after a tick is first seen on
//! the next tick, so every recorded boundary lags the true one by less than
//! `p`. A recorded duration therefore differs from the true focus interval by
//! at most one tick.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{Identity, SubjectKind};
use crate::probe::FocusedWindow;

/// A closed, contiguous interval during which one identity held focus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub subject_kind: SubjectKind,
    pub identity: Identity,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
}

impl Session {
    /// Builds a closed session.
    ///
    /// Timestamps are truncated to millisecond precision (the storage
    /// precision) and `end_time` is clamped so it never precedes `start_time`.
    pub fn new(
        subject_kind: SubjectKind,
        identity: Identity,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let start_time = start_time.trunc_subsecs(3);
        let end_time = end_time.trunc_subsecs(3).max(start_time);
        let duration_ms = end_time.signed_duration_since(start_time).num_milliseconds();
        Self {
            subject_kind,
            identity,
            start_time,
            end_time,
            duration_seconds: millis_to_seconds(duration_ms),
        }
    }

    /// Exact duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        self.end_time
            .signed_duration_since(self.start_time)
            .num_milliseconds()
    }
}

/// Converts integer milliseconds to fractional seconds.
#[allow(clippy::cast_precision_loss)]
pub fn millis_to_seconds(ms: i64) -> f64 {
    ms as f64 / 1000.0
}

/// The session currently holding focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSession {
    pub identity: Identity,
    pub start_time: DateTime<Utc>,
}

impl OpenSession {
    fn new(identity: Identity, start_time: DateTime<Utc>) -> Self {
        Self {
            identity,
            start_time: start_time.trunc_subsecs(3),
        }
    }

    /// Milliseconds elapsed since the session opened, never negative.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        now.trunc_subsecs(3)
            .signed_duration_since(self.start_time)
            .num_milliseconds()
            .max(0)
    }

    fn close(&self, kind: SubjectKind, now: DateTime<Utc>) -> Session {
        Session::new(kind, self.identity.clone(), self.start_time, now)
    }
}

/// What a call to [`SessionTracker::observe`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Nothing was open; a session opened.
    Opened,
    /// The open session kept focus.
    Unchanged,
    /// The open session closed and a new one opened.
    Switched,
    /// The open session closed; nothing replaced it.
    Closed,
    /// Nothing open and nothing to open.
    Empty,
}

/// Receives closed sessions from a tracker.
///
/// A sink that returns an error has not taken the session; the tracker keeps
/// it and offers it again on the next delivery.
pub trait SessionSink {
    type Error;

    fn accept(&mut self, session: &Session) -> Result<(), Self::Error>;
}

impl SessionSink for Vec<Session> {
    type Error = Infallible;

    fn accept(&mut self, session: &Session) -> Result<(), Self::Error> {
        self.push(session.clone());
        Ok(())
    }
}

/// Converts a stream of focus samples into closed sessions.
#[derive(Debug)]
pub struct SessionTracker {
    kind: SubjectKind,
    open: Option<OpenSession>,
    outbox: VecDeque<Session>,
}

impl SessionTracker {
    pub const fn new(kind: SubjectKind) -> Self {
        Self {
            kind,
            open: None,
            outbox: VecDeque::new(),
        }
    }

    pub const fn kind(&self) -> SubjectKind {
        self.kind
    }

    /// The session currently open, if any.
    pub const fn current(&self) -> Option<&OpenSession> {
        self.open.as_ref()
    }

    /// Closed sessions not yet accepted by a sink, oldest first.
    pub fn pending(&self) -> impl ExactSizeIterator<Item = &Session> {
        self.outbox.iter()
    }

    /// Feeds one focus sample.
    ///
    /// `None` means the identity could not be resolved; the open session is
    /// closed and nothing replaces it. Never fails.
    pub fn observe(&mut self, identity: Option<Identity>, now: DateTime<Utc>) -> Observation {
        match (self.open.take(), identity) {
            (None, None) => Observation::Empty,
            (None, Some(identity)) => {
                tracing::debug!(kind = %self.kind, identity = %identity, "session opened");
                self.open = Some(OpenSession::new(identity, now));
                Observation::Opened
            }
            (Some(open), Some(identity)) if open.identity == identity => {
                self.open = Some(open);
                Observation::Unchanged
            }
            (Some(open), Some(identity)) => {
                let closed = open.close(self.kind, now);
                let start = closed.end_time;
                self.emit(closed);
                tracing::debug!(kind = %self.kind, identity = %identity, "session opened");
                self.open = Some(OpenSession::new(identity, start));
                Observation::Switched
            }
            (Some(open), None) => {
                self.emit(open.close(self.kind, now));
                Observation::Closed
            }
        }
    }

    /// Hands queued sessions to `sink` in emission order.
    ///
    /// Each session leaves the outbox only once the sink accepts it. Stops at
    /// the first error, leaving that session and everything after it queued.
    pub fn deliver<S>(&mut self, sink: &mut S) -> Result<usize, S::Error>
    where
        S: SessionSink + ?Sized,
    {
        let mut delivered = 0;
        while let Some(session) = self.outbox.front() {
            sink.accept(session)?;
            self.outbox.pop_front();
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Delivers the outbox, then force-closes the open session.
    ///
    /// The open session is only cleared once `sink` accepts it, so a failed
    /// flush can be retried without losing the session.
    pub fn flush<S>(&mut self, now: DateTime<Utc>, sink: &mut S) -> Result<Option<Session>, S::Error>
    where
        S: SessionSink + ?Sized,
    {
        self.deliver(sink)?;
        let Some(open) = self.open.as_ref() else {
            return Ok(None);
        };
        let session = open.close(self.kind, now);
        sink.accept(&session)?;
        self.open = None;
        tracing::info!(
            kind = %self.kind,
            identity = %session.identity,
            duration_seconds = session.duration_seconds,
            "session flushed"
        );
        Ok(Some(session))
    }

    fn emit(&mut self, session: Session) {
        tracing::info!(
            kind = %self.kind,
            identity = %session.identity,
            duration_seconds = session.duration_seconds,
            "session closed"
        );
        self.outbox.push_back(session);
    }
}

/// Tracks which application window holds focus.
#[derive(Debug)]
pub struct WindowSessionTracker {
    inner: SessionTracker,
}

impl WindowSessionTracker {
    pub const fn new() -> Self {
        Self {
            inner: SessionTracker::new(SubjectKind::Window),
        }
    }

    /// Feeds one probe sample; `None` means no window could be resolved.
    pub fn observe_window(
        &mut self,
        focused: Option<&FocusedWindow>,
        now: DateTime<Utc>,
    ) -> Observation {
        self.inner.observe(focused.map(FocusedWindow::identity), now)
    }
}

impl Default for WindowSessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for WindowSessionTracker {
    type Target = SessionTracker;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for WindowSessionTracker {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::seconds(secs)
    }

    fn id(name: &str) -> Option<Identity> {
        Some(Identity::new(name, ""))
    }

    fn drain(tracker: &mut SessionTracker) -> Vec<Session> {
        let mut sink = Vec::new();
        tracker.deliver(&mut sink).unwrap();
        sink
    }

    #[test]
    fn same_identity_then_switch_emits_one_session() {
        let mut tracker = SessionTracker::new(SubjectKind::Window);

        assert_eq!(tracker.observe(id("A"), t(0)), Observation::Opened);
        assert_eq!(tracker.observe(id("A"), t(5)), Observation::Unchanged);
        assert_eq!(tracker.observe(id("B"), t(5)), Observation::Switched);

        let emitted = drain(&mut tracker);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].identity, Identity::new("A", ""));
        assert_eq!(emitted[0].start_time, t(0));
        assert_eq!(emitted[0].end_time, t(5));
        assert!((emitted[0].duration_seconds - 5.0).abs() < f64::EPSILON);

        let open = tracker.current().unwrap();
        assert_eq!(open.identity, Identity::new("B", ""));
        assert_eq!(open.start_time, t(5));
    }

    #[test]
    fn null_identity_closes_without_replacement() {
        let mut tracker = SessionTracker::new(SubjectKind::Window);
        tracker.observe(id("A"), t(0));

        assert_eq!(tracker.observe(None, t(10)), Observation::Closed);
        assert!(tracker.current().is_none());
        assert_eq!(tracker.observe(None, t(12)), Observation::Empty);

        assert_eq!(tracker.observe(id("A"), t(20)), Observation::Opened);
        assert_eq!(tracker.current().unwrap().start_time, t(20));

        let emitted = drain(&mut tracker);
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].end_time, t(10));
        // Nothing covers 10..20: the gap stays unattributed.
        let covered: i64 = emitted.iter().map(Session::duration_ms).sum::<i64>()
            + tracker.current().unwrap().elapsed_ms(t(20));
        assert_eq!(covered, 10_000);
    }

    #[test]
    fn flush_closes_open_session() {
        let mut tracker = SessionTracker::new(SubjectKind::Window);
        tracker.observe(id("A"), t(0));

        let mut sink = Vec::new();
        let flushed = tracker.flush(t(7), &mut sink).unwrap().unwrap();
        assert_eq!(flushed.duration_ms(), 7_000);
        assert_eq!(sink.len(), 1);
        assert!(tracker.current().is_none());

        assert!(tracker.flush(t(8), &mut sink).unwrap().is_none());
    }

    struct FailingSink {
        fail: bool,
        accepted: Vec<Session>,
    }

    impl SessionSink for FailingSink {
        type Error = &'static str;

        fn accept(&mut self, session: &Session) -> Result<(), Self::Error> {
            if self.fail {
                return Err("disk full");
            }
            self.accepted.push(session.clone());
            Ok(())
        }
    }

    #[test]
    fn failed_flush_keeps_session_open_for_retry() {
        let mut tracker = SessionTracker::new(SubjectKind::Window);
        tracker.observe(id("A"), t(0));
        tracker.observe(id("B"), t(3));

        let mut sink = FailingSink {
            fail: true,
            accepted: Vec::new(),
        };
        assert_eq!(tracker.flush(t(9), &mut sink), Err("disk full"));
        assert_eq!(tracker.pending().len(), 1);
        assert_eq!(tracker.current().unwrap().identity, Identity::new("B", ""));

        sink.fail = false;
        let flushed = tracker.flush(t(9), &mut sink).unwrap().unwrap();
        assert_eq!(flushed.identity, Identity::new("B", ""));
        assert_eq!(sink.accepted.len(), 2);
        assert_eq!(sink.accepted[0].identity, Identity::new("A", ""));
        assert_eq!(tracker.pending().len(), 0);
        assert!(tracker.current().is_none());
    }

    #[test]
    fn emitted_count_and_durations_cover_elapsed_time() {
        let samples = [
            (0, Some("A")),
            (2, Some("A")),
            (4, Some("B")),
            (5, Some("B")),
            (9, Some("C")),
            (11, Some("A")),
            (12, Some("A")),
            (15, Some("B")),
        ];
        let mut tracker = SessionTracker::new(SubjectKind::Window);
        let mut transitions = 0;
        let mut last: Option<&str> = None;
        for (secs, name) in samples {
            if last.is_some() && last != name {
                transitions += 1;
            }
            last = name;
            tracker.observe(name.map(|n| Identity::new(n, "")), t(secs));
        }

        let emitted = drain(&mut tracker);
        assert_eq!(emitted.len(), transitions);

        let open_elapsed = tracker.current().unwrap().elapsed_ms(t(20));
        let total: i64 = emitted.iter().map(Session::duration_ms).sum::<i64>() + open_elapsed;
        assert_eq!(total, 20_000);

        let mut sink = Vec::new();
        tracker.flush(t(20), &mut sink).unwrap();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn sessions_are_contiguous_across_switches() {
        let mut tracker = SessionTracker::new(SubjectKind::Window);
        for (secs, name) in [(0, "A"), (3, "B"), (4, "C"), (10, "A")] {
            tracker.observe(id(name), t(secs));
        }
        let emitted = drain(&mut tracker);
        for pair in emitted.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn clock_skew_never_produces_negative_duration() {
        let mut tracker = SessionTracker::new(SubjectKind::Window);
        tracker.observe(id("A"), t(10));
        tracker.observe(id("B"), t(8));

        let emitted = drain(&mut tracker);
        assert_eq!(emitted[0].duration_ms(), 0);
        assert!(emitted[0].end_time >= emitted[0].start_time);
        assert_eq!(tracker.current().unwrap().start_time, t(10));
    }

    #[test]
    fn duration_error_is_bounded_by_one_tick() {
        // True focus: A for [0, 7.4), B afterwards. Driver polls every 2s.
        let tick = 2;
        let true_switch_ms = 7_400;
        let mut tracker = SessionTracker::new(SubjectKind::Window);
        for n in 0..8 {
            let now_ms = n * tick * 1000;
            let name = if now_ms < true_switch_ms { "A" } else { "B" };
            tracker.observe(id(name), t(0) + Duration::milliseconds(now_ms));
        }
        let emitted = drain(&mut tracker);
        let recorded = emitted[0].duration_ms();
        assert!((recorded - true_switch_ms).abs() <= tick * 1000);
    }

    #[test]
    fn window_tracker_uses_full_title_for_boundaries() {
        let mut tracker = WindowSessionTracker::new();
        let prefix = "x".repeat(60);
        let first = FocusedWindow::new("code.exe", format!("{prefix}1"));
        let second = FocusedWindow::new("code.exe", format!("{prefix}2"));

        tracker.observe_window(Some(&first), t(0));
        assert_eq!(
            tracker.observe_window(Some(&second), t(1)),
            Observation::Switched
        );
        assert_eq!(tracker.pending().len(), 1);
    }

    #[test]
    fn session_serializes_with_stable_field_names() {
        let session = Session::new(SubjectKind::Window, Identity::new("A", "t"), t(0), t(5));
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["subject_kind"], "window");
        assert_eq!(value["identity"]["app"], "A");
        assert_eq!(value["duration_seconds"], 5.0);
        assert!(value.get("start_time").is_some());
        assert!(value.get("end_time").is_some());
    }
}
