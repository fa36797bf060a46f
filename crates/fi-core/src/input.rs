//! Keyboard/mouse activity rates and idle detection.
//!
//! [`InputActivityTracker`] keeps the most recent event timestamps per device
//! class (a count cap, not a time cap) and runs a two-state machine:
//!
//! ```text
//!   active --check_idle (no input for >= threshold)--> idle
//!   idle   --record_event--------------------------> active
//! ```
//!
//! The tracker starts active. Each transition yields a [`StateChange`], so
//! the emitted sequence never repeats a state.
//!
//! # Frequency limitation
//!
//! Only `capacity` timestamps are kept per class. If more events than that
//! occurred inside the query window, the older ones were already evicted and
//! the reported rate is an undercount.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::millis_to_seconds;

/// Default number of timestamps retained per device class.
pub const DEFAULT_CAPACITY: usize = 60;

/// Default idle threshold (5 minutes).
pub const DEFAULT_IDLE_THRESHOLD_SECS: i64 = 300;

/// Default frequency window (1 minute).
pub const DEFAULT_WINDOW_SECS: u32 = 60;

/// Input device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Keyboard,
    Mouse,
}

impl DeviceClass {
    pub const ALL: [Self; 2] = [Self::Keyboard, Self::Mouse];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Keyboard => "keyboard",
            Self::Mouse => "mouse",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown device class.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown device class: {0}")]
pub struct UnknownDeviceClass(pub String);

impl FromStr for DeviceClass {
    type Err = UnknownDeviceClass;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keyboard" => Ok(Self::Keyboard),
            "mouse" => Ok(Self::Mouse),
            _ => Err(UnknownDeviceClass(s.to_string())),
        }
    }
}

/// Activity state of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityState {
    Active,
    Idle,
}

impl ActivityState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Idle => "idle",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown activity state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown activity state: {0}")]
pub struct UnknownActivityState(pub String);

impl FromStr for ActivityState {
    type Err = UnknownActivityState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "idle" => Ok(Self::Idle),
            _ => Err(UnknownActivityState(s.to_string())),
        }
    }
}

/// A transition of the idle/active state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: ActivityState,
    pub timestamp: DateTime<Utc>,
    /// Seconds without input before going idle. Present iff `state` is idle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_duration: Option<f64>,
}

impl StateChange {
    pub const fn active(timestamp: DateTime<Utc>) -> Self {
        Self {
            state: ActivityState::Active,
            timestamp,
            idle_duration: None,
        }
    }

    pub fn idle(timestamp: DateTime<Utc>, idle_for: Duration) -> Self {
        Self {
            state: ActivityState::Idle,
            timestamp,
            idle_duration: Some(millis_to_seconds(idle_for.num_milliseconds())),
        }
    }
}

/// Periodic snapshot of one device class's activity rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputActivitySample {
    pub device_class: DeviceClass,
    pub event_count: u32,
    pub frequency_per_minute: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Point-in-time view of input activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivitySummary {
    pub keyboard_frequency: f64,
    pub mouse_frequency: f64,
    pub total_keyboard_events: u64,
    pub total_mouse_events: u64,
    pub is_idle: bool,
    pub last_activity: DateTime<Utc>,
    /// Seconds since the last recorded event.
    pub idle_duration: f64,
}

/// Tuning for [`InputActivityTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputConfig {
    /// Timestamps retained per device class.
    pub capacity: usize,
    /// Time without input after which the user counts as idle.
    pub idle_threshold: Duration,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            idle_threshold: Duration::seconds(DEFAULT_IDLE_THRESHOLD_SECS),
        }
    }
}

/// Recent input history and the idle/active state machine.
#[derive(Debug, Clone)]
pub struct InputActivityTracker {
    keyboard: VecDeque<DateTime<Utc>>,
    mouse: VecDeque<DateTime<Utc>>,
    keyboard_total: u64,
    mouse_total: u64,
    config: InputConfig,
    last_activity_time: DateTime<Utc>,
    /// When the current idle period was detected.
    idle_since: Option<DateTime<Utc>>,
}

impl InputActivityTracker {
    /// Creates an active tracker whose idle clock starts at `started_at`.
    pub fn new(started_at: DateTime<Utc>, config: InputConfig) -> Self {
        Self {
            keyboard: VecDeque::with_capacity(config.capacity),
            mouse: VecDeque::with_capacity(config.capacity),
            keyboard_total: 0,
            mouse_total: 0,
            config,
            last_activity_time: started_at,
            idle_since: None,
        }
    }

    pub const fn is_idle(&self) -> bool {
        self.idle_since.is_some()
    }

    pub const fn last_activity_time(&self) -> DateTime<Utc> {
        self.last_activity_time
    }

    pub const fn idle_threshold(&self) -> Duration {
        self.config.idle_threshold
    }

    /// Records one input event.
    ///
    /// Returns the `active` transition if the user was idle, stamped with
    /// the later of `timestamp` and the moment idle was detected.
    pub fn record_event(
        &mut self,
        class: DeviceClass,
        timestamp: DateTime<Utc>,
    ) -> Option<StateChange> {
        let capacity = self.config.capacity;
        let (events, total) = match class {
            DeviceClass::Keyboard => (&mut self.keyboard, &mut self.keyboard_total),
            DeviceClass::Mouse => (&mut self.mouse, &mut self.mouse_total),
        };
        events.push_back(timestamp);
        while events.len() > capacity {
            events.pop_front();
        }
        *total += 1;

        // Late deliveries must not move the idle clock backwards.
        self.last_activity_time = self.last_activity_time.max(timestamp);

        // A late event is stamped no earlier than the idle it ends.
        let idle_since = self.idle_since.take()?;
        let resumed_at = timestamp.max(idle_since);
        tracing::info!(timestamp = %resumed_at, "input resumed");
        Some(StateChange::active(resumed_at))
    }

    /// Events per minute over the last `window_seconds`.
    ///
    /// Counts retained timestamps newer than `now - window_seconds` and
    /// scales to a per-minute rate. A zero window yields 0.
    pub fn frequency(&self, class: DeviceClass, now: DateTime<Utc>, window_seconds: u32) -> f64 {
        if window_seconds == 0 {
            return 0.0;
        }
        let count = self.count_within(class, now, window_seconds);
        f64::from(count) * (60.0 / f64::from(window_seconds))
    }

    /// Moves to idle if no input arrived for at least the threshold.
    pub fn check_idle(&mut self, now: DateTime<Utc>) -> Option<StateChange> {
        let idle_for = now.signed_duration_since(self.last_activity_time);
        if self.is_idle() || idle_for < self.config.idle_threshold {
            return None;
        }
        self.idle_since = Some(now);
        tracing::info!(
            idle_seconds = idle_for.num_seconds(),
            "no input past idle threshold"
        );
        Some(StateChange::idle(now, idle_for))
    }

    /// Snapshot of rates, totals and idle state at `now`.
    pub fn summary(&self, now: DateTime<Utc>) -> ActivitySummary {
        let idle_for = now
            .signed_duration_since(self.last_activity_time)
            .num_milliseconds()
            .max(0);
        ActivitySummary {
            keyboard_frequency: self.frequency(DeviceClass::Keyboard, now, DEFAULT_WINDOW_SECS),
            mouse_frequency: self.frequency(DeviceClass::Mouse, now, DEFAULT_WINDOW_SECS),
            total_keyboard_events: self.keyboard_total,
            total_mouse_events: self.mouse_total,
            is_idle: self.is_idle(),
            last_activity: self.last_activity_time,
            idle_duration: millis_to_seconds(idle_for),
        }
    }

    /// Activity sample for `[now - window_seconds, now]`.
    pub fn sample(
        &self,
        class: DeviceClass,
        now: DateTime<Utc>,
        window_seconds: u32,
    ) -> InputActivitySample {
        InputActivitySample {
            device_class: class,
            event_count: self.count_within(class, now, window_seconds),
            frequency_per_minute: self.frequency(class, now, window_seconds),
            window_start: now - Duration::seconds(i64::from(window_seconds)),
            window_end: now,
        }
    }

    fn count_within(&self, class: DeviceClass, now: DateTime<Utc>, window_seconds: u32) -> u32 {
        let cutoff = now - Duration::seconds(i64::from(window_seconds));
        let events = match class {
            DeviceClass::Keyboard => &self.keyboard,
            DeviceClass::Mouse => &self.mouse,
        };
        let count = events.iter().filter(|ts| **ts > cutoff).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }
}

/// Push callbacks from an input event source.
pub trait InputEventSink: Send + Sync {
    fn on_key_event(&self, timestamp: DateTime<Utc>);

    /// Only releases (`pressed == false`) count, so a click is one event.
    fn on_mouse_event(&self, timestamp: DateTime<Utc>, pressed: bool);
}

/// Errors from detaching an input listener.
#[derive(Debug, Error)]
#[error("failed to detach input listener: {0}")]
pub struct ListenerError(pub String);

/// A platform input hook that can be detached at shutdown.
pub trait InputListener: Send {
    fn detach(&mut self) -> Result<(), ListenerError>;
}

#[derive(Debug)]
struct SharedState {
    tracker: InputActivityTracker,
    changes: VecDeque<StateChange>,
}

/// An [`InputActivityTracker`] shared between the event source and the
/// polling loop.
///
/// One mutex covers `record_event`, `check_idle` and every read, so input
/// callbacks and idle checks never interleave. Emitted state changes are
/// queued until the polling loop drains them. After [`detach`], incoming
/// events are dropped.
///
/// [`detach`]: SharedInputTracker::detach
#[derive(Debug, Clone)]
pub struct SharedInputTracker {
    state: Arc<Mutex<SharedState>>,
    attached: Arc<AtomicBool>,
}

impl SharedInputTracker {
    pub fn new(tracker: InputActivityTracker) -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState {
                tracker,
                changes: VecDeque::new(),
            })),
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedState> {
        // The tracker holds no invariants a panicking holder could break
        // halfway, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Stops accepting events. Later events are dropped, not queued.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    /// Records an event; returns `false` if it was dropped after detach.
    pub fn record_event(&self, class: DeviceClass, timestamp: DateTime<Utc>) -> bool {
        if !self.is_attached() {
            tracing::trace!(%class, "input event after detach dropped");
            return false;
        }
        let mut state = self.lock();
        if let Some(change) = state.tracker.record_event(class, timestamp) {
            state.changes.push_back(change);
        }
        true
    }

    /// Runs the idle check; a resulting transition is also queued.
    pub fn check_idle(&self, now: DateTime<Utc>) -> Option<StateChange> {
        let mut state = self.lock();
        let change = state.tracker.check_idle(now)?;
        state.changes.push_back(change.clone());
        Some(change)
    }

    /// Continues after `last`, the final stored change of an earlier run.
    ///
    /// A new run starts active, so if `last` was idle an `active` change is
    /// queued ahead of anything pending, stamped no earlier than `last`.
    pub fn resume_after(
        &self,
        last: &StateChange,
        started_at: DateTime<Utc>,
    ) -> Option<StateChange> {
        if last.state != ActivityState::Idle {
            return None;
        }
        let change = StateChange::active(started_at.max(last.timestamp));
        self.lock().changes.push_front(change.clone());
        Some(change)
    }

    pub fn summary(&self, now: DateTime<Utc>) -> ActivitySummary {
        self.lock().tracker.summary(now)
    }

    pub fn sample(
        &self,
        class: DeviceClass,
        now: DateTime<Utc>,
        window_seconds: u32,
    ) -> InputActivitySample {
        self.lock().tracker.sample(class, now, window_seconds)
    }

    /// Hands queued state changes to `deliver` in emission order.
    ///
    /// The lock is released while `deliver` runs. A change leaves the queue
    /// only once `deliver` succeeds; on error it is put back at the front.
    pub fn drain_state_changes<E>(
        &self,
        mut deliver: impl FnMut(&StateChange) -> Result<(), E>,
    ) -> Result<usize, E> {
        let mut delivered = 0;
        loop {
            let Some(change) = self.lock().changes.pop_front() else {
                return Ok(delivered);
            };
            if let Err(err) = deliver(&change) {
                self.lock().changes.push_front(change);
                return Err(err);
            }
            delivered += 1;
        }
    }

    /// Number of state changes waiting to be drained.
    pub fn pending_state_changes(&self) -> usize {
        self.lock().changes.len()
    }
}

impl InputEventSink for SharedInputTracker {
    fn on_key_event(&self, timestamp: DateTime<Utc>) {
        self.record_event(DeviceClass::Keyboard, timestamp);
    }

    fn on_mouse_event(&self, timestamp: DateTime<Utc>, pressed: bool) {
        if pressed {
            return;
        }
        self.record_event(DeviceClass::Mouse, timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::seconds(secs)
    }

    fn tracker_with_threshold(secs: i64) -> InputActivityTracker {
        InputActivityTracker::new(
            t(0),
            InputConfig {
                capacity: DEFAULT_CAPACITY,
                idle_threshold: Duration::seconds(secs),
            },
        )
    }

    #[test]
    fn idle_fires_once_threshold_is_reached() {
        let mut tracker = tracker_with_threshold(30);
        tracker.record_event(DeviceClass::Keyboard, t(0));

        assert!(tracker.check_idle(t(29)).is_none());
        let change = tracker.check_idle(t(31)).unwrap();
        assert_eq!(change.state, ActivityState::Idle);
        assert_eq!(change.timestamp, t(31));
        assert_eq!(change.idle_duration, Some(31.0));
        assert!(tracker.is_idle());

        assert!(tracker.check_idle(t(60)).is_none());
    }

    #[test]
    fn idle_at_exact_threshold() {
        let mut tracker = tracker_with_threshold(30);
        assert!(tracker.check_idle(t(30)).is_some());
    }

    #[test]
    fn any_event_returns_to_active() {
        let mut tracker = tracker_with_threshold(10);
        tracker.check_idle(t(15)).unwrap();

        let change = tracker.record_event(DeviceClass::Mouse, t(20)).unwrap();
        assert_eq!(change, StateChange::active(t(20)));
        assert!(!tracker.is_idle());
        assert!(tracker.record_event(DeviceClass::Mouse, t(21)).is_none());
    }

    #[test]
    fn state_changes_never_repeat() {
        let mut tracker = tracker_with_threshold(5);
        let mut changes = Vec::new();
        let mut now = 0;
        for step in 0..200_i64 {
            now += 1 + step % 4;
            if step % 7 < 3 {
                changes.extend(tracker.record_event(DeviceClass::Keyboard, t(now)));
            }
            changes.extend(tracker.check_idle(t(now)));
        }

        assert!(changes.len() > 2);
        assert_eq!(changes[0].state, ActivityState::Idle);
        for pair in changes.windows(2) {
            assert_ne!(pair[0].state, pair[1].state);
        }
        for change in &changes {
            assert_eq!(
                change.idle_duration.is_some(),
                change.state == ActivityState::Idle
            );
        }
    }

    #[test]
    fn frequency_scales_to_per_minute() {
        let mut tracker = tracker_with_threshold(300);
        for secs in [41, 45, 50, 55, 59] {
            tracker.record_event(DeviceClass::Keyboard, t(secs));
        }

        assert!((tracker.frequency(DeviceClass::Keyboard, t(60), 60) - 5.0).abs() < 1e-9);
        assert!((tracker.frequency(DeviceClass::Keyboard, t(60), 30) - 10.0).abs() < 1e-9);
        assert!((tracker.frequency(DeviceClass::Keyboard, t(60), 10) - 12.0).abs() < 1e-9);
        assert!(tracker.frequency(DeviceClass::Mouse, t(60), 60).abs() < 1e-9);
        assert!(tracker.frequency(DeviceClass::Keyboard, t(60), 0).abs() < 1e-9);
    }

    #[test]
    fn frequency_non_increasing_in_window_for_recent_burst() {
        let mut tracker = tracker_with_threshold(300);
        for ms in (0..20).map(|n| 95_000 + n * 200) {
            tracker.record_event(DeviceClass::Mouse, t(0) + Duration::milliseconds(ms));
        }

        let now = t(100);
        let mut previous = f64::INFINITY;
        for window in [6, 10, 15, 30, 60, 120, 300] {
            let rate = tracker.frequency(DeviceClass::Mouse, now, window);
            assert!(rate <= previous, "window {window}: {rate} > {previous}");
            previous = rate;
        }
    }

    #[test]
    fn capacity_evicts_oldest_and_undercounts() {
        let mut tracker = InputActivityTracker::new(
            t(0),
            InputConfig {
                capacity: 3,
                idle_threshold: Duration::seconds(300),
            },
        );
        for secs in 1..=5 {
            tracker.record_event(DeviceClass::Keyboard, t(secs));
        }

        // Five events inside the window, only three retained.
        assert!((tracker.frequency(DeviceClass::Keyboard, t(10), 60) - 3.0).abs() < 1e-9);
        assert_eq!(tracker.summary(t(10)).total_keyboard_events, 5);
    }

    #[test]
    fn late_event_does_not_rewind_idle_clock() {
        let mut tracker = tracker_with_threshold(30);
        tracker.record_event(DeviceClass::Keyboard, t(20));
        tracker.record_event(DeviceClass::Keyboard, t(10));
        assert_eq!(tracker.last_activity_time(), t(20));
        assert!(tracker.check_idle(t(45)).is_none());
    }

    #[test]
    fn late_event_after_idle_is_stamped_at_idle_detection() {
        let mut tracker = tracker_with_threshold(30);
        tracker.check_idle(t(40)).unwrap();

        let change = tracker.record_event(DeviceClass::Keyboard, t(35)).unwrap();
        assert_eq!(change, StateChange::active(t(40)));
        assert!(!tracker.is_idle());
        assert_eq!(tracker.last_activity_time(), t(35));
    }

    #[test]
    fn resume_after_stored_idle_queues_active_first() {
        let shared = SharedInputTracker::new(tracker_with_threshold(30));
        assert!(
            shared
                .resume_after(&StateChange::active(t(-10)), t(0))
                .is_none()
        );

        let stored = StateChange::idle(t(-50), Duration::seconds(30));
        assert_eq!(
            shared.resume_after(&stored, t(0)),
            Some(StateChange::active(t(0)))
        );
        shared.check_idle(t(30)).unwrap();

        let mut states = Vec::new();
        shared
            .drain_state_changes(|change| {
                states.push(change.state);
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(states, vec![ActivityState::Active, ActivityState::Idle]);
    }

    #[test]
    fn parse_errors_name_the_bad_value() {
        assert_eq!("mouse".parse::<DeviceClass>(), Ok(DeviceClass::Mouse));
        assert_eq!(
            "pen".parse::<DeviceClass>().unwrap_err().to_string(),
            "unknown device class: pen"
        );
        assert_eq!("idle".parse::<ActivityState>(), Ok(ActivityState::Idle));
        assert_eq!(
            "asleep".parse::<ActivityState>(),
            Err(UnknownActivityState("asleep".to_string()))
        );
    }

    #[test]
    fn summary_reports_idle_duration_and_totals() {
        let mut tracker = tracker_with_threshold(30);
        tracker.record_event(DeviceClass::Keyboard, t(5));
        tracker.record_event(DeviceClass::Mouse, t(8));

        let summary = tracker.summary(t(18));
        assert_eq!(summary.total_keyboard_events, 1);
        assert_eq!(summary.total_mouse_events, 1);
        assert!(!summary.is_idle);
        assert_eq!(summary.last_activity, t(8));
        assert!((summary.idle_duration - 10.0).abs() < 1e-9);
        assert!((summary.keyboard_frequency - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sample_covers_trailing_window() {
        let mut tracker = tracker_with_threshold(300);
        for secs in [1, 50, 55] {
            tracker.record_event(DeviceClass::Mouse, t(secs));
        }
        let sample = tracker.sample(DeviceClass::Mouse, t(60), 30);
        assert_eq!(sample.event_count, 2);
        assert!((sample.frequency_per_minute - 4.0).abs() < 1e-9);
        assert_eq!(sample.window_start, t(30));
        assert_eq!(sample.window_end, t(60));
    }

    #[test]
    fn mouse_presses_are_not_counted() {
        let shared = SharedInputTracker::new(tracker_with_threshold(300));
        shared.on_mouse_event(t(1), true);
        shared.on_mouse_event(t(1), false);
        shared.on_key_event(t(2));

        let summary = shared.summary(t(3));
        assert_eq!(summary.total_mouse_events, 1);
        assert_eq!(summary.total_keyboard_events, 1);
    }

    #[test]
    fn events_after_detach_are_dropped() {
        let shared = SharedInputTracker::new(tracker_with_threshold(10));
        shared.check_idle(t(20)).unwrap();
        shared.detach();

        assert!(!shared.record_event(DeviceClass::Keyboard, t(21)));
        assert!(shared.summary(t(22)).is_idle);
        assert_eq!(shared.summary(t(22)).total_keyboard_events, 0);
        assert_eq!(shared.pending_state_changes(), 1);
    }

    #[test]
    fn failed_drain_requeues_change_at_front() {
        let shared = SharedInputTracker::new(tracker_with_threshold(10));
        shared.check_idle(t(10)).unwrap();
        shared.record_event(DeviceClass::Keyboard, t(11));

        let err = shared.drain_state_changes(|_| Err("db locked")).unwrap_err();
        assert_eq!(err, "db locked");
        assert_eq!(shared.pending_state_changes(), 2);

        let mut seen = Vec::new();
        let delivered = shared
            .drain_state_changes(|change| {
                seen.push(change.state);
                Ok::<_, ()>(())
            })
            .unwrap();
        assert_eq!(delivered, 2);
        assert_eq!(seen, vec![ActivityState::Idle, ActivityState::Active]);
    }

    #[test]
    fn concurrent_events_and_idle_checks_keep_alternation() {
        let shared = SharedInputTracker::new(tracker_with_threshold(1));
        let producer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for n in 0..500 {
                    shared.on_key_event(t(n * 2));
                }
            })
        };
        for n in 0..500 {
            shared.check_idle(t(n * 2 + 1));
        }
        producer.join().unwrap();

        let mut states = Vec::new();
        shared
            .drain_state_changes(|change| {
                states.push(change.state);
                Ok::<_, ()>(())
            })
            .unwrap();
        for pair in states.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert_eq!(shared.summary(t(2000)).total_keyboard_events, 500);
    }
}
