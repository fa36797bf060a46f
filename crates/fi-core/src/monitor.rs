//! The polling driver: probe, trackers, input detector and delivery.
//!
//! A [`Monitor`] is ticked by its owner at 1 Hz or faster. Each tick probes
//! the focused window once, feeds the sample to both session trackers, runs
//! the idle check and then delivers whatever the trackers queued. Delivery
//! writes to the [`Recorder`] first and only then fans out to the handler
//! chain; a session the recorder rejects stays queued in its tracker.

use std::error::Error;

use chrono::{DateTime, Duration, Utc};

use crate::browser::BrowserSessionTracker;
use crate::handler::{DispatchError, HandlerChain, HandlerError, RECORDER};
use crate::input::{
    ActivitySummary, DEFAULT_WINDOW_SECS, DeviceClass, InputActivitySample, InputActivityTracker,
    InputConfig, InputListener, SharedInputTracker, StateChange,
};
use crate::probe::{FocusProbe, FocusedWindow};
use crate::session::{Observation, Session, SessionSink, SessionTracker, WindowSessionTracker};

/// Durable storage for everything the monitor produces.
pub trait Recorder {
    type Error: Error + Send + Sync + 'static;

    fn record_session(&mut self, session: &Session) -> Result<(), Self::Error>;

    fn record_state_change(&mut self, change: &StateChange) -> Result<(), Self::Error>;

    fn record_input_sample(&mut self, sample: &InputActivitySample) -> Result<(), Self::Error>;

    /// The most recent stored state change, from this run or an earlier one.
    fn last_state_change(&self) -> Result<Option<StateChange>, Self::Error>;
}

/// Monitor tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorConfig {
    pub input: InputConfig,
    /// How often an input sample is recorded per device class.
    pub sample_interval: Duration,
    /// Trailing window each input sample covers.
    pub sample_window_secs: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            sample_interval: Duration::seconds(30),
            sample_window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

/// What one tick observed and delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub focused: Option<FocusedWindow>,
    pub window: Observation,
    pub browser: Observation,
    pub state_change: Option<StateChange>,
    pub sessions_recorded: usize,
    pub samples_recorded: usize,
}

/// Hands sessions to the recorder, then to the handlers.
struct Delivery<'a, R> {
    recorder: &'a mut R,
    handlers: &'a mut HandlerChain,
    failures: &'a mut Vec<HandlerError>,
}

impl<R: Recorder> SessionSink for Delivery<'_, R> {
    type Error = R::Error;

    fn accept(&mut self, session: &Session) -> Result<(), Self::Error> {
        self.recorder.record_session(session)?;
        let failed = self.handlers.dispatch_session(session);
        self.failures.extend(failed);
        Ok(())
    }
}

/// Focus and input monitor driven by [`Monitor::tick`].
pub struct Monitor<P, R> {
    probe: P,
    recorder: R,
    windows: WindowSessionTracker,
    browser: BrowserSessionTracker,
    input: SharedInputTracker,
    handlers: HandlerChain,
    config: MonitorConfig,
    started_at: DateTime<Utc>,
    last_sample_at: DateTime<Utc>,
    /// Whether the stored state history has been reconciled with this run.
    resumed: bool,
    listener: Option<Box<dyn InputListener>>,
}

impl<P: FocusProbe, R: Recorder> Monitor<P, R> {
    pub fn new(probe: P, recorder: R, started_at: DateTime<Utc>, config: MonitorConfig) -> Self {
        Self {
            probe,
            recorder,
            windows: WindowSessionTracker::new(),
            browser: BrowserSessionTracker::new(),
            input: SharedInputTracker::new(InputActivityTracker::new(started_at, config.input)),
            handlers: HandlerChain::new(),
            config,
            started_at,
            last_sample_at: started_at,
            resumed: false,
            listener: None,
        }
    }

    #[must_use]
    pub fn with_handlers(mut self, handlers: HandlerChain) -> Self {
        self.handlers = handlers;
        self
    }

    /// Handle for an input event source to push events into.
    pub fn input(&self) -> SharedInputTracker {
        self.input.clone()
    }

    /// Registers the input hook to detach on [`Monitor::stop`].
    pub fn attach_listener(&mut self, listener: Box<dyn InputListener>) {
        self.listener = Some(listener);
    }

    pub const fn windows(&self) -> &WindowSessionTracker {
        &self.windows
    }

    pub const fn browser(&self) -> &BrowserSessionTracker {
        &self.browser
    }

    pub const fn recorder(&self) -> &R {
        &self.recorder
    }

    pub fn recorder_mut(&mut self) -> &mut R {
        &mut self.recorder
    }

    pub fn into_recorder(self) -> R {
        self.recorder
    }

    /// Current input activity.
    pub fn summary(&self, now: DateTime<Utc>) -> ActivitySummary {
        self.input.summary(now)
    }

    /// Runs one polling step.
    ///
    /// Observation always completes. Recorder and handler failures are
    /// collected and returned after every delivery was attempted; sessions
    /// the recorder rejected stay queued for the next tick.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<TickReport, DispatchError> {
        let focused = match self.probe.focused_window() {
            Ok(focused) => focused,
            Err(err) => {
                tracing::debug!(error = %err, "focus probe failed, treating as no window");
                None
            }
        };
        let window = self.windows.observe_window(focused.as_ref(), now);
        let browser = self.browser.observe_window(focused.as_ref(), now);

        let mut failures = Vec::new();
        if !self.resumed {
            self.resume(&mut failures);
        }
        let state_change = self.input.check_idle(now);
        tracing::debug!(?window, ?browser, "tick");

        let sessions_recorded = self.deliver_sessions(&mut failures);
        self.deliver_state_changes(&mut failures);
        let samples_recorded = if now.signed_duration_since(self.last_sample_at)
            >= self.config.sample_interval
        {
            self.record_samples(now, &mut failures)
        } else {
            0
        };

        DispatchError::from_failures(failures)?;
        Ok(TickReport {
            focused,
            window,
            browser,
            state_change,
            sessions_recorded,
            samples_recorded,
        })
    }

    /// Shuts down: detaches input, flushes both trackers and delivers any
    /// remaining state changes.
    ///
    /// Returns the sessions closed by the flush. A recorder failure leaves
    /// the affected open session in place, so `stop` may be called again.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<Vec<Session>, DispatchError> {
        self.input.detach();
        if let Some(mut listener) = self.listener.take() {
            if let Err(err) = listener.detach() {
                tracing::warn!(error = %err, "input listener did not detach cleanly");
            }
        }

        let mut failures = Vec::new();
        let mut flushed = Vec::new();
        let trackers: [&mut SessionTracker; 2] = [&mut self.windows, &mut self.browser];
        for tracker in trackers {
            let mut sink = Delivery {
                recorder: &mut self.recorder,
                handlers: &mut self.handlers,
                failures: &mut failures,
            };
            match tracker.flush(now, &mut sink) {
                Ok(session) => flushed.extend(session),
                Err(err) => {
                    tracing::warn!(kind = %tracker.kind(), error = %err, "flush failed");
                    failures.push(HandlerError::new(RECORDER, err));
                }
            }
        }
        self.deliver_state_changes(&mut failures);

        DispatchError::from_failures(failures)?;
        tracing::info!(flushed = flushed.len(), "monitor stopped");
        Ok(flushed)
    }

    /// A run starts active. If the stored history ended idle, an `active`
    /// change is queued first so the stored sequence keeps alternating.
    fn resume(&mut self, failures: &mut Vec<HandlerError>) {
        match self.recorder.last_state_change() {
            Ok(last) => {
                self.resumed = true;
                let resumed = last.and_then(|last| self.input.resume_after(&last, self.started_at));
                if let Some(change) = resumed {
                    tracing::debug!(timestamp = %change.timestamp, "resuming after stored idle");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored activity state");
                failures.push(HandlerError::new(RECORDER, err));
            }
        }
    }

    fn deliver_sessions(&mut self, failures: &mut Vec<HandlerError>) -> usize {
        let trackers: [&mut SessionTracker; 2] = [&mut self.windows, &mut self.browser];
        let mut delivered = 0;
        for tracker in trackers {
            let mut sink = Delivery {
                recorder: &mut self.recorder,
                handlers: &mut self.handlers,
                failures: &mut *failures,
            };
            match tracker.deliver(&mut sink) {
                Ok(count) => delivered += count,
                Err(err) => {
                    tracing::warn!(
                        kind = %tracker.kind(),
                        pending = tracker.pending().len(),
                        error = %err,
                        "session not recorded"
                    );
                    failures.push(HandlerError::new(RECORDER, err));
                }
            }
        }
        delivered
    }

    fn deliver_state_changes(&mut self, failures: &mut Vec<HandlerError>) {
        let recorder = &mut self.recorder;
        let handlers = &mut self.handlers;
        let mut dispatched = Vec::new();
        let result = self.input.drain_state_changes(|change| {
            recorder.record_state_change(change)?;
            dispatched.extend(handlers.dispatch_state_change(change));
            Ok::<(), R::Error>(())
        });
        failures.extend(dispatched);
        if let Err(err) = result {
            tracing::warn!(error = %err, "state change not recorded");
            failures.push(HandlerError::new(RECORDER, err));
        }
    }

    fn record_samples(&mut self, now: DateTime<Utc>, failures: &mut Vec<HandlerError>) -> usize {
        let mut recorded = 0;
        for class in DeviceClass::ALL {
            let sample = self.input.sample(class, now, self.config.sample_window_secs);
            match self.recorder.record_input_sample(&sample) {
                Ok(()) => recorded += 1,
                Err(err) => failures.push(HandlerError::new(RECORDER, err)),
            }
        }
        self.last_sample_at = now;
        recorded
    }
}
