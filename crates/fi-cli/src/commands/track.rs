//! Foreground tracking loop.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::Utc;
use fi_core::{DispatchError, FocusProbe, HandlerChain, Monitor, Recorder, SessionLog};
use fi_db::Database;

use super::summary;
use crate::Config;
use crate::lock::TrackLock;
use crate::platform;

/// Polls until `running` is cleared or `ticks` polls have run.
///
/// Returns the number of ticks completed. Handler failures are logged and
/// tracking goes on; the first tick the database rejected ends the loop.
/// The caller still owns shutdown.
pub fn run_loop<P: FocusProbe, R: Recorder>(
    monitor: &mut Monitor<P, R>,
    running: &AtomicBool,
    ticks: Option<u64>,
    poll: StdDuration,
) -> Result<u64, DispatchError> {
    let mut completed = 0;
    while running.load(Ordering::SeqCst) && ticks.is_none_or(|limit| completed < limit) {
        let tick = monitor.tick(Utc::now());
        completed += 1;
        match tick {
            Ok(report) => {
                if let Some(change) = &report.state_change {
                    tracing::debug!(state = %change.state, "input state changed");
                }
            }
            Err(err) if err.recorder_failed() => return Err(err),
            Err(err) => tracing::warn!(error = %err, failures = err.len(), "handlers failed"),
        }
        if ticks.is_some_and(|limit| completed >= limit) {
            break;
        }
        std::thread::sleep(poll);
    }
    Ok(completed)
}

pub fn run<W: Write>(writer: &mut W, db: Database, config: &Config, ticks: Option<u64>) -> Result<()> {
    let _lock = TrackLock::acquire(&config.database_path)?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    let mut handlers = HandlerChain::new();
    handlers.add_session_handler(SessionLog::new(config.title_display_width));
    handlers.add_state_change_handler(SessionLog::new(config.title_display_width));

    let mut monitor = Monitor::new(
        platform::native_probe(),
        db,
        Utc::now(),
        config.monitor_config(),
    )
    .with_handlers(handlers);

    #[cfg(feature = "input-hooks")]
    {
        let listener = crate::hooks::RdevListener::spawn(monitor.input());
        monitor.attach_listener(Box::new(listener));
    }

    tracing::info!(database = %config.database_path.display(), "tracking started");
    let looped = run_loop(&mut monitor, &running, ticks, config.poll_interval());
    let stopped = monitor.stop(Utc::now());

    let completed = looped.context("tracking stopped after a failed database write")?;
    stopped.context("failed to flush open sessions")?;
    tracing::info!(ticks = completed, "tracking finished");

    let db = monitor.into_recorder();
    let today = db
        .daily_summary(Utc::now().date_naive())
        .context("failed to summarize today")?;
    summary::render(writer, &today)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use fi_core::{
        BoxError, FocusedWindow, InputActivitySample, MonitorConfig, ProbeError, Session,
        SessionHandler, StateChange,
    };

    struct FixedProbe(Option<FocusedWindow>);

    impl FocusProbe for FixedProbe {
        fn focused_window(&self) -> Result<Option<FocusedWindow>, ProbeError> {
            Ok(self.0.clone())
        }
    }

    /// Switches between two editor tabs on every poll.
    #[derive(Default)]
    struct SwitchingProbe(AtomicUsize);

    impl FocusProbe for SwitchingProbe {
        fn focused_window(&self) -> Result<Option<FocusedWindow>, ProbeError> {
            let title = if self.0.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
                "main.rs"
            } else {
                "lib.rs"
            };
            Ok(Some(FocusedWindow::new("code.exe", title)))
        }
    }

    struct BrokenHandler;

    impl SessionHandler for BrokenHandler {
        fn name(&self) -> &str {
            "broken"
        }

        fn on_session(&mut self, _session: &Session) -> Result<(), BoxError> {
            Err("handler down".into())
        }
    }

    struct ReadOnlyRecorder;

    impl Recorder for ReadOnlyRecorder {
        type Error = std::io::Error;

        fn record_session(&mut self, _session: &Session) -> Result<(), Self::Error> {
            Err(std::io::Error::other("read-only"))
        }

        fn record_state_change(&mut self, _change: &StateChange) -> Result<(), Self::Error> {
            Err(std::io::Error::other("read-only"))
        }

        fn record_input_sample(
            &mut self,
            _sample: &InputActivitySample,
        ) -> Result<(), Self::Error> {
            Err(std::io::Error::other("read-only"))
        }

        fn last_state_change(&self) -> Result<Option<StateChange>, Self::Error> {
            Err(std::io::Error::other("read-only"))
        }
    }

    fn monitor(window: Option<FocusedWindow>) -> Monitor<FixedProbe, Database> {
        Monitor::new(
            FixedProbe(window),
            Database::open_in_memory().unwrap(),
            Utc::now(),
            MonitorConfig::default(),
        )
    }

    #[test]
    fn run_loop_stops_after_tick_limit() {
        let mut monitor = monitor(Some(FocusedWindow::new("code.exe", "main.rs")));
        let running = AtomicBool::new(true);

        let completed = run_loop(&mut monitor, &running, Some(3), StdDuration::ZERO).unwrap();
        assert_eq!(completed, 3);
        assert!(monitor.windows().current().is_some());

        let flushed = monitor.stop(Utc::now()).unwrap();
        assert_eq!(flushed.len(), 1);
        let db = monitor.into_recorder();
        assert_eq!(db.record_counts().unwrap().window_sessions, 1);
        assert_eq!(db.record_counts().unwrap().browser_sessions, 0);
    }

    #[test]
    fn run_loop_exits_when_interrupted() {
        let mut monitor = monitor(None);
        let running = AtomicBool::new(false);

        let completed = run_loop(&mut monitor, &running, None, StdDuration::ZERO).unwrap();
        assert_eq!(completed, 0);
    }

    #[test]
    fn run_loop_keeps_going_when_a_handler_fails() {
        let mut handlers = HandlerChain::new();
        handlers.add_session_handler(BrokenHandler);
        let mut monitor = Monitor::new(
            SwitchingProbe::default(),
            Database::open_in_memory().unwrap(),
            Utc::now(),
            MonitorConfig::default(),
        )
        .with_handlers(handlers);
        let running = AtomicBool::new(true);

        let completed = run_loop(&mut monitor, &running, Some(4), StdDuration::ZERO).unwrap();
        assert_eq!(completed, 4);
        let db = monitor.recorder();
        assert_eq!(db.record_counts().unwrap().window_sessions, 3);
    }

    #[test]
    fn run_loop_stops_when_the_database_rejects_a_tick() {
        let mut monitor = Monitor::new(
            SwitchingProbe::default(),
            ReadOnlyRecorder,
            Utc::now(),
            MonitorConfig::default(),
        );
        let running = AtomicBool::new(true);

        let err = run_loop(&mut monitor, &running, Some(4), StdDuration::ZERO).unwrap_err();
        assert!(err.recorder_failed());
        assert!(err.to_string().starts_with("recorder: read-only"));
    }
}
