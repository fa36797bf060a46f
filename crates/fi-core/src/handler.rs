//! Callbacks fired for closed sessions and idle/active transitions.
//!
//! Handlers are registered before tracking starts and run in registration
//! order. One failing handler never prevents the others from running; every
//! failure is collected and reported together.

use std::error::Error;
use std::fmt;

use crate::identity::truncate_chars;
use crate::input::StateChange;
use crate::session::Session;

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Name under which persistence failures are reported.
pub const RECORDER: &str = "recorder";

/// A failure from one handler (or the recorder), tagged with its name.
#[derive(Debug)]
pub struct HandlerError {
    pub name: String,
    pub source: BoxError,
}

impl HandlerError {
    pub fn new(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.source)
    }
}

impl Error for HandlerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Every failure raised while dispatching one event batch.
#[derive(Debug, Default)]
pub struct DispatchError {
    pub failures: Vec<HandlerError>,
}

impl DispatchError {
    /// `Ok(())` if nothing failed, otherwise all collected failures.
    pub fn from_failures(failures: Vec<HandlerError>) -> Result<(), Self> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self { failures })
        }
    }

    pub fn merge(&mut self, other: Self) {
        self.failures.extend(other.failures);
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether any failure came from persistence rather than a handler.
    pub fn recorder_failed(&self) -> bool {
        self.failures.iter().any(|failure| failure.name == RECORDER)
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failures.as_slice() {
            [] => f.write_str("no failures"),
            [only] => write!(f, "{only}"),
            [first, rest @ ..] => write!(f, "{first} (and {} more)", rest.len()),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.failures.first().map(|e| e as &(dyn Error + 'static))
    }
}

/// Called once per emitted session.
pub trait SessionHandler: Send {
    fn name(&self) -> &str;

    fn on_session(&mut self, session: &Session) -> Result<(), BoxError>;
}

/// Called once per idle/active transition.
pub trait StateChangeHandler: Send {
    fn name(&self) -> &str;

    fn on_state_change(&mut self, change: &StateChange) -> Result<(), BoxError>;
}

/// Ordered handler lists.
#[derive(Default)]
pub struct HandlerChain {
    sessions: Vec<Box<dyn SessionHandler>>,
    state_changes: Vec<Box<dyn StateChangeHandler>>,
}

impl fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerChain")
            .field(
                "sessions",
                &self.sessions.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .field(
                "state_changes",
                &self.state_changes.iter().map(|h| h.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl HandlerChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session_handler(&mut self, handler: impl SessionHandler + 'static) {
        self.sessions.push(Box::new(handler));
    }

    pub fn add_state_change_handler(&mut self, handler: impl StateChangeHandler + 'static) {
        self.state_changes.push(Box::new(handler));
    }

    /// Runs every session handler; returns the failures.
    pub fn dispatch_session(&mut self, session: &Session) -> Vec<HandlerError> {
        self.sessions
            .iter_mut()
            .filter_map(|handler| {
                handler.on_session(session).err().map(|source| {
                    tracing::warn!(handler = handler.name(), error = %source, "session handler failed");
                    HandlerError {
                        name: handler.name().to_string(),
                        source,
                    }
                })
            })
            .collect()
    }

    /// Runs every state-change handler; returns the failures.
    pub fn dispatch_state_change(&mut self, change: &StateChange) -> Vec<HandlerError> {
        self.state_changes
            .iter_mut()
            .filter_map(|handler| {
                handler.on_state_change(change).err().map(|source| {
                    tracing::warn!(handler = handler.name(), error = %source, "state change handler failed");
                    HandlerError {
                        name: handler.name().to_string(),
                        source,
                    }
                })
            })
            .collect()
    }
}

/// Logs each session and state change with a truncated label.
#[derive(Debug, Clone, Copy)]
pub struct SessionLog {
    title_width: usize,
}

impl SessionLog {
    pub const fn new(title_width: usize) -> Self {
        Self { title_width }
    }
}

impl SessionHandler for SessionLog {
    fn name(&self) -> &str {
        "session-log"
    }

    fn on_session(&mut self, session: &Session) -> Result<(), BoxError> {
        tracing::info!(
            kind = %session.subject_kind,
            app = %session.identity.app,
            title = %truncate_chars(&session.identity.title, self.title_width),
            duration_seconds = session.duration_seconds,
            "recorded session"
        );
        Ok(())
    }
}

impl StateChangeHandler for SessionLog {
    fn name(&self) -> &str {
        "session-log"
    }

    fn on_state_change(&mut self, change: &StateChange) -> Result<(), BoxError> {
        match change.idle_duration {
            Some(idle) => tracing::info!(state = %change.state, idle_seconds = idle, "user went idle"),
            None => tracing::info!(state = %change.state, "user active"),
        }
        Ok(())
    }
}
