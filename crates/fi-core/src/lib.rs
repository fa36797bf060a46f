//! Core domain logic for focus tracking.
//!
//! This crate contains the fundamental types and state machines for:
//! - Window sessions: turning polled focus samples into closed sessions
//! - Browser sessions: the same, keyed by a page identity parsed from the title
//! - Input activity: rolling keyboard/mouse frequency and idle detection
//! - Delivery: ordered handler fan-out and the driver-facing [`Monitor`]

pub mod browser;
pub mod handler;
pub mod identity;
pub mod input;
pub mod monitor;
pub mod probe;
mod range;
pub mod report;
pub mod session;

pub use browser::{BrowserSessionTracker, browser_name, page_identity, parse_page_title};
pub use handler::{
    BoxError, DispatchError, HandlerChain, HandlerError, RECORDER, SessionHandler, SessionLog,
    StateChangeHandler,
};
pub use identity::{Identity, SubjectKind, UnknownSubjectKind, truncate_chars};
pub use input::{
    ActivityState, ActivitySummary, DeviceClass, InputActivitySample, InputActivityTracker,
    InputConfig, InputEventSink, InputListener, ListenerError, SharedInputTracker, StateChange,
    UnknownActivityState, UnknownDeviceClass,
};
pub use monitor::{Monitor, MonitorConfig, Recorder, TickReport};
pub use probe::{FocusProbe, FocusedWindow, ProbeError};
pub use range::TimeRange;
pub use report::{AppAggregate, DailySummary, Export, focus_efficiency};
pub use session::{
    Observation, OpenSession, Session, SessionSink, SessionTracker, WindowSessionTracker,
    millis_to_seconds,
};
