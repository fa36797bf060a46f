//! The OS probe contract: which window holds focus right now.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Identity;

/// The focused top-level window as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusedWindow {
    pub process_name: String,
    pub window_title: String,
}

impl FocusedWindow {
    pub fn new(process_name: impl Into<String>, window_title: impl Into<String>) -> Self {
        Self {
            process_name: process_name.into(),
            window_title: window_title.into(),
        }
    }

    /// Window identity: process name plus full window title.
    pub fn identity(&self) -> Identity {
        Identity::new(self.process_name.clone(), self.window_title.clone())
    }
}

/// Errors from a focus probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The windowing system could not be queried.
    #[error("focus probe unavailable: {0}")]
    Unavailable(String),
}

/// Reports the currently focused window.
///
/// Called at least once per second; the most recent call reflects the
/// current state. `Ok(None)` means nothing holds focus (e.g. the desktop).
pub trait FocusProbe {
    fn focused_window(&self) -> Result<Option<FocusedWindow>, ProbeError>;
}

impl<P: FocusProbe + ?Sized> FocusProbe for Box<P> {
    fn focused_window(&self) -> Result<Option<FocusedWindow>, ProbeError> {
        (**self).focused_window()
    }
}
