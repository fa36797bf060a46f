//! OS focus probes.

use fi_core::{FocusProbe, FocusedWindow, ProbeError};

#[cfg(target_os = "linux")]
pub mod linux;

/// A probe for platforms (or sessions) without a usable windowing system.
///
/// Always unavailable, so no window session ever opens.
#[derive(Debug, Clone)]
pub struct UnavailableProbe {
    reason: String,
}

impl UnavailableProbe {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl FocusProbe for UnavailableProbe {
    fn focused_window(&self) -> Result<Option<FocusedWindow>, ProbeError> {
        Err(ProbeError::Unavailable(self.reason.clone()))
    }
}

/// The best probe for this machine.
///
/// Falls back to [`UnavailableProbe`] when the native probe cannot start
/// (e.g. no `DISPLAY`), so tracking still records input activity.
#[cfg(target_os = "linux")]
pub fn native_probe() -> Box<dyn FocusProbe> {
    match linux::X11Probe::connect() {
        Ok(probe) => Box::new(probe),
        Err(err) => {
            tracing::warn!(error = %err, "window focus unavailable, tracking input only");
            Box::new(UnavailableProbe::new(err.to_string()))
        }
    }
}

/// The best probe for this machine.
#[cfg(not(target_os = "linux"))]
pub fn native_probe() -> Box<dyn FocusProbe> {
    tracing::warn!("no focus probe for this platform, tracking input only");
    Box::new(UnavailableProbe::new("unsupported platform"))
}
