//! X11 focus probe using EWMH properties.

use std::fmt::Display;

use fi_core::{FocusProbe, FocusedWindow, ProbeError};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

/// Maximum property length fetched, in 32-bit units.
const MAX_PROPERTY_LEN: u32 = 1024;

/// Reads the active window from the root window's `_NET_ACTIVE_WINDOW`.
pub struct X11Probe {
    conn: RustConnection,
    root: Window,
    net_active_window: Atom,
    net_wm_name: Atom,
    utf8_string: Atom,
}

impl X11Probe {
    /// Connects to the display named by `DISPLAY`.
    pub fn connect() -> Result<Self, ProbeError> {
        let (conn, screen_num) = x11rb::connect(None).map_err(unavailable)?;
        let root = conn
            .setup()
            .roots
            .get(screen_num)
            .map(|screen| screen.root)
            .ok_or_else(|| ProbeError::Unavailable(format!("no X screen {screen_num}")))?;
        let net_active_window = intern(&conn, "_NET_ACTIVE_WINDOW")?;
        let net_wm_name = intern(&conn, "_NET_WM_NAME")?;
        let utf8_string = intern(&conn, "UTF8_STRING")?;
        tracing::debug!(screen = screen_num, "connected to X server");
        Ok(Self {
            conn,
            root,
            net_active_window,
            net_wm_name,
            utf8_string,
        })
    }

    fn property(
        &self,
        window: Window,
        property: Atom,
        kind: impl Into<Atom>,
    ) -> Result<Vec<u8>, ProbeError> {
        let reply = self
            .conn
            .get_property(false, window, property, kind, 0, MAX_PROPERTY_LEN)
            .map_err(unavailable)?
            .reply()
            .map_err(unavailable)?;
        Ok(reply.value)
    }

    fn active_window(&self) -> Result<Option<Window>, ProbeError> {
        let reply = self
            .conn
            .get_property(
                false,
                self.root,
                self.net_active_window,
                AtomEnum::WINDOW,
                0,
                1,
            )
            .map_err(unavailable)?
            .reply()
            .map_err(unavailable)?;
        Ok(reply
            .value32()
            .and_then(|mut ids| ids.next())
            .filter(|&id| id != 0))
    }

    fn window_title(&self, window: Window) -> Result<String, ProbeError> {
        let title = self.property(window, self.net_wm_name, self.utf8_string)?;
        if !title.is_empty() {
            return Ok(String::from_utf8_lossy(&title).into_owned());
        }
        let legacy = self.property(window, AtomEnum::WM_NAME.into(), AtomEnum::STRING)?;
        Ok(String::from_utf8_lossy(&legacy).into_owned())
    }

    fn process_name(&self, window: Window) -> Result<String, ProbeError> {
        let class = self.property(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING)?;
        Ok(parse_wm_class(&class).unwrap_or_else(|| "unknown".to_string()))
    }
}

impl FocusProbe for X11Probe {
    fn focused_window(&self) -> Result<Option<FocusedWindow>, ProbeError> {
        let Some(window) = self.active_window()? else {
            return Ok(None);
        };
        Ok(Some(FocusedWindow::new(
            self.process_name(window)?,
            self.window_title(window)?,
        )))
    }
}

/// Application name from a `WM_CLASS` value (`instance\0class\0`).
///
/// Prefers the class, which names the application (`firefox`), over the
/// instance, which may name a role (`Navigator`).
fn parse_wm_class(raw: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(raw);
    let mut parts = text.split('\0').filter(|part| !part.is_empty());
    let instance = parts.next();
    parts.next().or(instance).map(str::to_string)
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom, ProbeError> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .map_err(unavailable)?
        .reply()
        .map_err(unavailable)?
        .atom)
}

fn unavailable(err: impl Display) -> ProbeError {
    ProbeError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wm_class_prefers_class_over_instance() {
        assert_eq!(
            parse_wm_class(b"Navigator\0firefox\0"),
            Some("firefox".to_string())
        );
        assert_eq!(parse_wm_class(b"xterm\0"), Some("xterm".to_string()));
        assert_eq!(parse_wm_class(b""), None);
    }

    #[test]
    #[ignore] // Requires X11 display
    fn reads_active_window() {
        let probe = X11Probe::connect().unwrap();
        if let Some(window) = probe.focused_window().unwrap() {
            println!("Active: {} - {}", window.process_name, window.window_title);
        }
    }
}
