//! Browser tab sessions derived from window titles.
//!
//! Page identity is best-effort: browsers put the page title in the window
//! title followed by a fixed suffix (` - Google Chrome`). No URL is captured.

use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};

use crate::identity::{Identity, SubjectKind};
use crate::probe::FocusedWindow;
use crate::session::{Observation, SessionTracker};

/// Known browser process names (lowercase) and their display names.
const BROWSERS: &[(&str, &str)] = &[
    ("chrome.exe", "Chrome"),
    ("msedge.exe", "Edge"),
    ("firefox.exe", "Firefox"),
    ("iexplore.exe", "Internet Explorer"),
    ("opera.exe", "Opera"),
    ("google-chrome", "Chrome"),
    ("chromium", "Chromium"),
    ("chromium-browser", "Chromium"),
    ("firefox", "Firefox"),
    ("microsoft-edge", "Edge"),
    ("brave-browser", "Brave"),
    ("opera", "Opera"),
];

/// Window title suffixes appended by browsers after the page title.
const TITLE_SUFFIXES: &[&str] = &[
    " - Google Chrome",
    " - Microsoft Edge",
    " - Mozilla Firefox",
    " \u{2014} Mozilla Firefox",
    " - Chromium",
    " - Brave",
    " - Opera",
];

/// Display name of the browser running as `process_name`, if it is one.
pub fn browser_name(process_name: &str) -> Option<&'static str> {
    let lower = process_name.to_ascii_lowercase();
    BROWSERS
        .iter()
        .find(|(process, _)| *process == lower)
        .map(|(_, name)| *name)
}

/// Page title with the browser suffix removed.
///
/// Returns `None` when no known suffix is present or nothing remains.
pub fn parse_page_title(window_title: &str) -> Option<&str> {
    TITLE_SUFFIXES
        .iter()
        .find_map(|suffix| window_title.strip_suffix(suffix))
        .map(str::trim)
        .filter(|page| !page.is_empty())
}

/// Browser-tab identity for a focused window: browser name plus page title.
pub fn page_identity(window: &FocusedWindow) -> Option<Identity> {
    let browser = browser_name(&window.process_name)?;
    let page = parse_page_title(&window.window_title)?;
    Some(Identity::new(browser, page))
}

/// Tracks which browser page holds focus.
///
/// Focus moving to a non-browser window closes the open page session, the
/// same as an unresolvable sample.
#[derive(Debug)]
pub struct BrowserSessionTracker {
    inner: SessionTracker,
}

impl BrowserSessionTracker {
    pub const fn new() -> Self {
        Self {
            inner: SessionTracker::new(SubjectKind::BrowserTab),
        }
    }

    pub fn observe_window(
        &mut self,
        focused: Option<&FocusedWindow>,
        now: DateTime<Utc>,
    ) -> Observation {
        self.inner.observe(focused.and_then(page_identity), now)
    }
}

impl Default for BrowserSessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for BrowserSessionTracker {
    type Target = SessionTracker;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for BrowserSessionTracker {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
