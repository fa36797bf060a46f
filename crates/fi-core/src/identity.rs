//! Subject identities: what held focus.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of subject a session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// A top-level application window.
    Window,
    /// A browser tab, identified by its page title.
    BrowserTab,
}

impl SubjectKind {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Window => "window",
            Self::BrowserTab => "browser_tab",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown subject kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown subject kind: {0}")]
pub struct UnknownSubjectKind(pub String);

impl FromStr for SubjectKind {
    type Err = UnknownSubjectKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "window" => Ok(Self::Window),
            "browser_tab" => Ok(Self::BrowserTab),
            _ => Err(UnknownSubjectKind(s.to_string())),
        }
    }
}

/// The tuple distinguishing one subject from another.
///
/// For windows this is the process name and window title; for browser tabs
/// it is the browser name and page title. Equality and ordering are
/// structural over the full strings. Truncated labels from
/// [`Identity::display`] are for humans only and never take part in
/// comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity {
    pub app: String,
    pub title: String,
}

impl Identity {
    pub fn new(app: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            title: title.into(),
        }
    }

    /// Full human-readable label, `app - title`.
    pub fn label(&self) -> String {
        if self.title.is_empty() {
            self.app.clone()
        } else {
            format!("{} - {}", self.app, self.title)
        }
    }

    /// Label with the title cut to at most `max_title_chars` characters.
    pub fn display(&self, max_title_chars: usize) -> String {
        if self.title.is_empty() {
            return self.app.clone();
        }
        format!("{} - {}", self.app, truncate_chars(&self.title, max_title_chars))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Truncates to `max` characters, appending `...` when anything was cut.
///
/// Counts `char`s, so multi-byte titles are never split mid-codepoint.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
        None => s.to_string(),
    }
}
