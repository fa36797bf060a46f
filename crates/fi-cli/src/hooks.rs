//! Global keyboard and mouse hooks via `rdev`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::{DateTime, Utc};
use fi_core::{InputEventSink, InputListener, ListenerError};
use rdev::{Event, EventType, listen};

/// Background thread forwarding OS input events to a sink.
///
/// `rdev::listen` never returns while the hook is installed, so detaching
/// stops forwarding rather than removing the hook; the thread ends with the
/// process.
pub struct RdevListener {
    forwarding: Arc<AtomicBool>,
    failed: Arc<AtomicBool>,
}

impl RdevListener {
    pub fn spawn<S>(sink: S) -> Self
    where
        S: InputEventSink + 'static,
    {
        let forwarding = Arc::new(AtomicBool::new(true));
        let failed = Arc::new(AtomicBool::new(false));
        {
            let forwarding = Arc::clone(&forwarding);
            let failed = Arc::clone(&failed);
            thread::spawn(move || {
                let result = listen(move |event| {
                    if forwarding.load(Ordering::Relaxed) {
                        forward(&sink, &event);
                    }
                });
                if let Err(err) = result {
                    failed.store(true, Ordering::SeqCst);
                    tracing::warn!(error = ?err, "input hook stopped, idle detection only");
                }
            });
        }
        Self { forwarding, failed }
    }
}

fn forward<S: InputEventSink>(sink: &S, event: &Event) {
    let timestamp = DateTime::<Utc>::from(event.time);
    match event.event_type {
        EventType::KeyPress(_) => sink.on_key_event(timestamp),
        EventType::ButtonPress(_) => sink.on_mouse_event(timestamp, true),
        EventType::ButtonRelease(_) => sink.on_mouse_event(timestamp, false),
        _ => {}
    }
}

impl InputListener for RdevListener {
    fn detach(&mut self) -> Result<(), ListenerError> {
        self.forwarding.store(false, Ordering::SeqCst);
        if self.failed.load(Ordering::SeqCst) {
            return Err(ListenerError("input hook had already failed".to_string()));
        }
        Ok(())
    }
}
