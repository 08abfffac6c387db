//! UI-side consumer of gesture events.
//!
//! The tracker never touches UI state directly.  It sends events on a
//! channel and the owner of this state drains them on its own schedule.

use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::debug;

use super::gesture::GestureEvent;

/// State owned by the UI execution context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub menu_open: bool,
    /// Capture requests not yet taken by the capture collaborator.
    pub capture_requests: u32,
    /// Whether the sending side has gone away.
    pub disconnected: bool,
}

impl UiState {
    pub fn apply(&mut self, event: GestureEvent) {
        match event {
            GestureEvent::MenuOpen => self.menu_open = true,
            GestureEvent::MenuClose => self.menu_open = false,
            GestureEvent::CaptureTriggered => self.capture_requests += 1,
        }
        debug!("ui applied {}", event.as_str());
    }

    /// Apply every pending event without blocking.  Returns how many were applied.
    pub fn drain(&mut self, rx: &Receiver<GestureEvent>) -> usize {
        let mut applied = 0;
        loop {
            match rx.try_recv() {
                Ok(event) => {
                    self.apply(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        applied
    }

    /// Hand one pending capture to the capture collaborator.
    pub fn take_capture(&mut self) -> bool {
        if self.capture_requests == 0 {
            return false;
        }
        self.capture_requests -= 1;
        true
    }
}
