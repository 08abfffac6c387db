//! Gesture events shared by the swipe and tap recognizers.

/// Discrete, edge-triggered gesture outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureEvent {
    /// Leftward swipe while the menu was closed.
    MenuOpen,
    /// Rightward swipe while the menu was open.
    MenuClose,
    /// Two pinch taps inside a fist within the tap window.
    CaptureTriggered,
}

impl GestureEvent {
    /// String representation for logs and status lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MenuOpen => "menu-open",
            Self::MenuClose => "menu-close",
            Self::CaptureTriggered => "capture",
        }
    }
}

/// Read/write access to the menu's open state.
///
/// The swipe recognizer only opens a closed menu and only closes an open
/// one, so it needs the current value before deciding to fire.
pub trait MenuToggle {
    fn is_menu_open(&self) -> bool;
    fn set_menu_open(&mut self, open: bool);
}

/// Plain in-memory [`MenuToggle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MenuFlag {
    pub open: bool,
}

impl MenuToggle for MenuFlag {
    fn is_menu_open(&self) -> bool {
        self.open
    }

    fn set_menu_open(&mut self, open: bool) {
        self.open = open;
    }
}
