//! Horizontal swipe recognition for opening and closing the menu.
//!
//! Tracks the centroid of the four non-thumb fingertips.  Signed
//! horizontal displacement accumulates inside a fixed window; when the
//! window runs out it restarts instead of sliding.  A swipe fires when
//! both the accumulated displacement and the instantaneous velocity
//! pass their thresholds in the same direction.

use tracing::debug;

use super::gesture::{GestureEvent, MenuToggle};
use super::joints::JointId;
use super::landmarks::LandmarkSet;

// ── Config ─────────────────────────────────────────────────

/// Thresholds for swipe recognition, in normalized units and seconds.
#[derive(Debug, Clone)]
pub struct SwipeConfig {
    /// Minimum confidence for each of the four fingertips.
    pub min_tip_confidence: f32,
    /// Fingertip spread below which the hand is treated as closed.
    pub min_spread: f32,
    /// Accumulation window (seconds).
    pub window_s: f64,
    /// Quiet period after a trigger (seconds).
    pub cooldown_s: f64,
    /// Accumulated displacement needed to fire.
    pub min_displacement: f32,
    /// Instantaneous velocity needed to fire (units/second).
    pub min_velocity: f32,
    /// Fingertip signal loss after which tracking restarts (seconds).
    pub lost_timeout_s: f64,
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            min_tip_confidence: 0.3,
            min_spread: 0.06,
            window_s: 0.35,
            cooldown_s: 0.60,
            min_displacement: 0.18,
            min_velocity: 0.85,
            lost_timeout_s: 0.25,
        }
    }
}

// ── Window state ───────────────────────────────────────────

/// Rolling accumulation state.
#[derive(Debug, Clone, Default)]
pub struct GestureWindow {
    /// Centroid x of the previous sample.
    pub last_x: Option<f32>,
    /// Timestamp of the previous sample.
    pub last_t: Option<f64>,
    /// Start of the current accumulation window.
    pub window_start: f64,
    /// Signed horizontal displacement inside the window.
    pub accumulated: f32,
    /// Timestamp of the last fired swipe.
    pub last_trigger: Option<f64>,
    /// Timestamp of the last frame with a usable fingertip signal.
    pub last_seen: Option<f64>,
}

impl GestureWindow {
    /// Forget the trajectory but keep the cooldown gate.
    fn reset_tracking(&mut self) {
        self.last_x = None;
        self.last_t = None;
        self.window_start = 0.0;
        self.accumulated = 0.0;
        self.last_seen = None;
    }
}

/// Centroid x and spread of the four swipe fingertips.
fn fingertip_signal(landmarks: &LandmarkSet, min_confidence: f32) -> Option<(f32, f32)> {
    let mut tips = [[0.0f32; 2]; 4];
    for (slot, joint) in tips.iter_mut().zip(JointId::swipe_fingertips()) {
        *slot = landmarks.confident(joint, min_confidence)?.position();
    }
    let cx = tips.iter().map(|p| p[0]).sum::<f32>() / 4.0;
    let mut spread = 0.0f32;
    for i in 0..4 {
        for j in (i + 1)..4 {
            let dx = tips[i][0] - tips[j][0];
            let dy = tips[i][1] - tips[j][1];
            spread = spread.max((dx * dx + dy * dy).sqrt());
        }
    }
    Some((cx, spread))
}

// ── Detector ───────────────────────────────────────────────

/// Swipe recognizer state machine.
#[derive(Debug, Clone, Default)]
pub struct SwipeDetector {
    pub config: SwipeConfig,
    window: GestureWindow,
}

impl SwipeDetector {
    pub fn new(config: SwipeConfig) -> Self {
        Self {
            config,
            window: GestureWindow::default(),
        }
    }

    pub fn window(&self) -> &GestureWindow {
        &self.window
    }

    fn in_cooldown(&self, t: f64) -> bool {
        self.window
            .last_trigger
            .is_some_and(|last| t - last < self.config.cooldown_s)
    }

    /// Feed one frame.  Returns an event when a swipe fires.
    pub fn update(
        &mut self,
        landmarks: &LandmarkSet,
        t: f64,
        menu: &mut dyn MenuToggle,
    ) -> Option<GestureEvent> {
        let signal = fingertip_signal(landmarks, self.config.min_tip_confidence)
            .filter(|(_, spread)| *spread >= self.config.min_spread);

        let cx = match signal {
            Some((cx, _)) => cx,
            None => {
                if let Some(seen) = self.window.last_seen {
                    if t - seen > self.config.lost_timeout_s {
                        debug!("swipe tracking reset after {:.2}s without fingertips", t - seen);
                        self.window.reset_tracking();
                    }
                }
                return None;
            }
        };
        self.window.last_seen = Some(t);

        let (last_x, last_t) = match (self.window.last_x, self.window.last_t) {
            (Some(x), Some(lt)) => (x, lt),
            _ => {
                self.window.last_x = Some(cx);
                self.window.last_t = Some(t);
                self.window.window_start = t;
                self.window.accumulated = 0.0;
                return None;
            }
        };

        let dt = t - last_t;
        if dt <= 0.0 {
            return None;
        }
        let dx = cx - last_x;
        self.window.last_x = Some(cx);
        self.window.last_t = Some(t);

        if t - self.window.window_start > self.config.window_s {
            self.window.window_start = last_t;
            self.window.accumulated = 0.0;
        }
        self.window.accumulated += dx;

        if self.in_cooldown(t) {
            return None;
        }

        let velocity = dx / dt as f32;
        let acc = self.window.accumulated;
        let event = if acc <= -self.config.min_displacement
            && velocity <= -self.config.min_velocity
            && !menu.is_menu_open()
        {
            menu.set_menu_open(true);
            GestureEvent::MenuOpen
        } else if acc >= self.config.min_displacement
            && velocity >= self.config.min_velocity
            && menu.is_menu_open()
        {
            menu.set_menu_open(false);
            GestureEvent::MenuClose
        } else {
            return None;
        };

        debug!(
            "swipe {} at {:.3}s: displacement {:.3}, velocity {:.2}",
            event.as_str(),
            t,
            acc,
            velocity
        );
        self.window.last_trigger = Some(t);
        self.window.accumulated = 0.0;
        self.window.window_start = t;
        Some(event)
    }

    /// Reset all swipe state, including the cooldown gate.
    pub fn reset(&mut self) {
        self.window = GestureWindow::default();
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Four open fingertips centred on `cx` with 0.09 spread.
#[cfg(test)]
pub(crate) fn open_fingertips(cx: f32) -> LandmarkSet {
    use super::landmarks::Landmark;

    LandmarkSet::new()
        .with(JointId::IndexTip, Landmark::new(cx - 0.045, 0.6, 0.9))
        .with(JointId::MiddleTip, Landmark::new(cx - 0.015, 0.62, 0.9))
        .with(JointId::RingTip, Landmark::new(cx + 0.015, 0.61, 0.9))
        .with(JointId::LittleTip, Landmark::new(cx + 0.045, 0.58, 0.9))
}

#[cfg(test)]
fn closed_fingertips(cx: f32) -> LandmarkSet {
    use super::landmarks::Landmark;

    LandmarkSet::new()
        .with(JointId::IndexTip, Landmark::new(cx - 0.01, 0.5, 0.9))
        .with(JointId::MiddleTip, Landmark::new(cx, 0.5, 0.9))
        .with(JointId::RingTip, Landmark::new(cx + 0.01, 0.5, 0.9))
        .with(JointId::LittleTip, Landmark::new(cx + 0.02, 0.5, 0.9))
}

// ── Tests ──────────────────────────────────────────────────
