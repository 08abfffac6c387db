//! Pinch-tap recognition gated on a closed fist.
//!
//! While the middle, ring and little fingers are curled uniformly toward
//! the wrist, each rising edge of a thumb-index pinch counts as a tap.
//! Two taps inside the tap window fire a capture.  Losing the fist or
//! running out the window clears the count.

use tracing::debug;

use super::gesture::GestureEvent;
use super::joints::JointId;
use super::landmarks::LandmarkSet;

// ── Config ─────────────────────────────────────────────────

/// Thresholds for pinch/fist tap recognition.
#[derive(Debug, Clone)]
pub struct TapConfig {
    /// Confidence each curled fingertip needs to count toward the fist.
    pub fist_tip_confidence: f32,
    /// Maximum mean fingertip-to-wrist distance for a fist (normalized).
    pub fist_max_distance: f32,
    /// Maximum max-min spread of fingertip-to-wrist distances.
    pub fist_max_spread: f32,
    /// Confidence thumb and index tips need for a pinch reading.
    pub pinch_tip_confidence: f32,
    /// Confidence the wrist needs for either gate.
    pub wrist_confidence: f32,
    /// Thumb-index distance below which the hand is pinching (normalized).
    pub pinch_threshold: f32,
    /// Window from the first tap in which the second must land (seconds).
    pub tap_window_s: f64,
    /// Quiet period after a capture (seconds).
    pub cooldown_s: f64,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            fist_tip_confidence: 0.5,
            fist_max_distance: 0.28,
            fist_max_spread: 0.10,
            pinch_tip_confidence: 0.5,
            wrist_confidence: 0.2,
            pinch_threshold: 0.06,
            tap_window_s: 1.0,
            cooldown_s: 2.0,
        }
    }
}

/// Tap counter state.
#[derive(Debug, Clone, Default)]
pub struct TapState {
    pub count: u32,
    /// Timestamp of the first tap of the current sequence.
    pub first_tap: Option<f64>,
    /// Pinch reading of the previous usable frame.
    pub last_pinch: bool,
    /// Timestamp of the last capture.
    pub last_trigger: Option<f64>,
}

impl TapState {
    fn clear_count(&mut self) {
        self.count = 0;
        self.first_tap = None;
    }
}

// ── Gates ──────────────────────────────────────────────────

/// Fist classification.  `None` when the wrist or too few of the curled
/// fingertips are confident enough to decide.
pub fn fist_gate(landmarks: &LandmarkSet, config: &TapConfig) -> Option<bool> {
    let wrist = landmarks.confident(JointId::Wrist, config.wrist_confidence)?;
    let distances: Vec<f32> = [JointId::MiddleTip, JointId::RingTip, JointId::LittleTip]
        .iter()
        .filter_map(|j| landmarks.confident(*j, config.fist_tip_confidence))
        .map(|tip| tip.distance(wrist))
        .collect();
    if distances.len() < 2 {
        return None;
    }
    let avg = distances.iter().sum::<f32>() / distances.len() as f32;
    let min = distances.iter().copied().fold(f32::INFINITY, f32::min);
    let max = distances.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    Some(avg < config.fist_max_distance && (max - min) < config.fist_max_spread)
}

/// Pinch classification.  `None` when thumb, index or wrist confidence
/// is too low to decide.
pub fn pinch_gate(landmarks: &LandmarkSet, config: &TapConfig) -> Option<bool> {
    let thumb = landmarks.get(JointId::ThumbTip).filter(|l| l.confidence > config.pinch_tip_confidence)?;
    let index = landmarks.get(JointId::IndexTip).filter(|l| l.confidence > config.pinch_tip_confidence)?;
    landmarks.get(JointId::Wrist).filter(|l| l.confidence > config.wrist_confidence)?;
    Some(thumb.distance(index) < config.pinch_threshold)
}

// ── Detector ───────────────────────────────────────────────

/// Pinch/fist tap recognizer.
#[derive(Debug, Clone, Default)]
pub struct TapDetector {
    pub config: TapConfig,
    state: TapState,
}

impl TapDetector {
    pub fn new(config: TapConfig) -> Self {
        Self {
            config,
            state: TapState::default(),
        }
    }

    pub fn state(&self) -> &TapState {
        &self.state
    }

    /// Feed one frame.  Returns an event when a capture fires.
    pub fn update(&mut self, landmarks: &LandmarkSet, t: f64) -> Option<GestureEvent> {
        if landmarks.is_empty() {
            return None;
        }
        let fist = fist_gate(landmarks, &self.config)?;

        let rising = match pinch_gate(landmarks, &self.config) {
            Some(pinch) => {
                let rising = pinch && !self.state.last_pinch;
                self.state.last_pinch = pinch;
                rising
            }
            None => false,
        };

        if !fist {
            if self.state.count > 0 {
                debug!("tap count cleared: fist lost at {:.3}s", t);
            }
            self.state.clear_count();
            return None;
        }

        if let Some(first) = self.state.first_tap {
            if t - first > self.config.tap_window_s {
                debug!("tap count cleared: window expired at {:.3}s", t);
                self.state.clear_count();
            }
        }

        if !rising {
            return None;
        }
        if self.state.count == 0 {
            self.state.first_tap = Some(t);
        }
        self.state.count += 1;
        debug!("tap {} at {:.3}s", self.state.count, t);
        if self.state.count < 2 {
            return None;
        }

        self.state.clear_count();
        if let Some(last) = self.state.last_trigger {
            if t - last < self.config.cooldown_s {
                debug!("capture suppressed by cooldown at {:.3}s", t);
                return None;
            }
        }
        self.state.last_trigger = Some(t);
        debug!("capture triggered at {:.3}s", t);
        Some(GestureEvent::CaptureTriggered)
    }

    pub fn reset(&mut self) {
        self.state = TapState::default();
    }
}

// ── Test helpers ───────────────────────────────────────────

/// A fisted hand, optionally pinching thumb to index.
#[cfg(test)]
pub(crate) fn fist_hand(pinch: bool) -> LandmarkSet {
    use super::landmarks::Landmark;

    let index = if pinch {
        Landmark::new(0.42, 0.43, 0.9)
    } else {
        Landmark::new(0.40, 0.55, 0.9)
    };
    LandmarkSet::new()
        .with(JointId::Wrist, Landmark::new(0.5, 0.3, 0.9))
        .with(JointId::MiddleTip, Landmark::new(0.48, 0.45, 0.9))
        .with(JointId::RingTip, Landmark::new(0.52, 0.44, 0.9))
        .with(JointId::LittleTip, Landmark::new(0.56, 0.42, 0.9))
        .with(JointId::ThumbTip, Landmark::new(0.40, 0.42, 0.9))
        .with(JointId::IndexTip, index)
}

#[cfg(test)]
fn open_hand(pinch: bool) -> LandmarkSet {
    use super::landmarks::Landmark;

    let mut hand = fist_hand(pinch);
    hand.insert(JointId::MiddleTip, Landmark::new(0.48, 0.75, 0.9));
    hand.insert(JointId::RingTip, Landmark::new(0.55, 0.72, 0.9));
    hand.insert(JointId::LittleTip, Landmark::new(0.62, 0.66, 0.9));
    hand
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::Landmark;

    /// Run frames every 0.05s up to `end`, pinching on the given index ranges.
    fn run(det: &mut TapDetector, end: usize, pinches: &[std::ops::Range<usize>]) -> Vec<f64> {
        let mut fired = Vec::new();
        for i in 0..=end {
            let t = i as f64 * 0.05;
            let pinch = pinches.iter().any(|r| r.contains(&i));
            if det.update(&fist_hand(pinch), t).is_some() {
                fired.push(t);
            }
        }
        fired
    }

    #[test]
    fn test_gates_on_fixture() {
        let config = TapConfig::default();
        assert_eq!(fist_gate(&fist_hand(false), &config), Some(true));
        assert_eq!(fist_gate(&open_hand(false), &config), Some(false));
        assert_eq!(pinch_gate(&fist_hand(true), &config), Some(true));
        assert_eq!(pinch_gate(&fist_hand(false), &config), Some(false));
    }

    #[test]
    fn test_two_taps_in_window_capture_once() {
        let mut det = TapDetector::default();
        // Edges at t=0.10 and t=0.60
        let fired = run(&mut det, 20, &[2..4, 12..14]);
        assert_eq!(fired.len(), 1, "got {:?}", fired);
        assert!((fired[0] - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_taps_outside_window_do_not_capture() {
        let mut det = TapDetector::default();
        // Edges at t=0.10 and t=1.50
        let fired = run(&mut det, 34, &[2..4, 30..32]);
        assert!(fired.is_empty(), "got {:?}", fired);
        assert_eq!(det.state().count, 1, "late tap starts a new sequence");
    }

    #[test]
    fn test_losing_fist_clears_count() {
        let mut det = TapDetector::default();
        assert!(det.update(&fist_hand(false), 0.0).is_none());
        assert!(det.update(&fist_hand(true), 0.1).is_none());
        assert_eq!(det.state().count, 1);
        assert!(det.update(&open_hand(false), 0.2).is_none());
        assert_eq!(det.state().count, 0);
        assert!(det.update(&fist_hand(false), 0.3).is_none());
        assert!(det.update(&fist_hand(true), 0.4).is_none());
        assert_eq!(det.state().count, 1);
    }

    #[test]
    fn test_pinch_held_into_fist_is_not_a_tap() {
        let mut det = TapDetector::default();
        det.update(&open_hand(true), 0.0);
        det.update(&fist_hand(true), 0.1);
        assert_eq!(det.state().count, 0);
    }

    #[test]
    fn test_cooldown_blocks_second_capture() {
        let mut det = TapDetector::default();
        // Capture at 0.60, another full sequence completes at 1.60 (< 2.0s later)
        let fired = run(&mut det, 40, &[2..4, 12..14, 22..24, 32..34]);
        assert_eq!(fired.len(), 1, "got {:?}", fired);

        // After the cooldown a new sequence fires again
        let mut later = Vec::new();
        for (i, pinch) in [(0, false), (1, true), (2, false), (3, true)] {
            let t = 3.0 + i as f64 * 0.1;
            if det.update(&fist_hand(pinch), t).is_some() {
                later.push(t);
            }
        }
        assert_eq!(later.len(), 1);
    }

    #[test]
    fn test_empty_frame_is_ignored() {
        let mut det = TapDetector::default();
        det.update(&fist_hand(true), 0.1);
        assert_eq!(det.state().count, 1);
        assert!(det.update(&LandmarkSet::new(), 0.2).is_none());
        assert_eq!(det.state().count, 1);
        assert!(det.state().last_pinch);
    }

    #[test]
    fn test_low_confidence_pinch_preserves_state() {
        let mut det = TapDetector::default();
        det.update(&fist_hand(true), 0.1);
        let mut blurry = fist_hand(false);
        blurry.insert(JointId::IndexTip, Landmark::new(0.40, 0.55, 0.2));
        det.update(&blurry, 0.15);
        assert!(det.state().last_pinch, "unreadable pinch should not release");
        assert_eq!(det.state().count, 1);
    }
}
