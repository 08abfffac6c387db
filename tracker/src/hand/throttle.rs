//! Frame admission rate limiting.
//!
//! Camera frames arrive faster than detection needs to run.  Frames are
//! admitted at most once per `1 / max_rate_hz` seconds; everything in
//! between is dropped before any work is done.

use tracing::trace;

/// Slack for timestamps that land a hair before the next slot.
const SLOT_TOLERANCE_S: f64 = 1e-6;

/// Minimum-interval frame gate.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    min_interval_s: f64,
    last_accepted: Option<f64>,
}

impl FrameThrottle {
    pub fn new(max_rate_hz: f64) -> Self {
        let mut throttle = Self {
            min_interval_s: 0.0,
            last_accepted: None,
        };
        throttle.set_max_rate(max_rate_hz);
        throttle
    }

    /// Change the admission rate.  Non-positive or non-finite rates disable limiting.
    pub fn set_max_rate(&mut self, max_rate_hz: f64) {
        self.min_interval_s = if max_rate_hz.is_finite() && max_rate_hz > 0.0 {
            1.0 / max_rate_hz
        } else {
            0.0
        };
    }

    pub fn min_interval(&self) -> f64 {
        self.min_interval_s
    }

    pub fn last_accepted(&self) -> Option<f64> {
        self.last_accepted
    }

    /// Whether a frame stamped `t` should be processed.
    ///
    /// Frames stamped at or before the last admitted frame are always
    /// dropped so downstream timestamps stay strictly increasing.
    pub fn accept(&mut self, t: f64) -> bool {
        if !t.is_finite() {
            trace!("dropping frame with non-finite timestamp");
            return false;
        }
        if let Some(last) = self.last_accepted {
            if t <= last {
                trace!("dropping non-monotonic frame {:.3}s (last {:.3}s)", t, last);
                return false;
            }
            if t - last + SLOT_TOLERANCE_S < self.min_interval_s {
                return false;
            }
        }
        self.last_accepted = Some(t);
        true
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(15.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_accepted() {
        let mut th = FrameThrottle::default();
        assert!(th.accept(12.5));
        assert_eq!(th.last_accepted(), Some(12.5));
    }

    #[test]
    fn test_sixty_hz_input_admitted_at_fifteen() {
        let mut th = FrameThrottle::new(15.0);
        let admitted = (0..60).filter(|i| th.accept(*i as f64 / 60.0)).count();
        assert_eq!(admitted, 15);
    }

    #[test]
    fn test_exact_interval_is_admitted() {
        let mut th = FrameThrottle::new(10.0);
        assert!(th.accept(0.0));
        assert!(!th.accept(0.05));
        assert!(th.accept(0.1));
        assert!(th.accept(0.2));
    }

    #[test]
    fn test_non_monotonic_dropped() {
        let mut th = FrameThrottle::new(0.0);
        assert!(th.accept(1.0));
        assert!(!th.accept(1.0));
        assert!(!th.accept(0.5));
        assert!(th.accept(1.01));
        assert!(!th.accept(f64::NAN));
    }

    #[test]
    fn test_reset_and_rate_change() {
        let mut th = FrameThrottle::new(1.0);
        assert!(th.accept(0.0));
        assert!(!th.accept(0.5));
        th.set_max_rate(4.0);
        assert!(th.accept(0.5));
        th.reset();
        assert_eq!(th.last_accepted(), None);
        assert!(th.accept(0.1));
    }
}
