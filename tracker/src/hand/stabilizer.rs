//! Temporal stabilization of the lifted skeleton and hand presence.
//!
//! Each observed joint is jump-clamped against its last stable position,
//! then blended into its smoothed position with a class-dependent factor.
//! Presence alpha rises on detected frames and decays over the fade
//! duration otherwise.  Joint entries are never removed; they go stale
//! and callers mask them with presence alpha.

use tracing::{debug, info};

use super::joints::{JointClass, JointId, JOINT_COUNT};

/// Largest per-frame displacement accepted from a joint (meters).
pub const MAX_JUMP_M: f32 = 0.10;

/// Presence alpha added per detected frame.
pub const PRESENCE_STEP: f32 = 0.22;

/// Presence alpha above which derived output is shown.
pub const VISIBILITY_THRESHOLD: f32 = 0.01;

/// Upper bound for any smoothing factor.
pub const MAX_SMOOTHING: f32 = 0.95;

/// Effective EMA weight on the previous value for a joint class.
pub fn smoothing_factor(class: JointClass, base: f32) -> f32 {
    (base + class.smoothing_offset()).clamp(0.0, MAX_SMOOTHING)
}

/// Limit `raw` to within `max_jump` of `prev`, along the direction of travel.
pub fn clamp_jump(prev: [f32; 3], raw: [f32; 3], max_jump: f32) -> [f32; 3] {
    let d = [raw[0] - prev[0], raw[1] - prev[1], raw[2] - prev[2]];
    let len = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt();
    if len <= max_jump || len <= f32::EPSILON {
        return raw;
    }
    let k = max_jump / len;
    [prev[0] + d[0] * k, prev[1] + d[1] * k, prev[2] + d[2] * k]
}

fn blend(prev: [f32; 3], next: [f32; 3], s: f32) -> [f32; 3] {
    [
        prev[0] * s + next[0] * (1.0 - s),
        prev[1] * s + next[1] * (1.0 - s),
        prev[2] * s + next[2] * (1.0 - s),
    ]
}

// ── Per-joint state ────────────────────────────────────────

/// Smoothing history for one joint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointTrack {
    /// Output of the exponential moving average.
    pub smoothed: [f32; 3],
    /// Last jump-clamped raw sample.
    pub stable: [f32; 3],
    /// Frame timestamp of the last observation (seconds).
    pub last_seen: f64,
}

/// Smoothing history for all joints of one tracked hand.
#[derive(Debug, Clone, Default)]
pub struct StabilizationState {
    tracks: [Option<JointTrack>; JOINT_COUNT],
}

impl StabilizationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, joint: JointId) -> Option<&JointTrack> {
        self.tracks[joint.index()].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, &JointTrack)> + '_ {
        self.tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| Some((JointId::from_index(i)?, t.as_ref()?)))
    }

    /// Joints with history that were not observed at frame time `t`.
    pub fn stale_joints(&self, t: f64) -> impl Iterator<Item = JointId> + '_ {
        self.iter()
            .filter(move |(_, track)| track.last_seen < t)
            .map(|(joint, _)| joint)
    }

    /// Number of joints that have ever been observed.
    pub fn tracked_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_some()).count()
    }

    /// Feed one raw sample and return the smoothed position.
    pub fn observe(&mut self, joint: JointId, raw: [f32; 3], base: f32, t: f64) -> [f32; 3] {
        let slot = &mut self.tracks[joint.index()];
        let track = match slot {
            Some(track) => {
                let stable = clamp_jump(track.stable, raw, MAX_JUMP_M);
                let s = smoothing_factor(joint.class(), base);
                JointTrack {
                    smoothed: blend(track.smoothed, stable, s),
                    stable,
                    last_seen: t,
                }
            }
            None => JointTrack {
                smoothed: raw,
                stable: raw,
                last_seen: t,
            },
        };
        *slot = Some(track);
        track.smoothed
    }

    pub fn reset(&mut self) {
        self.tracks = Default::default();
    }
}

// ── Presence ───────────────────────────────────────────────

/// Fade-in/fade-out scalar for the whole hand.
#[derive(Debug, Clone, Default)]
pub struct PresenceState {
    alpha: f32,
    /// Timestamp of the last detected frame.
    last_seen: Option<f64>,
    /// Timestamp of the last frame of either kind.
    last_update: Option<f64>,
}

impl PresenceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn last_seen(&self) -> Option<f64> {
        self.last_seen
    }

    pub fn is_visible(&self) -> bool {
        self.alpha > VISIBILITY_THRESHOLD
    }

    /// A frame in which the hand was detected.
    pub fn detected(&mut self, t: f64) {
        let was_visible = self.is_visible();
        self.alpha = (self.alpha + PRESENCE_STEP).min(1.0);
        self.last_seen = Some(t);
        self.last_update = Some(t);
        if !was_visible && self.is_visible() {
            info!("hand appeared at {:.3}s", t);
        }
    }

    /// A frame in which the hand was not observed.  Alpha decays by
    /// `1 / fade_seconds` per second of frame time since the last frame.
    pub fn missed(&mut self, t: f64, fade_seconds: f32) {
        let was_visible = self.is_visible();
        let dt = match self.last_update {
            Some(prev) => (t - prev).max(0.0) as f32,
            None => 0.0,
        };
        self.last_update = Some(t);
        if fade_seconds > 0.0 {
            self.alpha = (self.alpha - dt / fade_seconds).max(0.0);
        } else {
            self.alpha = 0.0;
        }
        if was_visible && !self.is_visible() {
            info!("hand lost at {:.3}s", t);
        }
    }
}

// ── Stabilizer ─────────────────────────────────────────────

/// Joint smoothing plus presence for a single tracked hand.
#[derive(Debug, Clone)]
pub struct JointStabilizer {
    joints: StabilizationState,
    presence: PresenceState,
    smoothing_base: f32,
    fade_seconds: f32,
}

impl JointStabilizer {
    pub fn new(smoothing_base: f32, fade_seconds: f32) -> Self {
        Self {
            joints: StabilizationState::new(),
            presence: PresenceState::new(),
            smoothing_base,
            fade_seconds,
        }
    }

    pub fn set_smoothing_base(&mut self, base: f32) {
        self.smoothing_base = base;
    }

    pub fn set_fade_seconds(&mut self, seconds: f32) {
        self.fade_seconds = seconds;
    }

    pub fn joints(&self) -> &StabilizationState {
        &self.joints
    }

    pub fn presence(&self) -> &PresenceState {
        &self.presence
    }

    /// Commit one detected frame of raw joints and raise presence.
    pub fn update(&mut self, t: f64, raw: &[(JointId, [f32; 3])]) {
        for (joint, position) in raw {
            self.joints.observe(*joint, *position, self.smoothing_base, t);
        }
        self.presence.detected(t);
        debug!(
            "stabilized {} joints, presence {:.2}",
            raw.len(),
            self.presence.alpha()
        );
    }

    /// Record a frame without a usable hand.
    pub fn miss(&mut self, t: f64) {
        self.presence.missed(t, self.fade_seconds);
    }

    pub fn reset(&mut self) {
        self.joints.reset();
        self.presence = PresenceState::new();
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
fn dist(a: [f32; 3], b: [f32; 3]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothing_factor_by_class() {
        let base = 0.5;
        assert!((smoothing_factor(JointClass::Wrist, base) - 0.35).abs() < 1e-6);
        assert!((smoothing_factor(JointClass::Base, base) - 0.5).abs() < 1e-6);
        assert!((smoothing_factor(JointClass::Proximal, base) - 0.53).abs() < 1e-6);
        assert!((smoothing_factor(JointClass::Distal, base) - 0.56).abs() < 1e-6);
        assert!((smoothing_factor(JointClass::Tip, base) - 0.60).abs() < 1e-6);
    }

    #[test]
    fn test_smoothing_factor_clamped() {
        assert_eq!(smoothing_factor(JointClass::Tip, 0.95), MAX_SMOOTHING);
        assert_eq!(smoothing_factor(JointClass::Wrist, 0.05), 0.0);
    }

    #[test]
    fn test_clamp_jump_exact_distance_on_ray() {
        let p = [0.1, -0.2, 0.5];
        let raw = [0.6, 0.3, 0.9];
        let c = clamp_jump(p, raw, MAX_JUMP_M);
        assert!((dist(p, c) - MAX_JUMP_M).abs() < 1e-5, "distance {}", dist(p, c));
        // Collinear and on the same side: |p-c| + |c-raw| == |p-raw|
        let along = dist(p, c) + dist(c, raw) - dist(p, raw);
        assert!(along.abs() < 1e-5, "not on ray, slack {}", along);
    }

    #[test]
    fn test_clamp_jump_small_move_untouched() {
        let p = [0.0, 0.0, 0.5];
        let raw = [0.03, 0.02, 0.52];
        assert_eq!(clamp_jump(p, raw, MAX_JUMP_M), raw);
    }

    #[test]
    fn test_first_observation_seeds() {
        let mut state = StabilizationState::new();
        let out = state.observe(JointId::IndexTip, [0.1, 0.2, 0.4], 0.6, 0.0);
        assert_eq!(out, [0.1, 0.2, 0.4]);
        let track = state.get(JointId::IndexTip).unwrap();
        assert_eq!(track.stable, [0.1, 0.2, 0.4]);
        assert_eq!(state.tracked_count(), 1);
    }

    #[test]
    fn test_second_observation_blends() {
        let mut state = StabilizationState::new();
        state.observe(JointId::IndexMcp, [0.0, 0.0, 0.5], 0.5, 0.0);
        let out = state.observe(JointId::IndexMcp, [0.04, 0.0, 0.5], 0.5, 0.1);
        // Base class, s = 0.5
        assert!((out[0] - 0.02).abs() < 1e-6, "got {}", out[0]);
    }

    #[test]
    fn test_wrist_tracks_more_directly_than_tip() {
        let mut state = StabilizationState::new();
        state.observe(JointId::Wrist, [0.0, 0.0, 0.5], 0.5, 0.0);
        state.observe(JointId::ThumbTip, [0.0, 0.0, 0.5], 0.5, 0.0);
        let w = state.observe(JointId::Wrist, [0.05, 0.0, 0.5], 0.5, 0.1);
        let t = state.observe(JointId::ThumbTip, [0.05, 0.0, 0.5], 0.5, 0.1);
        assert!(w[0] > t[0], "wrist {} should lead tip {}", w[0], t[0]);
    }

    #[test]
    fn test_converges_under_constant_input() {
        let mut state = StabilizationState::new();
        state.observe(JointId::RingTip, [0.0, 0.0, 0.4], 0.9, 0.0);
        let target = [0.25, -0.1, 0.6];
        let mut out = [0.0; 3];
        for i in 1..400 {
            out = state.observe(JointId::RingTip, target, 0.9, i as f64 / 15.0);
        }
        assert!(dist(out, target) < 1e-4, "did not converge: {:?}", out);
    }

    #[test]
    fn test_presence_rises_monotonically_and_saturates() {
        let mut p = PresenceState::new();
        let mut prev = p.alpha();
        for i in 0..10 {
            p.detected(i as f64 / 15.0);
            assert!(p.alpha() >= prev);
            assert!(p.alpha() <= 1.0);
            prev = p.alpha();
        }
        assert_eq!(p.alpha(), 1.0);
    }

    #[test]
    fn test_presence_full_after_five_detections() {
        let mut p = PresenceState::new();
        for i in 0..4 {
            p.detected(i as f64 / 15.0);
        }
        assert!(p.alpha() < 1.0);
        p.detected(4.0 / 15.0);
        assert_eq!(p.alpha(), 1.0);
    }

    #[test]
    fn test_presence_decays_monotonically_to_zero() {
        let mut p = PresenceState::new();
        for i in 0..5 {
            p.detected(i as f64 / 15.0);
        }
        let mut prev = p.alpha();
        let mut t = 5.0 / 15.0;
        for _ in 0..20 {
            t += 1.0 / 15.0;
            p.missed(t, 0.35);
            assert!(p.alpha() <= prev);
            assert!(p.alpha() >= 0.0);
            prev = p.alpha();
        }
        assert_eq!(p.alpha(), 0.0);
        assert!(!p.is_visible());
    }

    #[test]
    fn test_presence_decay_rate() {
        let mut p = PresenceState::new();
        for i in 0..5 {
            p.detected(i as f64 * 0.1);
        }
        p.missed(0.4 + 0.1, 0.5);
        assert!((p.alpha() - 0.8).abs() < 1e-5, "got {}", p.alpha());
    }

    #[test]
    fn test_presence_first_miss_has_no_elapsed_time() {
        let mut p = PresenceState::new();
        p.missed(10.0, 0.35);
        assert_eq!(p.alpha(), 0.0);
        assert!(p.last_seen().is_none());
    }

    #[test]
    fn test_stabilizer_miss_keeps_stale_joints() {
        let mut stab = JointStabilizer::new(0.55, 0.35);
        stab.update(0.0, &[(JointId::Wrist, [0.0, 0.0, 0.5])]);
        assert!(stab.presence().is_visible());
        for i in 1..20 {
            stab.miss(i as f64 / 15.0);
        }
        assert!(!stab.presence().is_visible());
        // Entry remains, only masked by presence
        assert!(stab.joints().get(JointId::Wrist).is_some());
    }

    #[test]
    fn test_stale_joints_by_last_seen() {
        let mut state = StabilizationState::new();
        state.observe(JointId::Wrist, [0.0, 0.0, 0.5], 0.55, 0.0);
        state.observe(JointId::IndexTip, [0.1, 0.0, 0.5], 0.55, 0.0);
        state.observe(JointId::Wrist, [0.0, 0.0, 0.5], 0.55, 0.1);
        assert_eq!(state.get(JointId::IndexTip).map(|t| t.last_seen), Some(0.0));
        let stale: Vec<JointId> = state.stale_joints(0.1).collect();
        assert_eq!(stale, vec![JointId::IndexTip]);
        assert_eq!(state.stale_joints(0.2).count(), 2);
        let order: Vec<JointId> = state.iter().map(|(j, _)| j).collect();
        assert_eq!(order, vec![JointId::Wrist, JointId::IndexTip]);
    }
}
