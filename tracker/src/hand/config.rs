//! Tunable parameters for the tracking core.
//!
//! Every numeric option is clamped into its documented range when it is
//! assigned, and again after bulk loading from TOML.  Out-of-range input
//! is never rejected.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use super::sampler::SamplerConfig;
use super::tap::TapConfig;
use super::unproject::{DepthRange, VerticalAxis};

/// Upper bound for `max_sample_points`.
pub const MAX_SAMPLE_POINTS_LIMIT: usize = 4096;

/// Minimum confident, liftable joints for a frame to count as a detection.
pub const MIN_DETECTED_JOINTS: usize = 8;

fn clamp_finite(value: f32, lo: f32, hi: f32) -> f32 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

fn clamp_finite_f64(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// Configuration for a [`HandTracker`](super::pipeline::HandTracker).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    smoothing_base: f32,
    hand_fade_seconds: f32,
    min_joint_confidence: f32,
    mist_global_alpha: f32,
    sample_radius: f32,
    jitter: f32,
    joint_bias: f32,
    max_sample_points: usize,
    pinch_threshold: f32,
    tap_window_seconds: f64,
    trigger_cooldown_seconds: f64,
    vertical_axis: VerticalAxis,
    joint_depth_range: DepthRange,
    cloud_depth_range: DepthRange,
    sample_seed: u64,
    max_frame_rate_hz: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            smoothing_base: 0.55,
            hand_fade_seconds: 0.35,
            min_joint_confidence: 0.35,
            mist_global_alpha: 0.85,
            sample_radius: 0.0028,
            jitter: 0.35,
            joint_bias: 0.5,
            max_sample_points: 600,
            pinch_threshold: 0.06,
            tap_window_seconds: 1.0,
            trigger_cooldown_seconds: 2.0,
            vertical_axis: VerticalAxis::Up,
            joint_depth_range: DepthRange::JOINTS,
            cloud_depth_range: DepthRange::CLOUD,
            sample_seed: 0,
            max_frame_rate_hz: 15.0,
        }
    }
}

impl TrackerConfig {
    /// Parse a TOML document.  Missing keys take defaults; values are clamped.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: TrackerConfig = toml::from_str(text).context("invalid tracker config")?;
        Ok(config.clamped())
    }

    /// Load and clamp a TOML config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Re-apply every range clamp.
    pub fn clamped(mut self) -> Self {
        self.set_smoothing_base(self.smoothing_base);
        self.set_hand_fade_seconds(self.hand_fade_seconds);
        self.set_min_joint_confidence(self.min_joint_confidence);
        self.set_mist_global_alpha(self.mist_global_alpha);
        self.set_sample_radius(self.sample_radius);
        self.set_jitter(self.jitter);
        self.set_joint_bias(self.joint_bias);
        self.set_pinch_threshold(self.pinch_threshold);
        self.set_tap_window_seconds(self.tap_window_seconds);
        self.set_trigger_cooldown_seconds(self.trigger_cooldown_seconds);
        self.set_max_frame_rate_hz(self.max_frame_rate_hz);
        self.max_sample_points = self.max_sample_points.clamp(1, MAX_SAMPLE_POINTS_LIMIT);
        self.joint_depth_range = DepthRange::new(self.joint_depth_range.near_m, self.joint_depth_range.far_m);
        self.cloud_depth_range = DepthRange::new(self.cloud_depth_range.near_m, self.cloud_depth_range.far_m);
        self
    }

    /// Builder for the construction-time point budget.
    pub fn with_max_sample_points(mut self, points: usize) -> Self {
        self.max_sample_points = points.clamp(1, MAX_SAMPLE_POINTS_LIMIT);
        self
    }

    pub fn with_sample_seed(mut self, seed: u64) -> Self {
        self.sample_seed = seed;
        self
    }

    pub fn with_vertical_axis(mut self, axis: VerticalAxis) -> Self {
        self.vertical_axis = axis;
        self
    }

    // ── Setters (clamping) ────────────────────────────────

    pub fn set_smoothing_base(&mut self, v: f32) {
        self.smoothing_base = clamp_finite(v, 0.0, 0.95);
    }

    pub fn set_hand_fade_seconds(&mut self, v: f32) {
        self.hand_fade_seconds = clamp_finite(v, 0.05, 0.75);
    }

    pub fn set_min_joint_confidence(&mut self, v: f32) {
        self.min_joint_confidence = clamp_finite(v, 0.10, 0.75);
    }

    pub fn set_mist_global_alpha(&mut self, v: f32) {
        self.mist_global_alpha = clamp_finite(v, 0.05, 1.0);
    }

    pub fn set_sample_radius(&mut self, v: f32) {
        self.sample_radius = clamp_finite(v, 0.0012, 0.0060);
    }

    pub fn set_jitter(&mut self, v: f32) {
        self.jitter = clamp_finite(v, 0.0, 1.0);
    }

    pub fn set_joint_bias(&mut self, v: f32) {
        self.joint_bias = clamp_finite(v, 0.0, 1.0);
    }

    pub fn set_pinch_threshold(&mut self, v: f32) {
        self.pinch_threshold = clamp_finite(v, 0.01, 0.20);
    }

    pub fn set_tap_window_seconds(&mut self, v: f64) {
        self.tap_window_seconds = clamp_finite_f64(v, 0.2, 3.0);
    }

    pub fn set_trigger_cooldown_seconds(&mut self, v: f64) {
        self.trigger_cooldown_seconds = clamp_finite_f64(v, 0.1, 10.0);
    }

    pub fn set_max_frame_rate_hz(&mut self, v: f64) {
        self.max_frame_rate_hz = clamp_finite_f64(v, 1.0, 120.0);
    }

    pub fn set_vertical_axis(&mut self, axis: VerticalAxis) {
        self.vertical_axis = axis;
    }

    pub fn set_joint_depth_range(&mut self, near_m: f32, far_m: f32) {
        self.joint_depth_range = DepthRange::new(near_m, far_m);
    }

    pub fn set_cloud_depth_range(&mut self, near_m: f32, far_m: f32) {
        self.cloud_depth_range = DepthRange::new(near_m, far_m);
    }

    // ── Getters ───────────────────────────────────────────

    pub fn smoothing_base(&self) -> f32 {
        self.smoothing_base
    }

    pub fn hand_fade_seconds(&self) -> f32 {
        self.hand_fade_seconds
    }

    pub fn min_joint_confidence(&self) -> f32 {
        self.min_joint_confidence
    }

    pub fn mist_global_alpha(&self) -> f32 {
        self.mist_global_alpha
    }

    /// Point radius for the renderer; does not affect sampling.
    pub fn sample_radius(&self) -> f32 {
        self.sample_radius
    }

    pub fn jitter(&self) -> f32 {
        self.jitter
    }

    pub fn joint_bias(&self) -> f32 {
        self.joint_bias
    }

    pub fn max_sample_points(&self) -> usize {
        self.max_sample_points
    }

    pub fn pinch_threshold(&self) -> f32 {
        self.pinch_threshold
    }

    pub fn tap_window_seconds(&self) -> f64 {
        self.tap_window_seconds
    }

    pub fn trigger_cooldown_seconds(&self) -> f64 {
        self.trigger_cooldown_seconds
    }

    pub fn vertical_axis(&self) -> VerticalAxis {
        self.vertical_axis
    }

    pub fn joint_depth_range(&self) -> DepthRange {
        self.joint_depth_range
    }

    pub fn cloud_depth_range(&self) -> DepthRange {
        self.cloud_depth_range
    }

    pub fn sample_seed(&self) -> u64 {
        self.sample_seed
    }

    pub fn max_frame_rate_hz(&self) -> f64 {
        self.max_frame_rate_hz
    }

    /// Minimum spacing between admitted frames (seconds).
    pub fn frame_interval(&self) -> f64 {
        1.0 / self.max_frame_rate_hz
    }

    // ── Derived component configs ─────────────────────────

    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            max_points: self.max_sample_points,
            ..SamplerConfig::default()
        }
    }

    /// Apply the tap-related options onto an existing tap config.
    pub fn apply_to_tap(&self, tap: &mut TapConfig) {
        tap.pinch_threshold = self.pinch_threshold;
        tap.tap_window_s = self.tap_window_seconds;
        tap.cooldown_s = self.trigger_cooldown_seconds;
    }

    /// S-expression summary for status reporting.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:smoothing-base {:.2} :hand-fade-seconds {:.2} :min-joint-confidence {:.2} :mist-global-alpha {:.2} :sample-radius {:.4} :jitter {:.2} :joint-bias {:.2} :max-sample-points {} :pinch-threshold {:.3} :tap-window-seconds {:.2} :trigger-cooldown-seconds {:.2} :vertical-axis :{})",
            self.smoothing_base,
            self.hand_fade_seconds,
            self.min_joint_confidence,
            self.mist_global_alpha,
            self.sample_radius,
            self.jitter,
            self.joint_bias,
            self.max_sample_points,
            self.pinch_threshold,
            self.tap_window_seconds,
            self.trigger_cooldown_seconds,
            self.vertical_axis.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_in_range() {
        let c = TrackerConfig::default();
        let clamped = c.clone().clamped();
        assert_eq!(c.smoothing_base(), clamped.smoothing_base());
        assert_eq!(c.hand_fade_seconds(), clamped.hand_fade_seconds());
        assert_eq!(c.max_sample_points(), clamped.max_sample_points());
        assert_eq!(c.joint_depth_range(), DepthRange::JOINTS);
        assert_eq!(c.cloud_depth_range(), DepthRange::CLOUD);
    }

    #[test]
    fn test_setters_clamp() {
        let mut c = TrackerConfig::default();
        c.set_smoothing_base(1.5);
        assert_eq!(c.smoothing_base(), 0.95);
        c.set_hand_fade_seconds(0.0);
        assert_eq!(c.hand_fade_seconds(), 0.05);
        c.set_min_joint_confidence(0.99);
        assert_eq!(c.min_joint_confidence(), 0.75);
        c.set_mist_global_alpha(-1.0);
        assert_eq!(c.mist_global_alpha(), 0.05);
        c.set_sample_radius(1.0);
        assert_eq!(c.sample_radius(), 0.0060);
        c.set_jitter(f32::NAN);
        assert_eq!(c.jitter(), 0.0);
        c.set_joint_bias(2.0);
        assert_eq!(c.joint_bias(), 1.0);
        c.set_tap_window_seconds(100.0);
        assert_eq!(c.tap_window_seconds(), 3.0);
    }

    #[test]
    fn test_from_toml_partial_and_clamped() {
        let c = TrackerConfig::from_toml_str(
            r#"
smoothing_base = 0.99
jitter = 0.1
max_sample_points = 100000
vertical_axis = "down"

[cloud_depth_range]
near_m = 0.2
far_m = 1.5
"#,
        )
        .unwrap();
        assert_eq!(c.smoothing_base(), 0.95);
        assert!((c.jitter() - 0.1).abs() < 1e-6);
        assert_eq!(c.max_sample_points(), MAX_SAMPLE_POINTS_LIMIT);
        assert_eq!(c.vertical_axis(), VerticalAxis::Down);
        assert_eq!(c.cloud_depth_range(), DepthRange::new(0.2, 1.5));
        assert_eq!(c.joint_depth_range(), DepthRange::JOINTS);
        assert_eq!(c.hand_fade_seconds(), 0.35);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(TrackerConfig::from_toml_str("smoothing_base = \"lots\"").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.toml");
        std::fs::write(&path, "hand_fade_seconds = 0.5\n").unwrap();
        let c = TrackerConfig::load(&path).unwrap();
        assert_eq!(c.hand_fade_seconds(), 0.5);
        assert!(TrackerConfig::load(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_apply_to_tap() {
        let mut c = TrackerConfig::default();
        c.set_pinch_threshold(0.08);
        c.set_trigger_cooldown_seconds(1.0);
        let mut tap = TapConfig::default();
        c.apply_to_tap(&mut tap);
        assert_eq!(tap.pinch_threshold, 0.08);
        assert_eq!(tap.cooldown_s, 1.0);
        assert_eq!(tap.tap_window_s, 1.0);
    }

    #[test]
    fn test_config_sexp() {
        let sexp = TrackerConfig::default().config_sexp();
        assert!(sexp.contains(":smoothing-base 0.55"));
        assert!(sexp.contains(":max-sample-points 600"));
        assert!(sexp.contains(":vertical-axis :up"));
    }
}
