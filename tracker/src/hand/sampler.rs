//! Confidence-aware 3D point sampling around the visible hand.
//!
//! Samples are drawn inside the padded bounding box of the confident
//! landmarks: a share biased toward the landmarks themselves, the rest
//! from a jittered grid.  Each candidate is lifted through the depth
//! buffer and gated by the sensor confidence map.  Rejected candidates
//! are skipped silently; nothing here can fail a frame.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use super::camera::ConfidenceView;
use super::landmarks::LandmarkSet;
use super::unproject::{DepthRange, Unprojector};

// ── Config ─────────────────────────────────────────────────

/// Fixed sampler geometry, chosen at construction.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Hard cap on emitted points.
    pub max_points: usize,
    pub grid_cols: usize,
    pub grid_rows: usize,
    /// Padding added to each side of the landmark bounding box (normalized).
    pub roi_padding: f32,
    /// Share of `max_points` available to landmark-biased samples.
    pub bias_fraction: f32,
    /// Inner radius of the annulus around a landmark (normalized).
    pub bias_inner_radius: f32,
    /// Outer radius of the annulus around a landmark (normalized).
    pub bias_outer_radius: f32,
    /// Minimum sensor confidence tier when a confidence map is present.
    pub min_confidence_tier: u8,
    /// Number of depth color buckets across the accepted range.
    pub depth_buckets: u8,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_points: 600,
            grid_cols: 40,
            grid_rows: 30,
            roi_padding: 0.12,
            bias_fraction: 0.35,
            bias_inner_radius: 0.018,
            bias_outer_radius: 0.038,
            min_confidence_tier: 1,
            depth_buckets: 4,
        }
    }
}

/// Per-frame tunables passed to [`RoiSampler::sample`].
#[derive(Debug, Clone, Copy)]
pub struct SampleParams {
    pub min_joint_confidence: f32,
    /// Grid jitter weight in `[0,1]`.
    pub jitter: f32,
    /// Landmark bias weight in `[0,1]`.
    pub joint_bias: f32,
    pub global_alpha: f32,
    pub presence_alpha: f32,
    pub depth_range: DepthRange,
}

// ── Output ─────────────────────────────────────────────────

/// One accepted sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledPoint {
    /// Camera-space position in meters.
    pub position: [f32; 3],
    /// Normalized detector-space location the sample was drawn at.
    pub uv: [f32; 2],
    /// Sensor confidence tier, if a confidence map was supplied.
    pub confidence_tier: Option<u8>,
    /// Depth bucket, 0 = nearest (lightest).
    pub color_tier: u8,
    /// Combined tier, global and presence alpha.
    pub alpha: f32,
}

/// Alpha multiplier for a sensor confidence tier.
pub fn tier_alpha(tier: Option<u8>) -> f32 {
    match tier {
        Some(2) => 1.0,
        Some(1) => 0.70,
        _ => 0.40,
    }
}

/// Linear depth bucket across `range`, nearer depths in lower buckets.
pub fn depth_bucket(z: f32, range: DepthRange, buckets: u8) -> u8 {
    if buckets <= 1 || range.span() <= f32::EPSILON {
        return 0;
    }
    let t = ((z - range.near_m) / range.span()).clamp(0.0, 1.0);
    ((t * buckets as f32) as u8).min(buckets - 1)
}

// ── Region of interest ─────────────────────────────────────

/// Axis-aligned box in normalized detector space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Roi {
    pub min: [f32; 2],
    pub max: [f32; 2],
}

impl Roi {
    /// Padded bounding box of the landmarks at or above `min_confidence`,
    /// clamped to the unit square.  `None` when there are none.
    pub fn from_landmarks(landmarks: &LandmarkSet, min_confidence: f32, padding: f32) -> Option<Self> {
        let mut min = [f32::INFINITY; 2];
        let mut max = [f32::NEG_INFINITY; 2];
        let mut any = false;
        for (_, l) in landmarks.iter_confident(min_confidence) {
            any = true;
            min[0] = min[0].min(l.x);
            min[1] = min[1].min(l.y);
            max[0] = max[0].max(l.x);
            max[1] = max[1].max(l.y);
        }
        if !any {
            return None;
        }
        Some(Self {
            min: [(min[0] - padding).clamp(0.0, 1.0), (min[1] - padding).clamp(0.0, 1.0)],
            max: [(max[0] + padding).clamp(0.0, 1.0), (max[1] + padding).clamp(0.0, 1.0)],
        })
    }

    pub fn width(&self) -> f32 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f32 {
        self.max[1] - self.min[1]
    }

    pub fn contains(&self, uv: [f32; 2]) -> bool {
        uv[0] >= self.min[0] && uv[0] <= self.max[0] && uv[1] >= self.min[1] && uv[1] <= self.max[1]
    }

    pub fn clamp(&self, uv: [f32; 2]) -> [f32; 2] {
        [
            uv[0].clamp(self.min[0], self.max[0]),
            uv[1].clamp(self.min[1], self.max[1]),
        ]
    }
}

// ── Sampler ────────────────────────────────────────────────

/// Draws the per-frame point sample.  Holds only its RNG across frames.
#[derive(Debug, Clone)]
pub struct RoiSampler {
    config: SamplerConfig,
    rng: StdRng,
}

impl RoiSampler {
    pub fn new(config: SamplerConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn max_points(&self) -> usize {
        self.config.max_points
    }

    /// Number of landmark-biased candidates for a given bias weight.
    pub fn bias_budget(&self, joint_bias: f32) -> usize {
        let budget = (self.config.max_points as f32 * self.config.bias_fraction * joint_bias).round();
        (budget.max(0.0) as usize).min(self.config.max_points)
    }

    /// Sample points for one frame.  Never returns more than `max_points`.
    pub fn sample(
        &mut self,
        landmarks: &LandmarkSet,
        unprojector: &Unprojector<'_>,
        confidence: Option<ConfidenceView<'_>>,
        params: &SampleParams,
    ) -> Vec<SampledPoint> {
        let max = self.config.max_points;
        let mut out = Vec::with_capacity(max);
        if max == 0 {
            return out;
        }
        let roi = match Roi::from_landmarks(landmarks, params.min_joint_confidence, self.config.roi_padding) {
            Some(roi) => roi,
            None => return out,
        };

        let anchors: Vec<[f32; 2]> = landmarks
            .iter_confident(params.min_joint_confidence)
            .map(|(_, l)| l.position())
            .collect();

        // Landmark-biased candidates, round-robin over anchors
        let inner = self.config.bias_inner_radius.min(self.config.bias_outer_radius);
        let outer = self.config.bias_outer_radius.max(inner);
        for i in 0..self.bias_budget(params.joint_bias) {
            if out.len() >= max {
                break;
            }
            let anchor = anchors[i % anchors.len()];
            let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
            let radius = self.rng.gen_range(inner..=outer);
            let uv = [anchor[0] + radius * angle.cos(), anchor[1] + radius * angle.sin()];
            if !roi.contains(uv) {
                trace!("biased sample at ({:.3}, {:.3}) outside roi", uv[0], uv[1]);
                continue;
            }
            if let Some(p) = self.accept(uv, unprojector, confidence, params) {
                out.push(p);
            }
        }

        // Jittered grid fills whatever budget is left.  The first pass
        // spans the whole box; later offsets only top up rejected slots.
        let cols = self.config.grid_cols.max(1);
        let rows = self.config.grid_rows.max(1);
        let cells = cols * rows;
        let remaining = max - out.len();
        if remaining > 0 {
            let stride = cells.div_ceil(remaining).max(1);
            let cw = roi.width() / cols as f32;
            let ch = roi.height() / rows as f32;
            let jitter = params.jitter.clamp(0.0, 1.0);
            'fill: for offset in 0..stride {
                for idx in (offset..cells).step_by(stride) {
                    if out.len() >= max {
                        break 'fill;
                    }
                    let gx = (idx % cols) as f32;
                    let gy = (idx / cols) as f32;
                    let jx: f32 = self.rng.gen_range(-0.5..0.5);
                    let jy: f32 = self.rng.gen_range(-0.5..0.5);
                    let uv = roi.clamp([
                        roi.min[0] + (gx + 0.5) * cw + jx * cw * jitter,
                        roi.min[1] + (gy + 0.5) * ch + jy * ch * jitter,
                    ]);
                    if let Some(p) = self.accept(uv, unprojector, confidence, params) {
                        out.push(p);
                    }
                }
            }
        }

        debug!("sampled {} / {} points", out.len(), max);
        out
    }

    fn accept(
        &self,
        uv: [f32; 2],
        unprojector: &Unprojector<'_>,
        confidence: Option<ConfidenceView<'_>>,
        params: &SampleParams,
    ) -> Option<SampledPoint> {
        let position = unprojector.unproject(uv[0], uv[1], params.depth_range)?;
        let tier = match confidence {
            Some(view) => {
                let (px, py) = unprojector.pixel(uv[0], uv[1]);
                let intr = unprojector.intrinsics();
                let tier = view.tier_at_pixel(px, py, intr.width, intr.height)?;
                if tier < self.config.min_confidence_tier {
                    trace!("sample at ({:.3}, {:.3}) below confidence tier", uv[0], uv[1]);
                    return None;
                }
                Some(tier)
            }
            None => None,
        };
        Some(SampledPoint {
            position,
            uv,
            confidence_tier: tier,
            color_tier: depth_bucket(position[2], params.depth_range, self.config.depth_buckets),
            alpha: tier_alpha(tier) * params.global_alpha * params.presence_alpha,
        })
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
fn test_params() -> SampleParams {
    SampleParams {
        min_joint_confidence: 0.35,
        jitter: 0.5,
        joint_bias: 0.5,
        global_alpha: 0.8,
        presence_alpha: 1.0,
        depth_range: DepthRange::CLOUD,
    }
}

#[cfg(test)]
fn box_landmarks() -> LandmarkSet {
    use super::joints::JointId;
    use super::landmarks::Landmark;

    LandmarkSet::new()
        .with(JointId::Wrist, Landmark::new(0.5, 0.4, 0.9))
        .with(JointId::ThumbTip, Landmark::new(0.4, 0.5, 0.9))
        .with(JointId::IndexTip, Landmark::new(0.45, 0.6, 0.9))
        .with(JointId::LittleTip, Landmark::new(0.6, 0.55, 0.9))
        // Ignored: below confidence, would widen the box
        .with(JointId::RingTip, Landmark::new(0.95, 0.95, 0.1))
}
