//! Back-projection of normalized landmarks into camera space.
//!
//! `(u, v)` arrive in detector convention (origin bottom-left, y up).
//! They are flipped to top-left image pixels, looked up in the depth
//! buffer by nearest neighbor, and lifted through the pinhole model.

use serde::Deserialize;
use tracing::trace;

use super::camera::{scale_to_buffer, CameraIntrinsics, DepthView};

// ── Depth ranges ───────────────────────────────────────────

/// Accepted depth interval in meters, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DepthRange {
    pub near_m: f32,
    pub far_m: f32,
}

impl DepthRange {
    /// Range used when lifting skeleton joints.
    pub const JOINTS: DepthRange = DepthRange { near_m: 0.08, far_m: 2.5 };
    /// Range used when sampling the point cloud.
    pub const CLOUD: DepthRange = DepthRange { near_m: 0.10, far_m: 2.5 };

    pub fn new(near_m: f32, far_m: f32) -> Self {
        let near_m = near_m.max(0.0);
        Self {
            near_m,
            far_m: far_m.max(near_m),
        }
    }

    pub fn contains(&self, depth_m: f32) -> bool {
        depth_m.is_finite() && depth_m >= self.near_m && depth_m <= self.far_m
    }

    pub fn span(&self) -> f32 {
        self.far_m - self.near_m
    }
}

/// Sign convention of the camera-space y axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAxis {
    /// `y = -(py - cy) / fy * z`; y grows upward, matching right-handed renderers.
    #[default]
    Up,
    /// `y = (py - cy) / fy * z`; y grows downward like image rows.
    Down,
}

impl VerticalAxis {
    fn sign(&self) -> f32 {
        match self {
            Self::Up => -1.0,
            Self::Down => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

// ── Unprojector ────────────────────────────────────────────

/// Lifts normalized points using one frame's depth buffer and intrinsics.
#[derive(Debug, Clone, Copy)]
pub struct Unprojector<'a> {
    depth: DepthView<'a>,
    intrinsics: CameraIntrinsics,
    axis: VerticalAxis,
}

impl<'a> Unprojector<'a> {
    pub fn new(depth: DepthView<'a>, intrinsics: CameraIntrinsics, axis: VerticalAxis) -> Self {
        Self {
            depth,
            intrinsics,
            axis,
        }
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    /// Detector-space `(u, v)` to top-left image pixel coordinates.
    pub fn pixel(&self, u: f32, v: f32) -> (f32, f32) {
        (
            u * self.intrinsics.width as f32,
            (1.0 - v) * self.intrinsics.height as f32,
        )
    }

    /// Raw depth at the buffer cell nearest to `(u, v)`, bounds-checked.
    pub fn depth_at(&self, u: f32, v: f32) -> Option<f32> {
        let (px, py) = self.pixel(u, v);
        let dx = scale_to_buffer(px, self.intrinsics.width, self.depth.width())?;
        let dy = scale_to_buffer(py, self.intrinsics.height, self.depth.height())?;
        if dx < 0 || dy < 0 {
            return None;
        }
        self.depth.get(dx as usize, dy as usize)
    }

    /// Camera-space point for `(u, v)`, or `None` when the pixel falls
    /// outside the buffer or its depth is outside `range`.
    pub fn unproject(&self, u: f32, v: f32, range: DepthRange) -> Option<[f32; 3]> {
        if !self.intrinsics.is_usable() {
            return None;
        }
        let z = self.depth_at(u, v)?;
        if !range.contains(z) {
            trace!("depth {:.3} outside [{:.2}, {:.2}] at ({:.3}, {:.3})", z, range.near_m, range.far_m, u, v);
            return None;
        }
        let (px, py) = self.pixel(u, v);
        Some(back_project(px, py, z, &self.intrinsics, self.axis))
    }
}

/// Pinhole back-projection of an image pixel at depth `z`.
pub fn back_project(
    px: f32,
    py: f32,
    z: f32,
    intrinsics: &CameraIntrinsics,
    axis: VerticalAxis,
) -> [f32; 3] {
    let x = (px - intrinsics.cx) / intrinsics.fx * z;
    let y = axis.sign() * (py - intrinsics.cy) / intrinsics.fy * z;
    [x, y, z]
}

/// Project a camera-space point back to top-left image pixels.
pub fn project(
    point: [f32; 3],
    intrinsics: &CameraIntrinsics,
    axis: VerticalAxis,
) -> Option<(f32, f32)> {
    let z = point[2];
    if !z.is_finite() || z.abs() <= f32::EPSILON {
        return None;
    }
    let px = point[0] / z * intrinsics.fx + intrinsics.cx;
    let py = axis.sign() * point[1] / z * intrinsics.fy + intrinsics.cy;
    Some((px, py))
}

#[cfg(test)]
fn test_intrinsics() -> CameraIntrinsics {
    CameraIntrinsics {
        fx: 1450.0,
        fy: 1450.0,
        cx: 960.0,
        cy: 720.0,
        width: 1920,
        height: 1440,
    }
}
