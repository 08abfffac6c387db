//! Camera intrinsics and per-frame depth/confidence buffers.
//!
//! Buffers are owned by the frame source.  The core only reads them
//! through borrowed views that live for one frame's processing, with
//! every access bounds-checked.

/// Pinhole intrinsics in color-image pixel units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    /// Color image width in pixels.
    pub width: u32,
    /// Color image height in pixels.
    pub height: u32,
}

impl CameraIntrinsics {
    /// Whether these intrinsics can be used for back-projection.
    pub fn is_usable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.fx.is_finite()
            && self.fy.is_finite()
            && self.fx.abs() > f32::EPSILON
            && self.fy.abs() > f32::EPSILON
            && self.cx.is_finite()
            && self.cy.is_finite()
    }
}

/// Dense depth buffer in meters, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl DepthFrame {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Buffer with every sample set to `depth_m`.
    pub fn filled(width: usize, height: usize, depth_m: f32) -> Self {
        Self::new(width, height, vec![depth_m; width * height])
    }

    pub fn view(&self) -> DepthView<'_> {
        DepthView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Per-sample confidence tiers (0 = low, 1 = medium, 2 = high), row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceFrame {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl ConfidenceFrame {
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn filled(width: usize, height: usize, tier: u8) -> Self {
        Self::new(width, height, vec![tier; width * height])
    }

    pub fn view(&self) -> ConfidenceView<'_> {
        ConfidenceView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

/// Read-only view of a depth buffer for the duration of one frame.
#[derive(Debug, Clone, Copy)]
pub struct DepthView<'a> {
    width: usize,
    height: usize,
    data: &'a [f32],
}

impl<'a> DepthView<'a> {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sample at buffer coordinates, `None` if out of bounds.
    pub fn get(&self, x: usize, y: usize) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }
}

/// Read-only view of a confidence buffer for the duration of one frame.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceView<'a> {
    width: usize,
    height: usize,
    data: &'a [u8],
}

impl<'a> ConfidenceView<'a> {
    /// Tier at the buffer cell nearest to an image pixel.
    ///
    /// Indices are clamped into the buffer, so any finite pixel maps to
    /// a cell.  `None` only for empty or short buffers.
    pub fn tier_at_pixel(&self, px: f32, py: f32, image_w: u32, image_h: u32) -> Option<u8> {
        if self.width == 0 || self.height == 0 || image_w == 0 || image_h == 0 {
            return None;
        }
        let x = scale_to_buffer(px, image_w, self.width)?.clamp(0, self.width as i64 - 1);
        let y = scale_to_buffer(py, image_h, self.height)?.clamp(0, self.height as i64 - 1);
        self.data.get(y as usize * self.width + x as usize).copied()
    }
}

/// Nearest-neighbor mapping of an image-pixel coordinate into a buffer
/// axis of possibly different resolution.  Unclamped; callers bounds-check.
pub fn scale_to_buffer(pixel: f32, image_dim: u32, buffer_dim: usize) -> Option<i64> {
    if image_dim == 0 || !pixel.is_finite() {
        return None;
    }
    let scaled = (pixel * buffer_dim as f32 / image_dim as f32).round();
    if !scaled.is_finite() {
        return None;
    }
    Some(scaled as i64)
}
