//! Per-frame 2D landmark snapshots and the detector capability.
//!
//! Landmarks are in detector convention: normalized `[0,1]` coordinates
//! with the origin at the bottom-left and y pointing up.

use super::joints::{JointId, ALL_JOINTS, JOINT_COUNT};

/// A single detected landmark.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    /// Normalized x in `[0,1]`.
    pub x: f32,
    /// Normalized y in `[0,1]`, origin bottom-left.
    pub y: f32,
    /// Detector confidence in `[0,1]`.
    pub confidence: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// Euclidean distance to another landmark in normalized space.
    pub fn distance(&self, other: &Landmark) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Immutable snapshot of one frame's landmarks, indexed by joint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSet {
    landmarks: [Option<Landmark>; JOINT_COUNT],
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.  Non-finite positions are dropped.
    pub fn with(mut self, joint: JointId, landmark: Landmark) -> Self {
        self.insert(joint, landmark);
        self
    }

    pub fn insert(&mut self, joint: JointId, landmark: Landmark) {
        if landmark.x.is_finite() && landmark.y.is_finite() {
            self.landmarks[joint.index()] = Some(landmark);
        }
    }

    pub fn get(&self, joint: JointId) -> Option<&Landmark> {
        self.landmarks[joint.index()].as_ref()
    }

    /// Landmark for `joint` only if its confidence reaches `min_confidence`.
    pub fn confident(&self, joint: JointId, min_confidence: f32) -> Option<&Landmark> {
        self.get(joint).filter(|l| l.confidence >= min_confidence)
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointId, &Landmark)> + '_ {
        ALL_JOINTS
            .iter()
            .filter_map(move |j| self.get(*j).map(|l| (*j, l)))
    }

    /// All landmarks at or above `min_confidence`, in joint order.
    pub fn iter_confident(
        &self,
        min_confidence: f32,
    ) -> impl Iterator<Item = (JointId, &Landmark)> + '_ {
        self.iter().filter(move |(_, l)| l.confidence >= min_confidence)
    }

    pub fn len(&self) -> usize {
        self.landmarks.iter().filter(|l| l.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.iter().all(|l| l.is_none())
    }
}

/// Opaque 2D hand landmark detector.
///
/// `Ok(None)` means no hand in the image, which is routine.  An `Err`
/// is swallowed at the frame boundary and treated as a detection miss.
pub trait LandmarkDetector {
    type Image: ?Sized;

    fn detect(&mut self, image: &Self::Image) -> anyhow::Result<Option<LandmarkSet>>;
}
