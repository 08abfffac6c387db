//! Hand tracking from 2D landmarks and depth.
//!
//! Reconstructs a stabilized 3D skeleton, samples a point cloud around
//! the hand, and recognizes menu swipes and capture taps.

pub mod hand;
pub mod replay;

pub use hand::{
    CameraIntrinsics, DepthFrame, FrameInput, FrameOutput, GestureEvent, HandTracker, JointId,
    LandmarkSet, TrackerConfig, TrackingSession, UiState,
};
