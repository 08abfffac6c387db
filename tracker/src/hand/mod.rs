//! Single-hand tracking core.
//!
//! Provides:
//! - `unproject`: normalized landmark + depth to camera-space points
//! - `stabilizer`: jump clamp, class-weighted smoothing, presence fade
//! - `sampler`: ROI point cloud sampling
//! - `swipe`, `tap`: gesture state machines
//! - `pipeline`: the per-frame controller and detector-driven session

pub mod camera;
pub mod config;
pub mod frame_timing;
pub mod gesture;
pub mod joints;
pub mod landmarks;
pub mod pipeline;
pub mod sampler;
pub mod stabilizer;
pub mod swipe;
pub mod tap;
pub mod throttle;
pub mod ui;
pub mod unproject;

pub use camera::{CameraIntrinsics, ConfidenceFrame, DepthFrame};
pub use config::TrackerConfig;
pub use gesture::{GestureEvent, MenuToggle};
pub use joints::{JointClass, JointId};
pub use landmarks::{Landmark, LandmarkDetector, LandmarkSet};
pub use pipeline::{FrameInput, FrameOutput, HandTracker, SensorFrame, TrackingSession};
pub use sampler::SampledPoint;
pub use ui::UiState;
pub use unproject::{DepthRange, VerticalAxis};
