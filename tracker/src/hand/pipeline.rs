//! Per-frame tracking controller.
//!
//! [`HandTracker`] owns every piece of mutable tracking state (joint
//! smoothing, presence, swipe window, tap counter) and advances it one
//! frame at a time.  [`TrackingSession`] sits in front of it, dropping
//! frames above the admission rate and running the injected landmark
//! detector.
//!
//! Nothing here returns an error.  Missing depth, detector misses and
//! detector failures all collapse into a presence decay step with a
//! well-formed, possibly empty, output.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Instant;

use tracing::{debug, trace, warn};

use super::camera::{CameraIntrinsics, ConfidenceFrame, DepthFrame};
use super::config::{TrackerConfig, MIN_DETECTED_JOINTS};
use super::frame_timing::FrameTiming;
use super::gesture::{GestureEvent, MenuFlag, MenuToggle};
use super::joints::JointId;
use super::landmarks::{LandmarkDetector, LandmarkSet};
use super::sampler::{RoiSampler, SampleParams, SampledPoint};
use super::stabilizer::JointStabilizer;
use super::swipe::{SwipeConfig, SwipeDetector};
use super::tap::{TapConfig, TapDetector};
use super::throttle::FrameThrottle;
use super::unproject::Unprojector;

// ── Frame contract ─────────────────────────────────────────

/// One frame's inputs.  Buffers are borrowed for the duration of `process`.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// Monotonic frame timestamp in seconds.
    pub timestamp: f64,
    /// `None` when the detector found no hand.
    pub landmarks: Option<&'a LandmarkSet>,
    pub depth: Option<&'a DepthFrame>,
    pub confidence: Option<&'a ConfidenceFrame>,
    pub intrinsics: CameraIntrinsics,
    /// Hold the reconstruction: no joint or cloud updates this frame.
    pub freeze: bool,
}

/// One frame's outputs.
#[derive(Debug, Clone, Default)]
pub struct FrameOutput {
    pub timestamp: f64,
    /// Every joint with smoothing history, including stale ones.
    /// Mask by `presence_alpha` before display.
    pub stabilized_joints: BTreeMap<JointId, [f32; 3]>,
    /// Joints in `stabilized_joints` not observed in this frame.
    pub stale_joints: BTreeSet<JointId>,
    pub presence_alpha: f32,
    pub sampled_points: Vec<SampledPoint>,
    /// Render radius for each sampled point (meters).
    pub point_radius: f32,
    pub events: Vec<GestureEvent>,
    /// Whether this frame counted as a hand detection.
    pub detected: bool,
}

impl FrameOutput {
    pub fn is_visible(&self) -> bool {
        self.presence_alpha > super::stabilizer::VISIBILITY_THRESHOLD
    }
}

// ── Tracker ────────────────────────────────────────────────

/// Single-hand tracking core.
#[derive(Debug)]
pub struct HandTracker {
    config: TrackerConfig,
    stabilizer: JointStabilizer,
    sampler: RoiSampler,
    swipe: SwipeDetector,
    tap: TapDetector,
    /// Menu state as last announced on the event channel.
    menu: MenuFlag,
    subscribers: Vec<Sender<GestureEvent>>,
    frames: u64,
}

impl Default for HandTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl HandTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let config = config.clamped();
        let mut tap_config = TapConfig::default();
        config.apply_to_tap(&mut tap_config);
        Self {
            stabilizer: JointStabilizer::new(config.smoothing_base(), config.hand_fade_seconds()),
            sampler: RoiSampler::new(config.sampler_config(), config.sample_seed()),
            swipe: SwipeDetector::new(SwipeConfig::default()),
            tap: TapDetector::new(tap_config),
            menu: MenuFlag::default(),
            subscribers: Vec::new(),
            frames: 0,
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Adjust tunables in place.  `max_sample_points` and `sample_seed`
    /// are fixed at construction and any change to them is ignored.
    pub fn update_config(&mut self, f: impl FnOnce(&mut TrackerConfig)) {
        let max_points = self.config.max_sample_points();
        let seed = self.config.sample_seed();
        f(&mut self.config);
        self.config = std::mem::take(&mut self.config)
            .with_max_sample_points(max_points)
            .with_sample_seed(seed)
            .clamped();
        self.stabilizer.set_smoothing_base(self.config.smoothing_base());
        self.stabilizer.set_fade_seconds(self.config.hand_fade_seconds());
        self.config.apply_to_tap(&mut self.tap.config);
        debug!("tracker config updated: {}", self.config.config_sexp());
    }

    /// New receiver for every gesture event emitted from now on.
    pub fn subscribe(&mut self) -> Receiver<GestureEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Re-synchronize the menu state from its owner.
    pub fn set_menu_open(&mut self, open: bool) {
        self.menu.set_menu_open(open);
    }

    pub fn is_menu_open(&self) -> bool {
        self.menu.is_menu_open()
    }

    pub fn stabilizer(&self) -> &JointStabilizer {
        &self.stabilizer
    }

    pub fn tap(&self) -> &TapDetector {
        &self.tap
    }

    pub fn swipe(&self) -> &SwipeDetector {
        &self.swipe
    }

    /// Advance all tracking state by one frame.
    pub fn process(&mut self, frame: &FrameInput<'_>) -> FrameOutput {
        let t = frame.timestamp;
        self.frames += 1;

        let empty = LandmarkSet::new();
        let landmarks = frame.landmarks.unwrap_or(&empty);

        let mut events = Vec::new();
        if let Some(event) = self.swipe.update(landmarks, t, &mut self.menu) {
            events.push(event);
        }
        if let Some(event) = self.tap.update(landmarks, t) {
            events.push(event);
        }

        let (detected, sampled_points) = match self.observe(frame, landmarks) {
            Some(points) => (true, points),
            None => {
                self.stabilizer.miss(t);
                (false, Vec::new())
            }
        };

        self.publish(&events);

        FrameOutput {
            timestamp: t,
            stabilized_joints: self
                .stabilizer
                .joints()
                .iter()
                .map(|(joint, track)| (joint, track.smoothed))
                .collect(),
            stale_joints: self.stabilizer.joints().stale_joints(t).collect(),
            presence_alpha: self.stabilizer.presence().alpha(),
            sampled_points,
            point_radius: self.config.sample_radius(),
            events,
            detected,
        }
    }

    /// Lift joints and sample the cloud.  `None` when the frame does not
    /// count as a detection; stabilization state is then untouched.
    fn observe(&mut self, frame: &FrameInput<'_>, landmarks: &LandmarkSet) -> Option<Vec<SampledPoint>> {
        let t = frame.timestamp;
        if frame.freeze {
            trace!("frame {:.3}s frozen", t);
            return None;
        }
        if landmarks.is_empty() {
            return None;
        }
        let Some(depth) = frame.depth else {
            trace!("frame {:.3}s has no depth", t);
            return None;
        };
        if !frame.intrinsics.is_usable() {
            trace!("frame {:.3}s has unusable intrinsics", t);
            return None;
        }

        let unprojector = Unprojector::new(depth.view(), frame.intrinsics, self.config.vertical_axis());
        let min_conf = self.config.min_joint_confidence();
        let joint_range = self.config.joint_depth_range();
        let raw: Vec<(JointId, [f32; 3])> = landmarks
            .iter_confident(min_conf)
            .filter_map(|(joint, l)| unprojector.unproject(l.x, l.y, joint_range).map(|p| (joint, p)))
            .collect();
        if raw.len() < MIN_DETECTED_JOINTS {
            trace!("frame {:.3}s lifted only {} joints", t, raw.len());
            return None;
        }

        self.stabilizer.update(t, &raw);

        let params = SampleParams {
            min_joint_confidence: min_conf,
            jitter: self.config.jitter(),
            joint_bias: self.config.joint_bias(),
            global_alpha: self.config.mist_global_alpha(),
            presence_alpha: self.stabilizer.presence().alpha(),
            depth_range: self.config.cloud_depth_range(),
        };
        let confidence = frame.confidence.map(|c| c.view());
        Some(self.sampler.sample(landmarks, &unprojector, confidence, &params))
    }

    /// Send events to every live subscriber, forgetting disconnected ones.
    fn publish(&mut self, events: &[GestureEvent]) {
        if events.is_empty() {
            return;
        }
        self.subscribers.retain(|tx| events.iter().all(|e| tx.send(*e).is_ok()));
    }

    /// Clear all tracking state.  Subscribers and menu state are kept.
    pub fn reset(&mut self) {
        self.stabilizer.reset();
        self.swipe.reset();
        self.tap.reset();
    }

    pub fn status_sexp(&self) -> String {
        let presence = self.stabilizer.presence();
        format!(
            "(:frames {} :presence {:.2} :visible {} :tracked-joints {} :menu-open {} :tap-count {} :subscribers {})",
            self.frames,
            presence.alpha(),
            if presence.is_visible() { "t" } else { "nil" },
            self.stabilizer.joints().tracked_count(),
            if self.menu.is_menu_open() { "t" } else { "nil" },
            self.tap.state().count,
            self.subscribers.len(),
        )
    }
}

// ── Session ────────────────────────────────────────────────

/// A raw sensor frame handed to a [`TrackingSession`].
#[derive(Debug)]
pub struct SensorFrame<'a, I: ?Sized> {
    pub timestamp: f64,
    pub image: &'a I,
    pub depth: Option<&'a DepthFrame>,
    pub confidence: Option<&'a ConfidenceFrame>,
    pub intrinsics: CameraIntrinsics,
    pub freeze: bool,
}

/// Throttle, detect, track.
pub struct TrackingSession<D: LandmarkDetector> {
    detector: D,
    tracker: HandTracker,
    throttle: FrameThrottle,
    timing: FrameTiming,
    detector_failures: u64,
}

impl<D: LandmarkDetector> TrackingSession<D> {
    pub fn new(detector: D, tracker: HandTracker) -> Self {
        let rate = tracker.config().max_frame_rate_hz();
        Self {
            detector,
            tracker,
            throttle: FrameThrottle::new(rate),
            timing: FrameTiming::for_rate(600, rate),
            detector_failures: 0,
        }
    }

    pub fn tracker(&self) -> &HandTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut HandTracker {
        &mut self.tracker
    }

    pub fn timing(&self) -> &FrameTiming {
        &self.timing
    }

    pub fn detector_failures(&self) -> u64 {
        self.detector_failures
    }

    /// Process one sensor frame.  `None` when the throttle drops it.
    pub fn submit(&mut self, frame: SensorFrame<'_, D::Image>) -> Option<FrameOutput> {
        if !self.throttle.accept(frame.timestamp) {
            self.timing.record_drop();
            return None;
        }

        let detect_start = Instant::now();
        let landmarks = match self.detector.detect(frame.image) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                self.detector_failures += 1;
                warn!("landmark detector failed at {:.3}s: {:#}", frame.timestamp, e);
                None
            }
        };
        let detect_ms = detect_start.elapsed().as_secs_f64() * 1000.0;

        let track_start = Instant::now();
        let output = self.tracker.process(&FrameInput {
            timestamp: frame.timestamp,
            landmarks: landmarks.as_ref(),
            depth: frame.depth,
            confidence: frame.confidence,
            intrinsics: frame.intrinsics,
            freeze: frame.freeze,
        });
        let track_ms = track_start.elapsed().as_secs_f64() * 1000.0;
        self.timing.record_frame(detect_ms, track_ms);

        Some(output)
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
pub(crate) fn full_hand(cx: f32) -> LandmarkSet {
    use super::joints::ALL_JOINTS;
    use super::landmarks::Landmark;

    let mut set = LandmarkSet::new();
    for (i, joint) in ALL_JOINTS.iter().enumerate() {
        let col = (i % 5) as f32;
        let row = (i / 5) as f32;
        set.insert(*joint, Landmark::new(cx - 0.08 + col * 0.04, 0.42 + row * 0.04, 0.9));
    }
    set
}

#[cfg(test)]
pub(crate) fn test_intrinsics() -> CameraIntrinsics {
    CameraIntrinsics { fx: 500.0, fy: 500.0, cx: 320.0, cy: 240.0, width: 640, height: 480 }
}
