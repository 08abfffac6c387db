//! Deterministic replay of recorded frame logs.
//!
//! A frame log is JSON lines, one object per camera frame:
//!
//! ```text
//! {"t": 0.066, "landmarks": [{"joint": "wrist", "x": 0.5, "y": 0.3, "confidence": 0.9}, ...],
//!  "depth": {"width": 160, "height": 120, "fill": 0.45},
//!  "intrinsics": {"fx": 500, "fy": 500, "cx": 320, "cy": 240, "width": 640, "height": 480}}
//! ```
//!
//! `landmarks` absent or null means the detector found no hand.  `depth`
//! and `confidence` take either a full row-major `data` array or a
//! uniform `fill`.  `intrinsics` carries forward from the previous frame
//! when omitted.  `detector_error` replays a detector failure.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::mpsc::Receiver;

use anyhow::{bail, Context};
use serde::Deserialize;
use tracing::{debug, info};

use crate::hand::{
    CameraIntrinsics, ConfidenceFrame, DepthFrame, GestureEvent, HandTracker, JointId, Landmark,
    LandmarkDetector, LandmarkSet, SensorFrame, TrackerConfig, TrackingSession, UiState,
};

// ── Records ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LandmarkRecord {
    pub joint: JointId,
    pub x: f32,
    pub y: f32,
    #[serde(default = "full_confidence")]
    pub confidence: f32,
}

fn full_confidence() -> f32 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct BufferRecord<T> {
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub data: Option<Vec<T>>,
    #[serde(default)]
    pub fill: Option<T>,
}

/// Largest buffer side accepted from a frame log.
pub const MAX_BUFFER_SIDE: usize = 8192;

impl<T: Copy> BufferRecord<T> {
    fn samples(&self) -> anyhow::Result<Vec<T>> {
        if self.width > MAX_BUFFER_SIDE || self.height > MAX_BUFFER_SIDE {
            bail!(
                "buffer is {}x{}, larger than {} on a side",
                self.width,
                self.height,
                MAX_BUFFER_SIDE
            );
        }
        let Some(len) = self.width.checked_mul(self.height) else {
            bail!("buffer is {}x{}, too many samples", self.width, self.height);
        };
        match (&self.data, self.fill) {
            (Some(data), _) => {
                if data.len() != len {
                    bail!(
                        "buffer is {}x{} but has {} samples",
                        self.width,
                        self.height,
                        data.len()
                    );
                }
                Ok(data.clone())
            }
            (None, Some(fill)) => Ok(vec![fill; len]),
            (None, None) => bail!("buffer needs either `data` or `fill`"),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IntrinsicsRecord {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
    pub width: u32,
    pub height: u32,
}

impl From<IntrinsicsRecord> for CameraIntrinsics {
    fn from(r: IntrinsicsRecord) -> Self {
        CameraIntrinsics {
            fx: r.fx,
            fy: r.fy,
            cx: r.cx,
            cy: r.cy,
            width: r.width,
            height: r.height,
        }
    }
}

/// One recorded camera frame.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRecord {
    pub t: f64,
    #[serde(default)]
    pub landmarks: Option<Vec<LandmarkRecord>>,
    #[serde(default)]
    pub depth: Option<BufferRecord<f32>>,
    #[serde(default)]
    pub confidence: Option<BufferRecord<u8>>,
    #[serde(default)]
    pub intrinsics: Option<IntrinsicsRecord>,
    #[serde(default)]
    pub freeze: bool,
    #[serde(default)]
    pub detector_error: Option<String>,
}

impl FrameRecord {
    pub fn landmark_set(&self) -> Option<LandmarkSet> {
        let records = self.landmarks.as_ref()?;
        let mut set = LandmarkSet::new();
        for r in records {
            set.insert(r.joint, Landmark::new(r.x, r.y, r.confidence));
        }
        Some(set)
    }
}

/// Read a JSON-lines frame log.  Blank lines and `#` comments are skipped.
pub fn read_frame_log(path: &Path) -> anyhow::Result<Vec<FrameRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("opening frame log {}", path.display()))?;
    parse_frame_log(BufReader::new(file)).with_context(|| format!("reading frame log {}", path.display()))
}

pub fn parse_frame_log(reader: impl BufRead) -> anyhow::Result<Vec<FrameRecord>> {
    let mut frames = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: FrameRecord =
            serde_json::from_str(trimmed).with_context(|| format!("line {}", i + 1))?;
        frames.push(record);
    }
    Ok(frames)
}

// ── Detector ───────────────────────────────────────────────

/// Detector that returns the landmarks stored in each record.
#[derive(Debug, Default)]
pub struct LoggedDetector;

impl LandmarkDetector for LoggedDetector {
    type Image = FrameRecord;

    fn detect(&mut self, record: &FrameRecord) -> anyhow::Result<Option<LandmarkSet>> {
        if let Some(message) = &record.detector_error {
            bail!("recorded detector failure: {}", message);
        }
        Ok(record.landmark_set())
    }
}

// ── Replay ─────────────────────────────────────────────────

/// Outcome of replaying a log.
#[derive(Debug, Clone)]
pub struct ReplaySummary {
    pub frames_read: usize,
    pub frames_processed: usize,
    pub detected_frames: usize,
    pub events: Vec<(f64, GestureEvent)>,
    /// Point count of the last processed frame.
    pub last_point_count: usize,
    pub max_point_count: usize,
    pub ui: UiState,
    pub status: String,
    pub timing: String,
}

/// Run every record through a fresh tracking session.
pub fn run_replay(records: &[FrameRecord], config: TrackerConfig) -> anyhow::Result<ReplaySummary> {
    let mut tracker = HandTracker::new(config);
    let rx: Receiver<GestureEvent> = tracker.subscribe();
    let mut session = TrackingSession::new(LoggedDetector, tracker);
    let mut ui = UiState::default();

    let mut intrinsics: Option<CameraIntrinsics> = None;
    let mut summary = ReplaySummary {
        frames_read: records.len(),
        frames_processed: 0,
        detected_frames: 0,
        events: Vec::new(),
        last_point_count: 0,
        max_point_count: 0,
        ui: UiState::default(),
        status: String::new(),
        timing: String::new(),
    };

    for record in records {
        if let Some(r) = record.intrinsics {
            intrinsics = Some(r.into());
        }
        let Some(current) = intrinsics else {
            bail!("frame at {:.3}s has no intrinsics and none came before", record.t);
        };
        let depth = record
            .depth
            .as_ref()
            .map(|d| d.samples().map(|data| DepthFrame::new(d.width, d.height, data)))
            .transpose()
            .with_context(|| format!("depth of frame at {:.3}s", record.t))?;
        let confidence = record
            .confidence
            .as_ref()
            .map(|c| c.samples().map(|data| ConfidenceFrame::new(c.width, c.height, data)))
            .transpose()
            .with_context(|| format!("confidence of frame at {:.3}s", record.t))?;

        let Some(output) = session.submit(SensorFrame {
            timestamp: record.t,
            image: record,
            depth: depth.as_ref(),
            confidence: confidence.as_ref(),
            intrinsics: current,
            freeze: record.freeze,
        }) else {
            continue;
        };

        summary.frames_processed += 1;
        if output.detected {
            summary.detected_frames += 1;
        }
        summary.last_point_count = output.sampled_points.len();
        summary.max_point_count = summary.max_point_count.max(output.sampled_points.len());
        for event in &output.events {
            info!("{} at {:.3}s", event.as_str(), output.timestamp);
            summary.events.push((output.timestamp, *event));
        }
        ui.drain(&rx);
    }

    debug!(
        "replayed {} of {} frames, {} detector failures",
        summary.frames_processed,
        summary.frames_read,
        session.detector_failures()
    );
    summary.ui = ui;
    summary.status = session.tracker().status_sexp();
    summary.timing = session.timing().stats_sexp();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const INTRINSICS: &str = r#""intrinsics": {"fx": 500, "fy": 500, "cx": 320, "cy": 240, "width": 640, "height": 480}"#;

    fn hand_json(cx: f32) -> String {
        let joints: Vec<String> = crate::hand::joints::ALL_JOINTS
            .iter()
            .enumerate()
            .map(|(i, j)| {
                let x = cx - 0.08 + (i % 5) as f32 * 0.04;
                let y = 0.42 + (i / 5) as f32 * 0.04;
                format!(r#"{{"joint": "{}", "x": {}, "y": {}, "confidence": 0.9}}"#, j.as_str(), x, y)
            })
            .collect();
        format!("[{}]", joints.join(", "))
    }

    #[test]
    fn test_parse_frame_log() {
        let log = format!(
            "# recorded\n{{\"t\": 0.0, \"landmarks\": {}, \"depth\": {{\"width\": 4, \"height\": 3, \"fill\": 0.5}}, {}}}\n\n{{\"t\": 0.1}}\n",
            hand_json(0.5),
            INTRINSICS
        );
        let frames = parse_frame_log(log.as_bytes()).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].landmark_set().unwrap().len(), 21);
        assert_eq!(frames[0].depth.as_ref().unwrap().samples().unwrap().len(), 12);
        assert!(frames[1].landmark_set().is_none());
        assert!(frames[1].intrinsics.is_none());
    }

    #[test]
    fn test_unknown_joint_rejected() {
        let log = r#"{"t": 0.0, "landmarks": [{"joint": "sixth-finger", "x": 0.1, "y": 0.1}]}"#;
        let err = parse_frame_log(log.as_bytes()).unwrap_err();
        assert!(format!("{:#}", err).contains("line 1"));
    }

    #[test]
    fn test_buffer_length_mismatch() {
        let record: BufferRecord<f32> =
            serde_json::from_str(r#"{"width": 2, "height": 2, "data": [0.5, 0.5, 0.5]}"#).unwrap();
        assert!(record.samples().is_err());
        let record: BufferRecord<u8> = serde_json::from_str(r#"{"width": 2, "height": 2}"#).unwrap();
        assert!(record.samples().is_err());
    }

    #[test]
    fn test_oversized_buffer_is_an_error() {
        let record: BufferRecord<f32> =
            serde_json::from_str(r#"{"width": 4294967296, "height": 4294967296, "fill": 0.5}"#).unwrap();
        assert!(record.samples().is_err());
        let record: BufferRecord<f32> =
            serde_json::from_str(r#"{"width": 100000, "height": 2, "fill": 0.5}"#).unwrap();
        assert!(record.samples().is_err());

        let line = format!(
            r#"{{"t": 0.0, "depth": {{"width": 4294967296, "height": 4294967296, "fill": 0.5}}, {}}}"#,
            INTRINSICS
        );
        let records = vec![serde_json::from_str::<FrameRecord>(&line).unwrap()];
        let err = run_replay(&records, TrackerConfig::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("depth of frame"));
    }

    #[test]
    fn test_logged_detector() {
        let mut det = LoggedDetector;
        let ok: FrameRecord = serde_json::from_str(r#"{"t": 0.0, "landmarks": []}"#).unwrap();
        assert_eq!(det.detect(&ok).unwrap(), Some(LandmarkSet::new()));
        let failed: FrameRecord =
            serde_json::from_str(r#"{"t": 0.0, "detector_error": "gpu lost"}"#).unwrap();
        assert!(det.detect(&failed).is_err());
    }

    #[test]
    fn test_replay_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();
        // 30 Hz input: half the frames are throttled at 15 Hz
        for i in 0..20 {
            let t = i as f64 / 30.0;
            if i < 10 {
                writeln!(
                    file,
                    r#"{{"t": {}, "landmarks": {}, "depth": {{"width": 160, "height": 120, "fill": 0.5}}, {}}}"#,
                    t,
                    hand_json(0.5),
                    INTRINSICS
                )
                .unwrap();
            } else if i == 10 {
                writeln!(file, r#"{{"t": {}, "detector_error": "timeout", {}}}"#, t, INTRINSICS).unwrap();
            } else {
                writeln!(file, r#"{{"t": {}}}"#, t).unwrap();
            }
        }
        drop(file);

        let records = read_frame_log(&path).unwrap();
        let summary = run_replay(&records, TrackerConfig::default().with_max_sample_points(180)).unwrap();
        assert_eq!(summary.frames_read, 20);
        assert_eq!(summary.frames_processed, 10);
        assert_eq!(summary.detected_frames, 5);
        assert!(summary.max_point_count > 0 && summary.max_point_count <= 180);
        assert_eq!(summary.last_point_count, 0);
        assert!(summary.status.contains(":tracked-joints 21"));
        assert!(summary.timing.contains(":total-frames 10"));
    }

    #[test]
    fn test_replay_swipe_reaches_ui() {
        let mut records = Vec::new();
        for i in 0..=6 {
            let t = i as f64 * 0.075;
            let cx = 0.75 - 0.45 * (i as f32 / 6.0);
            let line = format!(
                r#"{{"t": {}, "landmarks": [{{"joint": "index-tip", "x": {}, "y": 0.6, "confidence": 0.9}}, {{"joint": "middle-tip", "x": {}, "y": 0.62, "confidence": 0.9}}, {{"joint": "ring-tip", "x": {}, "y": 0.61, "confidence": 0.9}}, {{"joint": "little-tip", "x": {}, "y": 0.58, "confidence": 0.9}}], {}}}"#,
                t,
                cx - 0.045,
                cx - 0.015,
                cx + 0.015,
                cx + 0.045,
                INTRINSICS
            );
            records.push(serde_json::from_str::<FrameRecord>(&line).unwrap());
        }
        let summary = run_replay(&records, TrackerConfig::default()).unwrap();
        assert_eq!(summary.events.len(), 1);
        assert_eq!(summary.events[0].1, GestureEvent::MenuOpen);
        assert!(summary.ui.menu_open);
    }

    #[test]
    fn test_replay_without_intrinsics_fails() {
        let records = vec![serde_json::from_str::<FrameRecord>(r#"{"t": 0.0}"#).unwrap()];
        assert!(run_replay(&records, TrackerConfig::default()).is_err());
    }

    #[test]
    fn test_missing_log_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_frame_log(&dir.path().join("nope.jsonl")).is_err());
    }
}
