//! Per-frame processing time instrumentation.
//!
//! Keeps a rolling window of detector and tracker durations and reports
//! percentiles against the frame budget implied by the admission rate.

use std::collections::VecDeque;

/// Rolling processing-time statistics.
#[derive(Debug)]
pub struct FrameTiming {
    /// Landmark detection time per admitted frame (ms).
    pub detect_times: VecDeque<f64>,
    /// Tracker `process` time per admitted frame (ms).
    pub track_times: VecDeque<f64>,
    /// Detect + track per admitted frame (ms).
    pub total_times: VecDeque<f64>,
    pub window_size: usize,
    pub total_frames: u64,
    /// Frames whose total exceeded `budget_ms`.
    pub missed_frames: u64,
    /// Frames turned away by the throttle.
    pub dropped_frames: u64,
    /// Frame budget in milliseconds (66.7 at 15 Hz).
    pub budget_ms: f64,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(600, 1000.0 / 15.0)
    }
}

impl FrameTiming {
    pub fn new(window_size: usize, budget_ms: f64) -> Self {
        let window_size = window_size.max(1);
        Self {
            detect_times: VecDeque::with_capacity(window_size),
            track_times: VecDeque::with_capacity(window_size),
            total_times: VecDeque::with_capacity(window_size),
            window_size,
            total_frames: 0,
            missed_frames: 0,
            dropped_frames: 0,
            budget_ms,
        }
    }

    /// Budget for a given admission rate.
    pub fn for_rate(window_size: usize, rate_hz: f64) -> Self {
        Self::new(window_size, 1000.0 / rate_hz.max(f64::EPSILON))
    }

    pub fn record_frame(&mut self, detect_ms: f64, track_ms: f64) {
        let total = detect_ms + track_ms;
        Self::push_sample(&mut self.detect_times, detect_ms, self.window_size);
        Self::push_sample(&mut self.track_times, track_ms, self.window_size);
        Self::push_sample(&mut self.total_times, total, self.window_size);

        self.total_frames += 1;
        if total > self.budget_ms {
            self.missed_frames += 1;
        }
    }

    pub fn record_drop(&mut self) {
        self.dropped_frames += 1;
    }

    fn push_sample(samples: &mut VecDeque<f64>, value: f64, window_size: usize) {
        samples.push_back(value);
        while samples.len() > window_size {
            samples.pop_front();
        }
    }

    fn sorted(samples: &VecDeque<f64>) -> Vec<f64> {
        let mut v: Vec<f64> = samples.iter().copied().collect();
        v.sort_by(|a, b| a.total_cmp(b));
        v
    }

    /// Nearest-rank percentile of a sorted slice.
    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let idx = ((sorted.len() as f64 - 1.0) * p / 100.0).round() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    pub fn stats(&self) -> FrameTimingStats {
        let detect = Self::sorted(&self.detect_times);
        let track = Self::sorted(&self.track_times);
        let total = Self::sorted(&self.total_times);

        FrameTimingStats {
            detect_p50: Self::percentile(&detect, 50.0),
            detect_p99: Self::percentile(&detect, 99.0),
            track_p50: Self::percentile(&track, 50.0),
            track_p99: Self::percentile(&track, 99.0),
            total_p50: Self::percentile(&total, 50.0),
            total_p95: Self::percentile(&total, 95.0),
            total_p99: Self::percentile(&total, 99.0),
            missed_pct: if self.total_frames > 0 {
                (self.missed_frames as f64 / self.total_frames as f64) * 100.0
            } else {
                0.0
            },
            total_frames: self.total_frames,
            missed_frames: self.missed_frames,
            dropped_frames: self.dropped_frames,
        }
    }

    /// Stats as an s-expression status line.
    pub fn stats_sexp(&self) -> String {
        let s = self.stats();
        format!(
            "(:detect-p50 {:.2} :track-p50 {:.2} :total-p50 {:.2} :total-p95 {:.2} :total-p99 {:.2} :missed-pct {:.1} :total-frames {} :missed-frames {} :dropped-frames {})",
            s.detect_p50, s.track_p50, s.total_p50, s.total_p95, s.total_p99,
            s.missed_pct, s.total_frames, s.missed_frames, s.dropped_frames,
        )
    }
}

/// Computed timing statistics.
#[derive(Debug, Clone)]
pub struct FrameTimingStats {
    pub detect_p50: f64,
    pub detect_p99: f64,
    pub track_p50: f64,
    pub track_p99: f64,
    pub total_p50: f64,
    pub total_p95: f64,
    pub total_p99: f64,
    pub missed_pct: f64,
    pub total_frames: u64,
    pub missed_frames: u64,
    pub dropped_frames: u64,
}
