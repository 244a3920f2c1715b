use std::collections::VecDeque;

use gazex_core::{FixationStats, GazePoint, GazeSample, Region, Side};
use tracing::{debug, info};

use crate::error::GazeError;
use crate::fixation::reduce_fixations;

/// A window-averaged sample and its side relative to the calibrated threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedSample {
    pub sample: GazeSample,
    pub side: Option<Side>,
}

/// Moving-average smoother plus threshold classifier.
#[derive(Debug, Clone)]
pub struct GazeSmoother {
    window: VecDeque<GazeSample>,
    window_size: usize,
    threshold: Option<f64>,
}

impl GazeSmoother {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            threshold: None,
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn threshold(&self) -> Option<f64> {
        self.threshold
    }

    /// Sets the left/right boundary. Only one value per calibration cycle.
    pub fn set_threshold(&mut self, threshold: f64) -> Result<(), GazeError> {
        if self.threshold.is_some() {
            return Err(GazeError::ThresholdAlreadySet);
        }
        info!(threshold, "calibration threshold set");
        self.threshold = Some(threshold);
        Ok(())
    }

    /// Starts a new calibration cycle.
    pub fn reset_calibration(&mut self) {
        debug!("calibration threshold cleared");
        self.threshold = None;
        self.window.clear();
    }

    pub fn classify(&self, x: f64) -> Option<Side> {
        self.threshold
            .map(|t| if x < t { Side::Left } else { Side::Right })
    }

    /// Feeds one raw sample. Emits once the window is full.
    pub fn push(&mut self, raw: GazeSample) -> Option<SmoothedSample> {
        if !raw.point.is_finite() {
            return None;
        }
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(raw);
        if self.window.len() < self.window_size {
            return None;
        }
        let n = self.window.len() as f64;
        let (sx, sy) = self
            .window
            .iter()
            .fold((0.0, 0.0), |(x, y), s| (x + s.point.x, y + s.point.y));
        let point = GazePoint::new(sx / n, sy / n);
        Some(SmoothedSample {
            sample: GazeSample {
                point,
                timestamp_ms: raw.timestamp_ms,
            },
            side: self.classify(point.x),
        })
    }

    pub fn clear_window(&mut self) {
        self.window.clear();
    }

    /// Opens a trial's collection. Fails while uncalibrated.
    pub fn begin_trial(&mut self) -> Result<TrialRecorder<'_>, GazeError> {
        if self.threshold.is_none() {
            return Err(GazeError::Uncalibrated);
        }
        self.window.clear();
        Ok(TrialRecorder {
            smoother: self,
            smoothed: Vec::new(),
            raw_count: 0,
        })
    }
}

/// Accumulates one trial's samples.
#[derive(Debug)]
pub struct TrialRecorder<'a> {
    smoother: &'a mut GazeSmoother,
    smoothed: Vec<SmoothedSample>,
    raw_count: usize,
}

impl TrialRecorder<'_> {
    pub fn record(&mut self, raw: GazeSample) {
        self.raw_count += 1;
        if let Some(s) = self.smoother.push(raw) {
            self.smoothed.push(s);
        }
    }

    pub fn raw_count(&self) -> usize {
        self.raw_count
    }

    pub fn smoothed(&self) -> &[SmoothedSample] {
        &self.smoothed
    }

    /// Reduces the collected samples against the on-screen regions.
    pub fn finish(self, left: Region, right: Region, sample_rate_hz: f64) -> (FixationStats, usize) {
        let stats = reduce_fixations(
            self.smoothed.iter().map(|s| s.sample.point),
            left,
            right,
            sample_rate_hz,
        );
        self.smoother.clear_window();
        (stats, self.raw_count)
    }
}
