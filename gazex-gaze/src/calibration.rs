use gazex_core::{GazePoint, GazeSample, Side};
use tracing::info;

use crate::error::GazeError;

/// Where the participant is asked to look during each half of calibration.
pub fn reference_point(side: Side, screen_width: f64, screen_height: f64) -> GazePoint {
    let x = match side {
        Side::Left => screen_width * 0.25,
        Side::Right => screen_width * 0.75,
    };
    GazePoint::new(x, screen_height * 0.5)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    pub threshold: f64,
    pub left_mean: f64,
    pub right_mean: f64,
    pub left_count: usize,
    pub right_count: usize,
}

/// Raw samples gathered while each reference point was shown.
#[derive(Debug, Clone, Default)]
pub struct CalibrationSamples {
    left: Vec<GazePoint>,
    right: Vec<GazePoint>,
}

impl CalibrationSamples {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the sample if its coordinates are finite. Returns whether it was kept.
    pub fn record(&mut self, side: Side, sample: GazeSample) -> bool {
        if !sample.point.is_finite() {
            return false;
        }
        match side {
            Side::Left => self.left.push(sample.point),
            Side::Right => self.right.push(sample.point),
        }
        true
    }

    pub fn count(&self, side: Side) -> usize {
        match side {
            Side::Left => self.left.len(),
            Side::Right => self.right.len(),
        }
    }

    /// Midpoint of the two halves' mean x.
    pub fn threshold(&self) -> Result<CalibrationResult, GazeError> {
        let left_mean = mean_x(&self.left).ok_or(GazeError::InsufficientCalibrationData(Side::Left))?;
        let right_mean =
            mean_x(&self.right).ok_or(GazeError::InsufficientCalibrationData(Side::Right))?;
        let result = CalibrationResult {
            threshold: (left_mean + right_mean) / 2.0,
            left_mean,
            right_mean,
            left_count: self.left.len(),
            right_count: self.right.len(),
        };
        info!(
            threshold = result.threshold,
            left_mean,
            right_mean,
            left_count = result.left_count,
            right_count = result.right_count,
            "calibration computed"
        );
        Ok(result)
    }
}

fn mean_x(points: &[GazePoint]) -> Option<f64> {
    if points.is_empty() {
        return None;
    }
    Some(points.iter().map(|p| p.x).sum::<f64>() / points.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_points_sit_at_quarter_widths() {
        assert_eq!(reference_point(Side::Left, 1000.0, 600.0), GazePoint::new(250.0, 300.0));
        assert_eq!(reference_point(Side::Right, 1000.0, 600.0), GazePoint::new(750.0, 300.0));
    }

    #[test]
    fn threshold_is_midpoint_of_means() {
        let mut c = CalibrationSamples::new();
        c.record(Side::Left, GazeSample::new(200.0, 0.0, 0.0));
        c.record(Side::Left, GazeSample::new(300.0, 0.0, 1.0));
        c.record(Side::Right, GazeSample::new(700.0, 0.0, 2.0));
        let r = c.threshold().unwrap();
        assert_eq!(r.left_mean, 250.0);
        assert_eq!(r.right_mean, 700.0);
        assert_eq!(r.threshold, 475.0);
        assert_eq!((r.left_count, r.right_count), (2, 1));
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let mut c = CalibrationSamples::new();
        assert!(!c.record(Side::Left, GazeSample::new(f64::INFINITY, 0.0, 0.0)));
        assert!(!c.record(Side::Left, GazeSample::new(1.0, f64::NAN, 0.0)));
        assert_eq!(c.count(Side::Left), 0);
    }

    #[test]
    fn empty_half_is_reported() {
        let mut c = CalibrationSamples::new();
        c.record(Side::Left, GazeSample::new(200.0, 0.0, 0.0));
        assert_eq!(
            c.threshold(),
            Err(GazeError::InsufficientCalibrationData(Side::Right))
        );
        assert_eq!(
            CalibrationSamples::new().threshold(),
            Err(GazeError::InsufficientCalibrationData(Side::Left))
        );
    }
}
