use gazex_core::GazePoint;
use serde::Serialize;
use tracing::info;

/// Fractional screen positions shown during validation, in order.
pub const VALIDATION_TARGETS: [(f64, f64); 6] = [
    (0.2, 0.2),
    (0.8, 0.2),
    (0.5, 0.5),
    (0.2, 0.8),
    (0.8, 0.8),
    (0.5, 0.8),
];

/// Share of the screen diagonal at which accuracy reaches zero.
const ZERO_ACCURACY_FRACTION: f64 = 0.3;

pub fn mean_point(points: &[GazePoint]) -> Option<GazePoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Some(GazePoint::new(sx / n, sy / n))
}

/// `1 - d / (0.3 * diagonal)`, clamped to `[0, 1]`.
pub fn accuracy(mean_distance: f64, screen_diagonal: f64) -> f64 {
    if screen_diagonal <= 0.0 || !mean_distance.is_finite() {
        return 0.0;
    }
    (1.0 - mean_distance / (ZERO_ACCURACY_FRACTION * screen_diagonal)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResult {
    pub target: GazePoint,
    pub mean: Option<GazePoint>,
    pub distance: f64,
    pub samples: usize,
}

impl TargetResult {
    /// Scores one target. Without samples the distance is the full diagonal.
    pub fn score(target: GazePoint, points: &[GazePoint], screen_diagonal: f64) -> Self {
        let mean = mean_point(points);
        let distance = mean.map_or(screen_diagonal, |m| m.distance(&target));
        Self {
            target,
            mean,
            distance,
            samples: points.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub results: Vec<TargetResult>,
    pub mean_distance: f64,
    pub accuracy: f64,
}

impl ValidationReport {
    pub fn from_results(results: Vec<TargetResult>, screen_diagonal: f64) -> Self {
        let mean_distance = if results.is_empty() {
            screen_diagonal
        } else {
            results.iter().map(|r| r.distance).sum::<f64>() / results.len() as f64
        };
        let accuracy = accuracy(mean_distance, screen_diagonal);
        info!(mean_distance, accuracy, targets = results.len(), "validation scored");
        Self {
            results,
            mean_distance,
            accuracy,
        }
    }

    pub fn passes(&self, min_accuracy: f64) -> bool {
        self.accuracy >= min_accuracy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIAG: f64 = 1000.0;

    #[test]
    fn zero_distance_is_perfect() {
        assert_eq!(accuracy(0.0, DIAG), 1.0);
    }

    #[test]
    fn accuracy_hits_zero_at_threshold_distance() {
        assert!(accuracy(300.0, DIAG).abs() < 1e-12);
        assert!((accuracy(150.0, DIAG) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn accuracy_is_clamped() {
        assert_eq!(accuracy(5000.0, DIAG), 0.0);
        assert_eq!(accuracy(-10.0, DIAG), 1.0);
        assert_eq!(accuracy(10.0, 0.0), 0.0);
    }

    #[test]
    fn missing_samples_score_full_diagonal() {
        let r = TargetResult::score(GazePoint::new(10.0, 10.0), &[], DIAG);
        assert_eq!(r.distance, DIAG);
        assert_eq!(r.mean, None);
        assert_eq!(r.samples, 0);
    }

    #[test]
    fn report_averages_target_distances() {
        let t = GazePoint::new(100.0, 100.0);
        let hit = TargetResult::score(t, &[GazePoint::new(100.0, 100.0)], DIAG);
        let near = TargetResult::score(
            t,
            &[GazePoint::new(130.0, 140.0), GazePoint::new(130.0, 140.0)],
            DIAG,
        );
        assert_eq!(near.distance, 50.0);
        let report = ValidationReport::from_results(vec![hit, near], DIAG);
        assert_eq!(report.mean_distance, 25.0);
        assert!(report.passes(0.5));
        assert!(!report.passes(0.95));
    }

    #[test]
    fn mean_point_of_nothing_is_none() {
        assert_eq!(mean_point(&[]), None);
        assert_eq!(
            mean_point(&[GazePoint::new(0.0, 0.0), GazePoint::new(2.0, 4.0)]),
            Some(GazePoint::new(1.0, 2.0))
        );
    }
}
