use gazex_core::{FixationStats, GazePoint, Region, Side};

/// Buckets each sample into the left region, the right region or the centre and
/// derives the trial's fixation aggregates.
///
/// Every sample is worth `1000 / sample_rate_hz` ms. Switches count changes of side
/// between consecutive non-centre samples; centre samples are skipped over.
pub fn reduce_fixations(
    samples: impl IntoIterator<Item = GazePoint>,
    left: Region,
    right: Region,
    sample_rate_hz: f64,
) -> FixationStats {
    let slice_ms = if sample_rate_hz > 0.0 {
        1000.0 / sample_rate_hz
    } else {
        0.0
    };
    let mut stats = FixationStats::default();
    let mut last_side: Option<Side> = None;

    for point in samples {
        stats.total_samples += 1;
        let side = if left.contains(&point) {
            Some(Side::Left)
        } else if right.contains(&point) {
            Some(Side::Right)
        } else {
            None
        };
        match side {
            Some(Side::Left) => stats.left_time += slice_ms,
            Some(Side::Right) => stats.right_time += slice_ms,
            None => {
                stats.center_time += slice_ms;
                continue;
            }
        }
        if stats.first_fixation_side.is_none() {
            stats.first_fixation_side = side;
        }
        if last_side.is_some_and(|prev| Some(prev) != side) {
            stats.switches += 1;
        }
        last_side = side;
    }

    let total = stats.total_time();
    if total > 0.0 {
        stats.left_percentage = stats.left_time / total * 100.0;
        stats.right_percentage = stats.right_time / total * 100.0;
    }
    stats
}
