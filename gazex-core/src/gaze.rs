use serde::{Deserialize, Serialize};

/// A screen-space gaze prediction in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePoint {
    pub x: f64,
    pub y: f64,
}

impl GazePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(&self, other: &GazePoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A prediction with the oracle's timestamp (milliseconds, monotonic).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub point: GazePoint,
    pub timestamp_ms: f64,
}

impl GazeSample {
    pub const fn new(x: f64, y: f64, timestamp_ms: f64) -> Self {
        Self {
            point: GazePoint::new(x, y),
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Axis-aligned on-screen rectangle, edges inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Region {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: &GazePoint) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    pub fn center(&self) -> GazePoint {
        GazePoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// Per-trial fixation aggregates. Times are in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixationStats {
    pub left_time: f64,
    pub right_time: f64,
    pub center_time: f64,
    pub switches: u32,
    pub first_fixation_side: Option<Side>,
    pub left_percentage: f64,
    pub right_percentage: f64,
    pub total_samples: usize,
}

impl FixationStats {
    pub fn total_time(&self) -> f64 {
        self.left_time + self.right_time + self.center_time
    }

    /// Remainder of the window not spent on either stimulus.
    pub fn center_percentage(&self) -> f64 {
        if self.total_samples == 0 {
            return 0.0;
        }
        (100.0 - self.left_percentage - self.right_percentage).max(0.0)
    }

    pub fn time_on(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left_time,
            Side::Right => self.right_time,
        }
    }
}
