use std::future::Future;
use std::sync::Arc;

use gazex_core::{GazePoint, Region, SessionSummary, Side};
use gazex_gaze::ValidationReport;
use image::RgbaImage;

/// What the participant sees.
#[derive(Debug, Clone)]
pub enum Screen {
    Welcome,
    Camera,
    CalibrationTarget {
        side: Side,
        point: GazePoint,
    },
    ValidationTarget {
        index: usize,
        point: GazePoint,
    },
    ValidationResult {
        report: ValidationReport,
        passed: bool,
    },
    Instructions,
    /// Inter-trial interval: nothing on screen.
    Blank,
    Fixation {
        center: GazePoint,
    },
    Stimuli {
        trial: u32,
        left: Arc<RgbaImage>,
        right: Arc<RgbaImage>,
        left_region: Region,
        right_region: Region,
    },
    Break {
        completed: u32,
        total: u32,
    },
    Completion {
        summary: SessionSummary,
    },
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Welcome => "welcome",
            Screen::Camera => "camera",
            Screen::CalibrationTarget { .. } => "calibration-target",
            Screen::ValidationTarget { .. } => "validation-target",
            Screen::ValidationResult { .. } => "validation-result",
            Screen::Instructions => "instructions",
            Screen::Blank => "blank",
            Screen::Fixation { .. } => "fixation",
            Screen::Stimuli { .. } => "stimuli",
            Screen::Break { .. } => "break",
            Screen::Completion { .. } => "completion",
        }
    }
}

/// Points where the engine waits on the participant.
#[derive(Debug, Clone, PartialEq)]
pub enum Prompt {
    Start,
    /// Calibration failed and will be repeated.
    CalibrationRetry { reason: String },
    /// Validation fell short; continuing or recalibrating is the participant's call.
    LowAccuracy { accuracy: f64, min_accuracy: f64 },
    Instructions,
    Break { completed: u32, total: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Continue,
    Recalibrate,
}

/// Display and input surface the engine drives.
pub trait Presenter: Send {
    fn show(&mut self, screen: &Screen);

    fn prompt(&mut self, prompt: Prompt) -> impl Future<Output = UserAction> + Send;
}
