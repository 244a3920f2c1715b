use gazex_core::Side;
use thiserror::Error;

/// Failures reported by an oracle implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("no camera available")]
    NoCamera,
    #[error("oracle unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GazeError {
    #[error("oracle failed to initialise: {0}")]
    OracleInit(#[from] OracleError),
    #[error("no accepted calibration samples for the {0:?} reference point")]
    InsufficientCalibrationData(Side),
    #[error("calibration threshold already set for this cycle")]
    ThresholdAlreadySet,
    #[error("gaze samples cannot be classified before calibration")]
    Uncalibrated,
}
