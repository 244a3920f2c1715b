//! Gaze stream handling: the oracle seam, smoothing and side classification,
//! fixation reduction, and the calibration/validation arithmetic.

pub mod calibration;
pub mod error;
pub mod fixation;
pub mod oracle;
pub mod smoothing;
pub mod synthetic;
pub mod validation;

pub use calibration::{CalibrationResult, CalibrationSamples, reference_point};
pub use error::{GazeError, OracleError};
pub use fixation::reduce_fixations;
pub use oracle::{GazeAdapter, GazeOracle, GazeStream};
pub use smoothing::{GazeSmoother, SmoothedSample, TrialRecorder};
pub use synthetic::{GazeTarget, SyntheticOracle};
pub use validation::{TargetResult, VALIDATION_TARGETS, ValidationReport, accuracy, mean_point};
