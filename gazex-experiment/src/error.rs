use std::path::PathBuf;

use gazex_core::{AttentionClass, TransitionError};
use gazex_gaze::GazeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("trial count must be positive")]
    ZeroTrials,
    #[error("no scramble methods configured")]
    NoScrambleMethods,
    #[error("no scramble levels configured")]
    NoScrambleLevels,
    #[error("scramble level {0} is outside [0, 1]")]
    LevelOutOfRange(f64),
    #[error("gaze sample rate must be positive")]
    ZeroSampleRate,
    #[error("smoothing window must hold at least one sample")]
    ZeroWindow,
    #[error("minimum accuracy {0} is outside [0, 1]")]
    MinAccuracyOutOfRange(f64),
    #[error("screen and image dimensions must be positive")]
    EmptyLayout,
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid manifest JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("manifest has no {0:?}-attention category with images")]
    MissingClass(AttentionClass),
    #[error("category `{0}` lists no images")]
    EmptyCategory(String),
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Gaze(#[from] GazeError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
