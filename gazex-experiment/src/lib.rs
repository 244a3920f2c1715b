//! Session orchestration: configuration, stimulus manifest and images, trial
//! planning, and the engine that walks a participant through every phase.

pub mod config;
pub mod engine;
pub mod error;
pub mod images;
pub mod manifest;
pub mod placeholder;
pub mod planner;
pub mod presenter;
pub mod visibility;

pub use config::{
    DeliveryConfig, ExperimentConfig, GazeConfig, LayoutConfig, ScrambleConfig, StimuliConfig,
    TimingConfig, ValidationConfig,
};
pub use engine::{Engine, EngineReport};
pub use error::{ConfigError, EngineError, ImageError, ManifestError};
pub use images::{FileImageSource, ImageSource, PlaceholderSource, prepare_pair};
pub use manifest::{Category, LoadedManifest, Manifest, ManifestSource};
pub use placeholder::{PLACEHOLDER_CATEGORIES, PLACEHOLDER_IMAGES_PER_CATEGORY, placeholder_image};
pub use planner::{plan_trials, redraw_pair};
pub use presenter::{Presenter, Prompt, Screen, UserAction};
pub use visibility::{Visibility, watch_visibility};
