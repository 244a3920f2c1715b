use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gazex_core::{Region, ScrambleMethod};
use gazex_store::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentConfig {
    pub participant_id: String,
    pub trials: u32,
    /// A break follows every `break_every` trials while trials remain. 0 disables breaks.
    pub break_every: u32,
    /// Seed for trial planning. Random when absent.
    pub seed: Option<u64>,
    pub timing: TimingConfig,
    pub layout: LayoutConfig,
    pub gaze: GazeConfig,
    pub validation: ValidationConfig,
    pub scramble: ScrambleConfig,
    pub stimuli: StimuliConfig,
    pub delivery: DeliveryConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            participant_id: "anonymous".to_string(),
            trials: 50,
            break_every: 20,
            seed: None,
            timing: TimingConfig::default(),
            layout: LayoutConfig::default(),
            gaze: GazeConfig::default(),
            validation: ValidationConfig::default(),
            scramble: ScrambleConfig::default(),
            stimuli: StimuliConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

/// Phase durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingConfig {
    pub inter_trial_ms: u64,
    pub fixation_ms: u64,
    pub trial_window_ms: u64,
    pub calibration_ms: u64,
    pub validation_settle_ms: u64,
    pub validation_collect_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            inter_trial_ms: 500,
            fixation_ms: 500,
            trial_window_ms: 3000,
            calibration_ms: 6000,
            validation_settle_ms: 500,
            validation_collect_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn inter_trial(&self) -> Duration {
        Duration::from_millis(self.inter_trial_ms)
    }

    pub fn fixation(&self) -> Duration {
        Duration::from_millis(self.fixation_ms)
    }

    pub fn trial_window(&self) -> Duration {
        Duration::from_millis(self.trial_window_ms)
    }

    /// Length of each calibration half.
    pub fn calibration_half(&self) -> Duration {
        Duration::from_millis(self.calibration_ms / 2)
    }

    pub fn validation_settle(&self) -> Duration {
        Duration::from_millis(self.validation_settle_ms)
    }

    pub fn validation_collect(&self) -> Duration {
        Duration::from_millis(self.validation_collect_ms)
    }
}

/// Screen geometry. Stimuli are centred at a quarter and three quarters of the
/// screen width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LayoutConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            screen_width: 1280,
            screen_height: 720,
            image_width: 400,
            image_height: 300,
        }
    }
}

impl LayoutConfig {
    pub fn diagonal(&self) -> f64 {
        (self.screen_width as f64).hypot(self.screen_height as f64)
    }

    /// On-screen bounding boxes of the left and right stimulus.
    pub fn regions(&self) -> (Region, Region) {
        let (w, h) = (self.screen_width as f64, self.screen_height as f64);
        let (iw, ih) = (self.image_width as f64, self.image_height as f64);
        let y = h / 2.0 - ih / 2.0;
        (
            Region::new(w * 0.25 - iw / 2.0, y, iw, ih),
            Region::new(w * 0.75 - iw / 2.0, y, iw, ih),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GazeConfig {
    pub window_size: usize,
    pub sample_rate_hz: f64,
    pub channel_capacity: usize,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            sample_rate_hz: 30.0,
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationConfig {
    pub min_accuracy: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { min_accuracy: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrambleConfig {
    pub methods: Vec<ScrambleMethod>,
    pub levels: Vec<f64>,
}

impl Default for ScrambleConfig {
    fn default() -> Self {
        Self {
            methods: ScrambleMethod::ALL.to_vec(),
            levels: vec![0.0, 0.25, 0.5, 0.75, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StimuliConfig {
    /// Manifest JSON. The placeholder manifest is used when absent or unreadable.
    pub manifest_path: Option<PathBuf>,
    /// Image paths in the manifest are relative to this directory.
    pub image_root: PathBuf,
    /// Substitute generated images for files that cannot be decoded.
    pub placeholders: bool,
    pub placeholder_width: u32,
    pub placeholder_height: u32,
}

impl Default for StimuliConfig {
    fn default() -> Self {
        Self {
            manifest_path: None,
            image_root: PathBuf::from("."),
            placeholders: true,
            placeholder_width: 800,
            placeholder_height: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryConfig {
    pub queue_path: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_path: PathBuf::from("gazex-pending.json"),
            retry: RetryPolicy::default(),
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::ZeroTrials);
        }
        if self.scramble.methods.is_empty() {
            return Err(ConfigError::NoScrambleMethods);
        }
        if self.scramble.levels.is_empty() {
            return Err(ConfigError::NoScrambleLevels);
        }
        if let Some(&level) = self
            .scramble
            .levels
            .iter()
            .find(|l| !(0.0..=1.0).contains(*l))
        {
            return Err(ConfigError::LevelOutOfRange(level));
        }
        if !(self.gaze.sample_rate_hz > 0.0) {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.gaze.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if !(0.0..=1.0).contains(&self.validation.min_accuracy) {
            return Err(ConfigError::MinAccuracyOutOfRange(self.validation.min_accuracy));
        }
        let l = &self.layout;
        if l.screen_width == 0 || l.screen_height == 0 || l.image_width == 0 || l.image_height == 0 {
            return Err(ConfigError::EmptyLayout);
        }
        Ok(())
    }
}
