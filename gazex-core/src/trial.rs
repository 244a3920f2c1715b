use serde::{Deserialize, Serialize};

use crate::gaze::{FixationStats, Side};
use crate::scramble::{ScrambleMethod, ScrambleSpec};
use crate::stimulus::{ImageDescriptor, StimulusPair};

/// Sub-states of a single trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    InterTrial,
    Fixation,
    Loading,
    Stimulus,
    Complete,
    Abandoned,
}

/// What happened once the collection window closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialOutcome {
    pub fixation: FixationStats,
    pub raw_sample_count: usize,
    pub duration_ms: u64,
    /// Unix epoch milliseconds at window close.
    pub timestamp_ms: u64,
    /// Set when the stimuli could not be prepared.
    pub abandoned: Option<String>,
}

/// A planned trial. The outcome is attached exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    pub number: u32,
    pub stimuli: StimulusPair,
    pub scramble: ScrambleSpec,
    pub scramble_seed: u64,
    outcome: Option<TrialOutcome>,
}

impl Trial {
    pub fn new(number: u32, stimuli: StimulusPair, scramble: ScrambleSpec, scramble_seed: u64) -> Self {
        Self {
            number,
            stimuli,
            scramble,
            scramble_seed,
            outcome: None,
        }
    }

    /// Attaches the outcome. Returns false and leaves the trial untouched if an
    /// outcome is already present.
    pub fn record_outcome(&mut self, outcome: TrialOutcome) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.outcome = Some(outcome);
        true
    }

    pub fn outcome(&self) -> Option<&TrialOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_abandoned(&self) -> bool {
        self.outcome
            .as_ref()
            .is_some_and(|o| o.abandoned.is_some())
    }

    pub fn payload(&self) -> Option<TrialPayload> {
        self.outcome.as_ref().map(|o| TrialPayload::new(self, o))
    }
}

/// Image entry as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadImage {
    #[serde(flatten)]
    pub image: ImageDescriptor,
    pub scramble_method: ScrambleMethod,
    pub scramble_level: f64,
}

/// Record sent to the remote store. Raw samples are never included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialPayload {
    pub trial_number: u32,
    pub left_image: PayloadImage,
    pub right_image: PayloadImage,
    pub scramble_method: ScrambleMethod,
    pub scramble_level: f64,
    pub scramble_seed: u64,
    pub left_fixation_time: f64,
    pub right_fixation_time: f64,
    pub center_time: f64,
    pub switches: u32,
    pub first_fixation: Option<Side>,
    pub left_percentage: f64,
    pub right_percentage: f64,
    pub center_percentage: f64,
    pub total_samples: usize,
    pub raw_sample_count: usize,
    pub duration: u64,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandoned_reason: Option<String>,
}

impl TrialPayload {
    fn new(trial: &Trial, outcome: &TrialOutcome) -> Self {
        let image = |d: &ImageDescriptor| PayloadImage {
            image: d.clone(),
            scramble_method: trial.scramble.method,
            scramble_level: trial.scramble.level,
        };
        let f = &outcome.fixation;
        Self {
            trial_number: trial.number,
            left_image: image(&trial.stimuli.left),
            right_image: image(&trial.stimuli.right),
            scramble_method: trial.scramble.method,
            scramble_level: trial.scramble.level,
            scramble_seed: trial.scramble_seed,
            left_fixation_time: f.left_time,
            right_fixation_time: f.right_time,
            center_time: f.center_time,
            switches: f.switches,
            first_fixation: f.first_fixation_side,
            left_percentage: f.left_percentage,
            right_percentage: f.right_percentage,
            center_percentage: f.center_percentage(),
            total_samples: f.total_samples,
            raw_sample_count: outcome.raw_sample_count,
            duration: outcome.duration_ms,
            timestamp: outcome.timestamp_ms,
            abandoned_reason: outcome.abandoned.clone(),
        }
    }
}
