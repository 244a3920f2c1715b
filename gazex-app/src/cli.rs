use std::path::PathBuf;

use clap::Parser;
use gazex_experiment::ExperimentConfig;

/// Runs a simulated eye-tracking attention session end to end.
#[derive(Debug, Clone, Parser)]
#[command(name = "gazex", version, about)]
pub struct Args {
    /// Experiment configuration (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of trials.
    #[arg(short, long)]
    pub trials: Option<u32>,

    /// Break after every N trials (0 disables breaks).
    #[arg(long)]
    pub break_every: Option<u32>,

    /// Seed for trial planning and the simulated participant.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Local queue file for undelivered trials.
    #[arg(long)]
    pub queue: Option<PathBuf>,

    /// Participant identifier sent with the session.
    #[arg(long)]
    pub participant: Option<String>,

    /// Simulate an unreachable data store.
    #[arg(long)]
    pub offline: bool,

    /// Divide every phase duration by this factor.
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,

    /// Gaze noise of the simulated participant, in pixels.
    #[arg(long, default_value_t = 8.0)]
    pub jitter: f64,

    /// Probability that the participant looks at the left stimulus.
    #[arg(long, default_value_t = 0.5)]
    pub left_bias: f64,

    /// Write the session, its validation and every trial record as JSON.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Save every rendered frame as a PNG in this directory.
    #[arg(long)]
    pub frames: Option<PathBuf>,
}

impl Args {
    /// Command-line flags take precedence over the configuration file.
    pub fn apply(&self, config: &mut ExperimentConfig) {
        if let Some(trials) = self.trials {
            config.trials = trials;
        }
        if let Some(every) = self.break_every {
            config.break_every = every;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(queue) = &self.queue {
            config.delivery.queue_path = queue.clone();
        }
        if let Some(participant) = &self.participant {
            config.participant_id = participant.clone();
        }
        if self.speed > 1.0 {
            let scale = |ms: &mut u64| *ms = ((*ms as f64 / self.speed).round() as u64).max(1);
            let t = &mut config.timing;
            for ms in [
                &mut t.inter_trial_ms,
                &mut t.fixation_ms,
                &mut t.trial_window_ms,
                &mut t.calibration_ms,
                &mut t.validation_settle_ms,
                &mut t.validation_collect_ms,
            ] {
                scale(ms);
            }
        }
    }
}
