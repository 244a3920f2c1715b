use gazex_experiment::{Presenter, Prompt, Screen, UserAction};
use gazex_gaze::GazeTarget;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Simulated participant. Follows every target, picks one stimulus per trial,
/// and recalibrates once if validation comes back low.
pub struct AutoParticipant {
    target: GazeTarget,
    rng: StdRng,
    left_bias: f64,
    recalibrations_left: u32,
}

impl AutoParticipant {
    pub fn new(target: GazeTarget, left_bias: f64, seed: u64) -> Self {
        Self {
            target,
            rng: StdRng::seed_from_u64(seed),
            left_bias: left_bias.clamp(0.0, 1.0),
            recalibrations_left: 1,
        }
    }
}

impl Presenter for AutoParticipant {
    fn show(&mut self, screen: &Screen) {
        match screen {
            Screen::CalibrationTarget { point, .. }
            | Screen::ValidationTarget { point, .. }
            | Screen::Fixation { center: point } => self.target.look_at(*point),
            Screen::Stimuli {
                left_region,
                right_region,
                ..
            } => {
                let region = if self.rng.random_bool(self.left_bias) {
                    left_region
                } else {
                    right_region
                };
                self.target.look_at(region.center());
            }
            Screen::Blank | Screen::Break { .. } => self.target.look_away(),
            _ => {}
        }
    }

    async fn prompt(&mut self, prompt: Prompt) -> UserAction {
        match prompt {
            Prompt::LowAccuracy {
                accuracy,
                min_accuracy,
            } if self.recalibrations_left > 0 => {
                self.recalibrations_left -= 1;
                info!(accuracy, min_accuracy, "participant asks to recalibrate");
                UserAction::Recalibrate
            }
            Prompt::CalibrationRetry { reason } => {
                info!(%reason, "participant retries calibration");
                UserAction::Continue
            }
            _ => UserAction::Continue,
        }
    }
}
