use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Experiment phases, in presentation order.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExperimentPhase {
    #[default]
    Welcome,
    Camera,
    Calibration,
    Validation,
    Instructions,
    Trial,
    Break,
    Completion,
}

/// Events that drive the phase graph.
#[derive(Copy, Debug, Clone, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Participant pressed the start / continue control.
    Continue,
    /// Oracle initialised and the camera feed is live.
    CameraReady,
    CalibrationComplete,
    /// Validation accepted (either passed or participant chose to continue).
    ValidationAccepted,
    Recalibrate,
    BreakDue,
    TrialsExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no transition from {from:?} on {event:?}")]
pub struct TransitionError {
    pub from: ExperimentPhase,
    pub event: PhaseEvent,
}

impl ExperimentPhase {
    /// Whether the phase waits for a participant action before it can leave.
    pub fn allows_input(&self) -> bool {
        matches!(
            self,
            Self::Welcome | Self::Instructions | Self::Break | Self::Validation
        )
    }

    pub fn requires_calibration(&self) -> bool {
        matches!(self, Self::Calibration)
    }

    /// Phases during which a gaze collection window may be open.
    pub fn collects_gaze(&self) -> bool {
        matches!(self, Self::Calibration | Self::Validation | Self::Trial)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completion)
    }

    /// The transition table. Every edge is single-directional; anything not listed
    /// here is rejected.
    pub fn on(self, event: PhaseEvent) -> Result<Self, TransitionError> {
        use ExperimentPhase::*;
        use PhaseEvent::*;
        let next = match (self, event) {
            (Welcome, Continue) => Camera,
            (Camera, CameraReady) => Calibration,
            (Calibration, CalibrationComplete) => Validation,
            (Validation, ValidationAccepted) => Instructions,
            (Validation, Recalibrate) => Calibration,
            (Instructions, Continue) => Trial,
            (Trial, BreakDue) => Break,
            (Break, Continue) => Trial,
            (Trial, TrialsExhausted) => Completion,
            (from, event) => return Err(TransitionError { from, event }),
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_completion() {
        let mut phase = ExperimentPhase::default();
        for event in [
            PhaseEvent::Continue,
            PhaseEvent::CameraReady,
            PhaseEvent::CalibrationComplete,
            PhaseEvent::ValidationAccepted,
            PhaseEvent::Continue,
            PhaseEvent::BreakDue,
            PhaseEvent::Continue,
            PhaseEvent::TrialsExhausted,
        ] {
            phase = phase.on(event).unwrap();
        }
        assert_eq!(phase, ExperimentPhase::Completion);
        assert!(phase.is_terminal());
    }

    #[test]
    fn recalibrate_edge_only_from_validation() {
        assert_eq!(
            ExperimentPhase::Validation.on(PhaseEvent::Recalibrate),
            Ok(ExperimentPhase::Calibration)
        );
        assert!(ExperimentPhase::Trial.on(PhaseEvent::Recalibrate).is_err());
        assert!(ExperimentPhase::Instructions.on(PhaseEvent::Recalibrate).is_err());
    }

    #[test]
    fn completion_has_no_outgoing_edges() {
        for event in [
            PhaseEvent::Continue,
            PhaseEvent::CameraReady,
            PhaseEvent::CalibrationComplete,
            PhaseEvent::ValidationAccepted,
            PhaseEvent::Recalibrate,
            PhaseEvent::BreakDue,
            PhaseEvent::TrialsExhausted,
        ] {
            let err = ExperimentPhase::Completion.on(event).unwrap_err();
            assert_eq!(err.from, ExperimentPhase::Completion);
        }
    }

    #[test]
    fn break_cannot_complete_directly() {
        assert!(ExperimentPhase::Break.on(PhaseEvent::TrialsExhausted).is_err());
    }
}
