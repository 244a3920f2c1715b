pub mod clock;
pub mod gaze;
pub mod phase;
pub mod scramble;
pub mod session;
pub mod stimulus;
pub mod trial;

pub use clock::epoch_millis;
pub use gaze::{FixationStats, GazePoint, GazeSample, Region, Side};
pub use phase::{ExperimentPhase, PhaseEvent, TransitionError};
pub use scramble::{ScrambleMethod, ScrambleSpec};
pub use session::{EnvironmentInfo, Session, SessionSummary};
pub use stimulus::{AttentionClass, ImageDescriptor, StimulusPair};
pub use trial::{Trial, TrialOutcome, TrialPayload, TrialState};
