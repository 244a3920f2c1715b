use serde::{Deserialize, Serialize};

/// Host details recorded with the session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    pub platform: String,
    pub arch: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub agent: String,
}

impl EnvironmentInfo {
    pub fn current(screen_width: u32, screen_height: u32) -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            screen_width,
            screen_height,
            agent: format!("gazex/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    participant_id: String,
    pub calibration_accuracy: f64,
    pub environment: EnvironmentInfo,
    completed: bool,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        participant_id: impl Into<String>,
        calibration_accuracy: f64,
        environment: EnvironmentInfo,
    ) -> Self {
        Self {
            id: id.into(),
            participant_id: participant_id.into(),
            calibration_accuracy: calibration_accuracy.clamp(0.0, 1.0),
            environment,
            completed: false,
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn mark_completed(&mut self) {
        self.completed = true;
    }

    /// Sessions the remote store never acknowledged carry a local id.
    pub fn is_local(&self) -> bool {
        self.id.starts_with("local-")
    }
}

/// End-of-session report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub trials_run: usize,
    pub trials_abandoned: usize,
    pub breaks_taken: usize,
    pub delivered: usize,
    /// Records that ended up in the durable queue.
    pub undelivered: usize,
    pub completion_acknowledged: bool,
    pub calibration_accuracy: f64,
}
