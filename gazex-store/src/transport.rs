use std::future::Future;

use gazex_core::{EnvironmentInfo, TrialPayload};
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Body of a session creation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    pub participant_id: String,
    pub calibration_accuracy: f64,
    pub environment: EnvironmentInfo,
}

/// The remote store as seen by the gateway. One call is one attempt; retrying is
/// the gateway's job.
pub trait Transport: Send + Sync + 'static {
    fn create_session(
        &self,
        request: &SessionRequest,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    fn save_trial(
        &self,
        session_id: &str,
        payload: &TrialPayload,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn complete_session(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
