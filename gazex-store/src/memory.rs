//! In-process stand-in for the remote store, with the same observable behaviour
//! as the development mock server: sessions, trial records and a health probe.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gazex_core::{EnvironmentInfo, TrialPayload, epoch_millis};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::TransportError;
use crate::transport::{SessionRequest, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub session_id: String,
    pub participant_id: String,
    pub calibration_accuracy: f64,
    pub environment: EnvironmentInfo,
    pub status: SessionStatus,
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub completed_trials: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub sessions: usize,
    pub trials: usize,
}

#[derive(Debug, Default)]
struct State {
    sessions: HashMap<String, StoredSession>,
    trials: Vec<(String, TrialPayload)>,
}

#[derive(Debug, Default)]
struct Inner {
    state: Mutex<State>,
    offline: AtomicBool,
    fail_next: AtomicUsize,
    pass_first: AtomicUsize,
    calls: AtomicUsize,
    latency: Mutex<Option<Duration>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable handle; clones share the same store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with [`TransportError::Offline`] while set.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// The next `n` calls fail with a 503.
    pub fn fail_next(&self, n: usize) {
        self.fail_after(0, n);
    }

    /// Lets `ok` calls through, then fails the following `n` with a 503.
    pub fn fail_after(&self, ok: usize, n: usize) {
        self.inner.pass_first.store(ok, Ordering::SeqCst);
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    /// Delays every response, e.g. to trip the gateway's request timeout.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *lock(&self.inner.latency) = latency;
    }

    /// Number of calls received, failed ones included.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn health(&self) -> Health {
        let state = lock(&self.inner.state);
        Health {
            status: "ok",
            sessions: state.sessions.len(),
            trials: state.trials.len(),
        }
    }

    pub fn session(&self, session_id: &str) -> Option<StoredSession> {
        lock(&self.inner.state).sessions.get(session_id).cloned()
    }

    /// Stored trials of a session, in arrival order.
    pub fn trials(&self, session_id: &str) -> Vec<TrialPayload> {
        lock(&self.inner.state)
            .trials
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, p)| p.clone())
            .collect()
    }

    async fn enter(&self) -> Result<(), TransportError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *lock(&self.inner.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Offline);
        }
        let passed = self
            .inner
            .pass_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if passed.is_ok() {
            return Ok(());
        }
        let scripted = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if scripted.is_ok() {
            return Err(TransportError::Status {
                status: 503,
                message: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    async fn create_session(&self, request: &SessionRequest) -> Result<String, TransportError> {
        self.enter().await?;
        let session_id = Uuid::new_v4().to_string();
        let session = StoredSession {
            session_id: session_id.clone(),
            participant_id: request.participant_id.clone(),
            calibration_accuracy: request.calibration_accuracy,
            environment: request.environment.clone(),
            status: SessionStatus::InProgress,
            start_time: epoch_millis(),
            end_time: None,
            completed_trials: 0,
        };
        lock(&self.inner.state)
            .sessions
            .insert(session_id.clone(), session);
        debug!(%session_id, "session created");
        Ok(session_id)
    }

    async fn save_trial(&self, session_id: &str, payload: &TrialPayload) -> Result<(), TransportError> {
        self.enter().await?;
        let mut state = lock(&self.inner.state);
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| TransportError::UnknownSession(session_id.to_string()))?;
        session.completed_trials += 1;
        state.trials.push((session_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn complete_session(&self, session_id: &str) -> Result<(), TransportError> {
        self.enter().await?;
        let mut state = lock(&self.inner.state);
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| TransportError::UnknownSession(session_id.to_string()))?;
        session.status = SessionStatus::Completed;
        session.end_time = Some(epoch_millis());
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use gazex_core::{
        AttentionClass, FixationStats, ImageDescriptor, ScrambleMethod, ScrambleSpec,
        StimulusPair, Trial, TrialOutcome,
    };

    pub(crate) fn payload(number: u32) -> TrialPayload {
        let img = |category: &str, attention| ImageDescriptor {
            path: format!("images/{category}/1.jpg"),
            category: category.to_string(),
            attention,
        };
        let mut trial = Trial::new(
            number,
            StimulusPair {
                left: img("violence", AttentionClass::High),
                right: img("textures", AttentionClass::Low),
            },
            ScrambleSpec::new(ScrambleMethod::Block, 0.25),
            u64::from(number),
        );
        trial.record_outcome(TrialOutcome {
            fixation: FixationStats::default(),
            raw_sample_count: 0,
            duration_ms: 3000,
            timestamp_ms: 1,
            abandoned: None,
        });
        trial.payload().unwrap()
    }

    pub(crate) fn request() -> SessionRequest {
        SessionRequest {
            participant_id: "p-1".into(),
            calibration_accuracy: 0.8,
            environment: EnvironmentInfo::current(1280, 720),
        }
    }

    #[tokio::test]
    async fn session_lifecycle_mirrors_mock_api() {
        let t = MemoryTransport::new();
        let id = t.create_session(&request()).await.unwrap();
        let s = t.session(&id).unwrap();
        assert_eq!(s.status, SessionStatus::InProgress);
        assert_eq!(s.completed_trials, 0);

        t.save_trial(&id, &payload(1)).await.unwrap();
        t.save_trial(&id, &payload(2)).await.unwrap();
        assert_eq!(t.session(&id).unwrap().completed_trials, 2);

        t.complete_session(&id).await.unwrap();
        let s = t.session(&id).unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
        assert!(s.end_time.is_some());
        assert_eq!(
            t.health(),
            Health {
                status: "ok",
                sessions: 1,
                trials: 2
            }
        );
    }

    #[tokio::test]
    async fn unknown_session_is_rejected() {
        let t = MemoryTransport::new();
        let err = t.save_trial("nope", &payload(1)).await.unwrap_err();
        assert_eq!(err, TransportError::UnknownSession("nope".into()));
        assert_eq!(t.health().trials, 0);
    }

    #[tokio::test]
    async fn scripted_failures_run_out() {
        let t = MemoryTransport::new();
        t.fail_next(2);
        assert!(t.create_session(&request()).await.is_err());
        assert!(t.create_session(&request()).await.is_err());
        assert!(t.create_session(&request()).await.is_ok());
        assert_eq!(t.calls(), 3);
    }

    #[tokio::test]
    async fn failures_can_start_later() {
        let t = MemoryTransport::new();
        t.fail_after(1, 1);
        assert!(t.create_session(&request()).await.is_ok());
        assert!(t.create_session(&request()).await.is_err());
        assert!(t.create_session(&request()).await.is_ok());
    }

    #[tokio::test]
    async fn offline_rejects_everything() {
        let t = MemoryTransport::new();
        t.set_offline(true);
        assert_eq!(t.create_session(&request()).await, Err(TransportError::Offline));
        t.set_offline(false);
        assert!(t.create_session(&request()).await.is_ok());
    }
}
