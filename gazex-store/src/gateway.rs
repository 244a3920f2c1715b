use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gazex_core::{TrialPayload, epoch_millis};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{StoreError, TransportError};
use crate::queue::{LocalQueue, PendingRecord};
use crate::transport::{SessionRequest, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "millis")]
    pub base_backoff: Duration,
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Pause after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

/// Where a submitted record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    Queued,
    /// Neither delivered nor written to the queue.
    Lost(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayReport {
    pub attempted: usize,
    pub delivered: usize,
    pub remaining: usize,
    /// Local sessions created remotely during this replay.
    pub sessions_created: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStats {
    pub delivered: usize,
    pub queued: usize,
    pub lost: usize,
    pub replayed: usize,
}

#[derive(Debug)]
struct Inner<T> {
    transport: T,
    queue: LocalQueue,
    policy: RetryPolicy,
    delivered: AtomicUsize,
    queued: AtomicUsize,
    lost: AtomicUsize,
    replayed: AtomicUsize,
    /// Sessions running under a local id, keyed by that id.
    local: Mutex<HashMap<String, SessionRequest>>,
    /// Local id to remote id, once the store has created the session.
    promoted: Mutex<HashMap<String, String>>,
}

fn lock<V>(m: &Mutex<V>) -> MutexGuard<'_, V> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Retrying front of the remote store. Cheap to clone; clones share counters
/// and the queue.
#[derive(Debug)]
pub struct PersistenceGateway<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PersistenceGateway<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> PersistenceGateway<T> {
    pub fn new(transport: T, queue: LocalQueue, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                queue,
                policy: RetryPolicy {
                    max_attempts: policy.max_attempts.max(1),
                    ..policy
                },
                delivered: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
                lost: AtomicUsize::new(0),
                replayed: AtomicUsize::new(0),
                local: Mutex::new(HashMap::new()),
                promoted: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn queue(&self) -> &LocalQueue {
        &self.inner.queue
    }

    pub fn policy(&self) -> RetryPolicy {
        self.inner.policy
    }

    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            delivered: self.inner.delivered.load(Ordering::SeqCst),
            queued: self.inner.queued.load(Ordering::SeqCst),
            lost: self.inner.lost.load(Ordering::SeqCst),
            replayed: self.inner.replayed.load(Ordering::SeqCst),
        }
    }

    /// One attempt bounded by the request timeout.
    async fn try_once<R, Fut>(&self, call: Fut) -> Result<R, TransportError>
    where
        Fut: Future<Output = Result<R, TransportError>>,
    {
        let limit = self.inner.policy.request_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(TransportError::Timeout(limit)))
    }

    /// Runs `call` under the retry policy. Each attempt is bounded by the
    /// request timeout; the last failure is returned.
    async fn with_retry<R, F, Fut>(&self, op: &'static str, mut call: F) -> Result<R, TransportError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R, TransportError>>,
    {
        let policy = self.inner.policy;
        let mut attempt = 1;
        loop {
            match self.try_once(call()).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= policy.max_attempts => {
                    warn!(op, attempt, error = %err, "giving up");
                    return Err(err);
                }
                Err(err) => {
                    let pause = policy.backoff(attempt);
                    debug!(op, attempt, error = %err, backoff_ms = pause.as_millis() as u64, "retrying");
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn create_session(&self, request: &SessionRequest) -> Result<String, TransportError> {
        let id = self
            .with_retry("create_session", || self.inner.transport.create_session(request))
            .await?;
        info!(session_id = %id, "remote session created");
        Ok(id)
    }

    /// Issues a `local-<uuid>` id for a session the store could not create.
    /// Its queued records carry `request`, so a later replay can create the
    /// session remotely and deliver them under the remote id.
    pub fn local_session(&self, request: &SessionRequest) -> String {
        let id = format!("local-{}", Uuid::new_v4());
        lock(&self.inner.local).insert(id.clone(), request.clone());
        id
    }

    /// The id the store knows `session_id` by.
    fn resolve(&self, session_id: &str) -> String {
        lock(&self.inner.promoted)
            .get(session_id)
            .cloned()
            .unwrap_or_else(|| session_id.to_string())
    }

    pub async fn complete_session(&self, session_id: &str) -> Result<(), TransportError> {
        self.with_retry("complete_session", || {
            self.inner.transport.complete_session(session_id)
        })
        .await?;
        info!(%session_id, "session marked complete");
        Ok(())
    }

    /// Delivers a trial record, falling back to the durable queue. Never fails.
    pub async fn submit(&self, session_id: &str, payload: TrialPayload) -> Delivery {
        let trial = payload.trial_number;
        let session_id = self.resolve(session_id);
        let session_id = session_id.as_str();
        let sent = self
            .with_retry("save_trial", || self.inner.transport.save_trial(session_id, &payload))
            .await;
        let err = match sent {
            Ok(()) => {
                self.inner.delivered.fetch_add(1, Ordering::SeqCst);
                debug!(%session_id, trial, "trial delivered");
                return Delivery::Delivered;
            }
            Err(err) => err,
        };

        let record = PendingRecord {
            session_id: session_id.to_string(),
            payload,
            enqueued_at: epoch_millis(),
            session: lock(&self.inner.local).get(session_id).cloned(),
        };
        match self.inner.queue.push(record).await {
            Ok(pending) => {
                self.inner.queued.fetch_add(1, Ordering::SeqCst);
                warn!(%session_id, trial, pending, error = %err, "trial queued for later delivery");
                Delivery::Queued
            }
            Err(queue_err) => {
                self.inner.lost.fetch_add(1, Ordering::SeqCst);
                error!(%session_id, trial, error = %queue_err, "trial could not be queued");
                Delivery::Lost(queue_err.to_string())
            }
        }
    }

    /// Tries every queued record once, oldest first. Records of local sessions
    /// first get their session created remotely, once per local id. Delivered
    /// records leave the queue; the rest stay in their original order, moved
    /// onto the remote id where one now exists.
    pub async fn replay_pending(&self) -> Result<ReplayReport, StoreError> {
        let pending = self.inner.queue.load().await?;
        if pending.is_empty() {
            return Ok(ReplayReport::default());
        }
        info!(pending = pending.len(), "replaying queued trials");

        let mut promoted: HashMap<String, String> = HashMap::new();
        let mut refused: HashSet<String> = HashSet::new();
        let mut delivered = Vec::new();
        for record in &pending {
            let trial = record.payload.trial_number;
            let mut session_id = self.resolve(&record.session_id);
            if let Some(request) = &record.session {
                if let Some(remote) = promoted.get(&record.session_id) {
                    session_id = remote.clone();
                } else if session_id == record.session_id {
                    if refused.contains(&record.session_id) {
                        continue;
                    }
                    match self.try_once(self.inner.transport.create_session(request)).await {
                        Ok(remote) => {
                            info!(local_id = %record.session_id, session_id = %remote, "local session created remotely");
                            promoted.insert(record.session_id.clone(), remote.clone());
                            session_id = remote;
                        }
                        Err(err) => {
                            debug!(local_id = %record.session_id, error = %err, "local session still not accepted");
                            refused.insert(record.session_id.clone());
                            continue;
                        }
                    }
                }
            }
            match self
                .try_once(self.inner.transport.save_trial(&session_id, &record.payload))
                .await
            {
                Ok(()) => delivered.push(record.clone()),
                Err(err) => debug!(%session_id, trial, error = %err, "replay failed"),
            }
        }

        let sessions_created = promoted.len();
        let rebind = {
            let mut known = lock(&self.inner.promoted);
            known.extend(promoted);
            known.clone()
        };
        let remaining = if delivered.is_empty() && rebind.is_empty() {
            pending.len()
        } else {
            self.inner.queue.settle(&delivered, &rebind).await?
        };
        self.inner
            .replayed
            .fetch_add(delivered.len(), Ordering::SeqCst);

        let report = ReplayReport {
            attempted: pending.len(),
            delivered: delivered.len(),
            remaining,
            sessions_created,
        };
        info!(
            attempted = report.attempted,
            delivered = report.delivered,
            remaining = report.remaining,
            sessions_created = report.sessions_created,
            "replay finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;
    use crate::memory::tests::{payload, request};
    use tokio::time::Instant;

    fn gateway(dir: &tempfile::TempDir) -> PersistenceGateway<MemoryTransport> {
        PersistenceGateway::new(
            MemoryTransport::new(),
            LocalQueue::new(dir.path().join("pending.json")),
            RetryPolicy::default(),
        )
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Duration::from_millis(500));
        assert_eq!(p.backoff(2), Duration::from_millis(1000));
        assert_eq!(p.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn policy_reads_millis() {
        let p: RetryPolicy = serde_json::from_str(r#"{"maxAttempts":5,"baseBackoff":100}"#).unwrap();
        assert_eq!(p.max_attempts, 5);
        assert_eq!(p.base_backoff, Duration::from_millis(100));
        assert_eq!(p.request_timeout, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_below_limit_are_retried_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&dir);
        let id = gw.create_session(&request()).await.unwrap();

        gw.transport().fail_next(2);
        let start = Instant::now();
        assert_eq!(gw.submit(&id, payload(1)).await, Delivery::Delivered);
        assert!(start.elapsed() >= Duration::from_millis(1500));
        assert!(gw.queue().is_empty().await.unwrap());
        assert_eq!(gw.transport().trials(&id).len(), 1);
        assert_eq!(gw.stats().delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_queue_once_then_replay_clears() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&dir);
        let id = gw.create_session(&request()).await.unwrap();

        gw.transport().fail_next(3);
        assert_eq!(gw.submit(&id, payload(1)).await, Delivery::Queued);
        assert_eq!(gw.queue().len().await.unwrap(), 1);
        assert_eq!(gw.transport().trials(&id).len(), 0);

        let report = gw.replay_pending().await.unwrap();
        assert_eq!(
            report,
            ReplayReport {
                attempted: 1,
                delivered: 1,
                remaining: 0,
                sessions_created: 0,
            }
        );
        assert!(gw.queue().is_empty().await.unwrap());
        assert_eq!(gw.transport().trials(&id).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&dir);
        let id = gw.create_session(&request()).await.unwrap();
        gw.transport().set_latency(Some(Duration::from_secs(30)));

        let start = Instant::now();
        assert_eq!(gw.submit(&id, payload(1)).await, Delivery::Queued);
        // three 5 s attempts plus 0.5 s and 1 s of backoff
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(16_500), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(16_600), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn replay_is_fifo_and_keeps_failures_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&dir);
        let id = gw.create_session(&request()).await.unwrap();
        gw.transport().set_offline(true);
        for n in 1..=3 {
            assert_eq!(gw.submit(&id, payload(n)).await, Delivery::Queued);
        }
        gw.transport().set_offline(false);
        gw.transport().fail_next(1);

        let report = gw.replay_pending().await.unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.remaining, 1);
        let stored: Vec<u32> = gw
            .transport()
            .trials(&id)
            .iter()
            .map(|p| p.trial_number)
            .collect();
        assert_eq!(stored, [2, 3]);
        let left = gw.queue().load().await.unwrap();
        assert_eq!(left[0].payload.trial_number, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_session_records_are_queued() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&dir);
        assert_eq!(gw.submit("local-123", payload(1)).await, Delivery::Queued);
        assert_eq!(gw.stats().queued, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn local_session_is_created_on_replay() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&dir);
        gw.transport().set_offline(true);
        let local = gw.local_session(&request());
        assert!(local.starts_with("local-"));
        for n in 1..=3 {
            assert_eq!(gw.submit(&local, payload(n)).await, Delivery::Queued);
        }
        let queued = gw.queue().load().await.unwrap();
        assert!(queued.iter().all(|r| r.session.as_ref() == Some(&request())));

        // still offline: nothing created, nothing lost
        let report = gw.replay_pending().await.unwrap();
        assert_eq!(report.remaining, 3);
        assert_eq!(report.sessions_created, 0);

        gw.transport().set_offline(false);
        let report = gw.replay_pending().await.unwrap();
        assert_eq!(
            report,
            ReplayReport {
                attempted: 3,
                delivered: 3,
                remaining: 0,
                sessions_created: 1,
            }
        );
        assert_eq!(gw.transport().health().sessions, 1);
        assert_eq!(gw.transport().health().trials, 3);

        // later records of the same local session go straight to the remote one
        assert_eq!(gw.submit(&local, payload(4)).await, Delivery::Delivered);
        assert_eq!(gw.transport().health().sessions, 1);
        assert_eq!(gw.transport().health().trials, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn partly_replayed_local_session_keeps_its_remote_id() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&dir);
        gw.transport().set_offline(true);
        let local = gw.local_session(&request());
        for n in 1..=2 {
            assert_eq!(gw.submit(&local, payload(n)).await, Delivery::Queued);
        }
        gw.transport().set_offline(false);
        // session creation goes through, the first save does not
        gw.transport().fail_after(1, 1);
        let report = gw.replay_pending().await.unwrap();
        assert_eq!(report.sessions_created, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(report.remaining, 1);

        let left = gw.queue().load().await.unwrap();
        assert_ne!(left[0].session_id, local);
        assert_eq!(left[0].session, None);
        assert_eq!(left[0].payload.trial_number, 1);

        // a fresh process replays under the remote id without a second session
        let reopened = PersistenceGateway::new(
            gw.transport().clone(),
            LocalQueue::new(dir.path().join("pending.json")),
            RetryPolicy::default(),
        );
        let report = reopened.replay_pending().await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(report.sessions_created, 0);
        assert!(reopened.queue().is_empty().await.unwrap());
        assert_eq!(reopened.transport().health().sessions, 1);
        assert_eq!(reopened.transport().trials(&left[0].session_id).len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn session_calls_share_the_retry_policy() {
        let dir = tempfile::tempdir().unwrap();
        let gw = gateway(&dir);
        gw.transport().fail_next(3);
        assert!(gw.create_session(&request()).await.is_err());
        assert_eq!(gw.transport().calls(), 3);

        let id = gw.create_session(&request()).await.unwrap();
        gw.transport().fail_next(1);
        gw.complete_session(&id).await.unwrap();
    }
}
