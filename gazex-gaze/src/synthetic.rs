//! A simulated oracle that looks wherever it is told to, with uniform jitter.
//! Used for headless runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gazex_core::{GazePoint, GazeSample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::error::OracleError;
use crate::oracle::GazeOracle;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where the simulated participant is looking. `None` means no face in view.
#[derive(Debug, Clone, Default)]
pub struct GazeTarget(Arc<Mutex<Option<GazePoint>>>);

impl GazeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn look_at(&self, point: GazePoint) {
        *lock(&self.0) = Some(point);
    }

    pub fn look_away(&self) {
        *lock(&self.0) = None;
    }

    pub fn get(&self) -> Option<GazePoint> {
        *lock(&self.0)
    }
}

#[derive(Debug, Default)]
struct Shared {
    listener: Mutex<Option<mpsc::Sender<GazeSample>>>,
    latest: Mutex<Option<GazePoint>>,
    paused: AtomicBool,
    ended: AtomicBool,
}

#[derive(Debug)]
pub struct SyntheticOracle {
    target: GazeTarget,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    rate_hz: f64,
    jitter_px: f64,
    seed: u64,
    init_failure: Option<OracleError>,
}

impl SyntheticOracle {
    pub fn new(target: GazeTarget, rate_hz: f64, jitter_px: f64, seed: u64) -> Self {
        Self {
            target,
            shared: Arc::new(Shared::default()),
            task: Mutex::new(None),
            rate_hz: rate_hz.max(1.0),
            jitter_px: jitter_px.max(0.0),
            seed,
            init_failure: None,
        }
    }

    /// Makes `initialize` fail, as a denied camera permission would.
    pub fn failing(mut self, err: OracleError) -> Self {
        self.init_failure = Some(err);
        self
    }

    pub fn target(&self) -> &GazeTarget {
        &self.target
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    fn spawn(&self) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        let target = self.target.clone();
        let period = Duration::from_secs_f64(1.0 / self.rate_hz);
        let jitter = self.jitter_px;
        let mut rng = StdRng::seed_from_u64(self.seed);

        tokio::spawn(async move {
            let origin = Instant::now();
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if shared.ended.load(Ordering::SeqCst) {
                    break;
                }
                if shared.paused.load(Ordering::SeqCst) {
                    continue;
                }
                let Some(point) = target.get() else {
                    *lock(&shared.latest) = None;
                    continue;
                };
                let mut offset = || {
                    if jitter > 0.0 {
                        rng.random_range(-jitter..=jitter)
                    } else {
                        0.0
                    }
                };
                let noisy = GazePoint::new(point.x + offset(), point.y + offset());
                *lock(&shared.latest) = Some(noisy);

                let sample = GazeSample {
                    point: noisy,
                    timestamp_ms: origin.elapsed().as_secs_f64() * 1000.0,
                };
                let listener = lock(&shared.listener).clone();
                if let Some(tx) = listener {
                    if tx.send(sample).await.is_err() {
                        let mut slot = lock(&shared.listener);
                        if slot.as_ref().is_some_and(|cur| cur.same_channel(&tx)) {
                            *slot = None;
                        }
                    }
                }
            }
            debug!("synthetic oracle stopped");
        })
    }
}

impl GazeOracle for SyntheticOracle {
    async fn initialize(&self) -> Result<(), OracleError> {
        if let Some(err) = &self.init_failure {
            warn!(error = %err, "synthetic oracle refusing to start");
            return Err(err.clone());
        }
        let mut task = lock(&self.task);
        if task.is_none() {
            self.shared.ended.store(false, Ordering::SeqCst);
            *task = Some(self.spawn());
        }
        Ok(())
    }

    fn current_prediction(&self) -> Option<GazePoint> {
        *lock(&self.shared.latest)
    }

    fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    fn end(&self) {
        self.shared.ended.store(true, Ordering::SeqCst);
        *lock(&self.shared.listener) = None;
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }

    fn set_listener(&self, listener: Option<mpsc::Sender<GazeSample>>) {
        *lock(&self.shared.listener) = listener;
    }
}

impl Drop for SyntheticOracle {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }
}
