use std::future::Future;
use std::sync::Arc;

use gazex_core::{GazePoint, GazeSample};
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use crate::error::OracleError;

/// Contract of the external gaze estimator.
///
/// Push delivery goes to at most one listener; installing a new one replaces the
/// previous one.
pub trait GazeOracle: Send + Sync + 'static {
    fn initialize(&self) -> impl Future<Output = Result<(), OracleError>> + Send;
    fn current_prediction(&self) -> Option<GazePoint>;
    fn pause(&self);
    fn resume(&self);
    fn end(&self);
    fn set_listener(&self, listener: Option<mpsc::Sender<GazeSample>>);
}

/// Shared handle to the process-wide oracle.
#[derive(Debug)]
pub struct GazeAdapter<O> {
    oracle: Arc<O>,
    capacity: usize,
}

impl<O> Clone for GazeAdapter<O> {
    fn clone(&self) -> Self {
        Self {
            oracle: Arc::clone(&self.oracle),
            capacity: self.capacity,
        }
    }
}

impl<O: GazeOracle> GazeAdapter<O> {
    pub fn new(oracle: O, capacity: usize) -> Self {
        Self {
            oracle: Arc::new(oracle),
            capacity: capacity.max(1),
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub async fn initialize(&self) -> Result<(), OracleError> {
        self.oracle.initialize().await?;
        info!("gaze oracle initialised");
        Ok(())
    }

    /// Opens a fresh bounded stream, superseding any earlier subscriber.
    pub fn subscribe(&self) -> GazeStream {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.oracle.set_listener(Some(tx));
        debug!(capacity = self.capacity, "gaze listener registered");
        GazeStream { rx }
    }

    /// Detaches the current listener.
    pub fn release(&self) {
        self.oracle.set_listener(None);
    }

    pub fn current_prediction(&self) -> Option<GazePoint> {
        self.oracle.current_prediction()
    }

    pub fn pause(&self) {
        self.oracle.pause();
    }

    pub fn resume(&self) {
        self.oracle.resume();
    }

    pub fn end(&self) {
        self.release();
        self.oracle.end();
    }
}

/// Receiving end of a collection window.
#[derive(Debug)]
pub struct GazeStream {
    rx: mpsc::Receiver<GazeSample>,
}

impl GazeStream {
    /// Next sample, or `None` once `deadline` passes or the oracle goes away.
    pub async fn next_before(&mut self, deadline: Instant) -> Option<GazeSample> {
        timeout_at(deadline, self.rx.recv()).await.ok().flatten()
    }

    /// Everything delivered before `deadline`. Waits out the full window even if
    /// the oracle stops early.
    pub async fn collect_until(&mut self, deadline: Instant) -> Vec<GazeSample> {
        let mut out = Vec::new();
        while let Some(sample) = self.next_before(deadline).await {
            out.push(sample);
        }
        tokio::time::sleep_until(deadline).await;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{GazeTarget, SyntheticOracle};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn new_subscriber_supersedes_old_one() {
        let target = GazeTarget::new();
        target.look_at(GazePoint::new(100.0, 100.0));
        let adapter = GazeAdapter::new(SyntheticOracle::new(target, 30.0, 0.0, 1), 16);
        adapter.initialize().await.unwrap();

        let mut first = adapter.subscribe();
        let mut second = adapter.subscribe();
        let deadline = Instant::now() + Duration::from_millis(500);
        let got = second.collect_until(deadline).await;
        assert!(!got.is_empty());
        assert!(first.next_before(Instant::now()).await.is_none());
        adapter.end();
    }

    #[tokio::test(start_paused = true)]
    async fn released_stream_ends() {
        let target = GazeTarget::new();
        target.look_at(GazePoint::new(1.0, 1.0));
        let adapter = GazeAdapter::new(SyntheticOracle::new(target, 30.0, 0.0, 1), 4);
        adapter.initialize().await.unwrap();
        let mut stream = adapter.subscribe();
        adapter.release();
        let deadline = Instant::now() + Duration::from_millis(200);
        let start = Instant::now();
        let got = stream.collect_until(deadline).await;
        assert!(got.len() <= 4);
        assert!(start.elapsed() >= Duration::from_millis(200));
        adapter.end();
    }
}
