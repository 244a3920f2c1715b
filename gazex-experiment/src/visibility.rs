use gazex_gaze::{GazeAdapter, GazeOracle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

/// Pauses the oracle while the display is hidden and resumes it when it comes
/// back. Phase timers are not touched.
pub fn watch_visibility<O: GazeOracle>(
    gaze: GazeAdapter<O>,
    mut rx: watch::Receiver<Visibility>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = Visibility::Visible;
        loop {
            let now = *rx.borrow_and_update();
            if now != last {
                match now {
                    Visibility::Hidden => {
                        info!("display hidden, pausing gaze oracle");
                        gaze.pause();
                    }
                    Visibility::Visible => {
                        info!("display visible, resuming gaze oracle");
                        gaze.resume();
                    }
                }
                last = now;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazex_gaze::{GazeTarget, SyntheticOracle};

    #[tokio::test]
    async fn hidden_pauses_and_visible_resumes() {
        let adapter = GazeAdapter::new(SyntheticOracle::new(GazeTarget::new(), 30.0, 0.0, 1), 4);
        let (tx, rx) = watch::channel(Visibility::Visible);
        let task = watch_visibility(adapter.clone(), rx);

        tx.send(Visibility::Hidden).unwrap();
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if adapter.oracle().is_paused() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(adapter.oracle().is_paused());

        tx.send(Visibility::Visible).unwrap();
        for _ in 0..10 {
            if !adapter.oracle().is_paused() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!adapter.oracle().is_paused());

        drop(tx);
        task.await.unwrap();
    }
}
