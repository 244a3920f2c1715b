use std::future::Future;
use std::path::PathBuf;

use gazex_experiment::{Presenter, Prompt, Screen, UserAction};
use tracing::{debug, warn};

use crate::frame::{FrameRenderer, FrameStats};

/// Rasterises every screen before handing it on to the wrapped presenter.
/// Frames can optionally be written out as numbered PNGs.
pub struct RenderingPresenter<P> {
    inner: P,
    renderer: FrameRenderer,
    frame_dir: Option<PathBuf>,
    frames: usize,
    last: Option<FrameStats>,
}

impl<P: Presenter> RenderingPresenter<P> {
    pub fn new(inner: P, renderer: FrameRenderer) -> Self {
        Self {
            inner,
            renderer,
            frame_dir: None,
            frames: 0,
            last: None,
        }
    }

    pub fn with_frame_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.frame_dir = Some(dir.into());
        self
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn renderer(&self) -> &FrameRenderer {
        &self.renderer
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn last_frame(&self) -> Option<FrameStats> {
        self.last
    }
}

impl<P: Presenter> Presenter for RenderingPresenter<P> {
    fn show(&mut self, screen: &Screen) {
        match self.renderer.render(screen) {
            Ok(stats) => {
                self.frames += 1;
                self.last = Some(stats);
                debug!(
                    screen = screen.name(),
                    dirty = stats.dirty_count,
                    total_us = stats.total.as_micros() as u64,
                    "frame rendered"
                );
                if let Some(dir) = &self.frame_dir {
                    let path = dir.join(format!("{:05}-{}.png", self.frames, screen.name()));
                    if let Err(err) = self.renderer.save_png(&path) {
                        warn!(path = %path.display(), error = %err, "frame not saved");
                    }
                }
            }
            Err(err) => warn!(screen = screen.name(), error = %err, "frame not rendered"),
        }
        self.inner.show(screen);
    }

    fn prompt(&mut self, prompt: Prompt) -> impl Future<Output = UserAction> + Send {
        self.inner.prompt(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazex_core::GazePoint;
    use gazex_experiment::LayoutConfig;

    #[derive(Default)]
    struct Recorder {
        shown: Vec<&'static str>,
        prompts: usize,
    }

    impl Presenter for Recorder {
        fn show(&mut self, screen: &Screen) {
            self.shown.push(screen.name());
        }

        async fn prompt(&mut self, _prompt: Prompt) -> UserAction {
            self.prompts += 1;
            UserAction::Recalibrate
        }
    }

    fn renderer() -> FrameRenderer {
        FrameRenderer::new(&LayoutConfig {
            screen_width: 160,
            screen_height: 90,
            image_width: 40,
            image_height: 30,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn screens_are_rendered_then_forwarded() {
        let mut p = RenderingPresenter::new(Recorder::default(), renderer());
        p.show(&Screen::Fixation {
            center: GazePoint::new(80.0, 45.0),
        });
        p.show(&Screen::Blank);
        assert_eq!(p.frames(), 2);
        assert_eq!(p.inner().shown, vec!["fixation", "blank"]);
        assert_eq!(p.last_frame().unwrap().dirty_count, 0);

        assert_eq!(p.prompt(Prompt::Instructions).await, UserAction::Recalibrate);
        assert_eq!(p.inner().prompts, 1);
    }

    #[test]
    fn frames_are_dumped_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = RenderingPresenter::new(Recorder::default(), renderer()).with_frame_dir(dir.path());
        p.show(&Screen::Welcome);
        p.show(&Screen::Camera);
        assert!(dir.path().join("00001-welcome.png").is_file());
        assert!(dir.path().join("00002-camera.png").is_file());
    }
}
