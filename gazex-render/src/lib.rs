//! Software rasterisation of experiment screens into an RGBA canvas.

pub mod frame;
pub mod presenter;

pub use frame::{FrameRenderer, FrameStats};
pub use presenter::RenderingPresenter;
