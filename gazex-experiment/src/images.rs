use std::path::PathBuf;
use std::sync::Arc;

use gazex_core::{ImageDescriptor, ScrambleSpec};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::config::StimuliConfig;
use crate::error::ImageError;
use crate::placeholder::placeholder_image;

/// Decodes stimulus images. Called from the blocking pool.
pub trait ImageSource: Send + Sync + 'static {
    fn load(&self, image: &ImageDescriptor) -> Result<RgbaImage, ImageError>;
}

/// Image number encoded in a placeholder-style path (`images/<category>/<n>.jpg`).
fn image_number(path: &str) -> u32 {
    std::path::Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
}

/// Reads files below a root directory, optionally substituting placeholders for
/// anything that fails to decode.
#[derive(Debug, Clone)]
pub struct FileImageSource {
    root: PathBuf,
    placeholders: bool,
    placeholder_size: (u32, u32),
}

impl FileImageSource {
    pub fn new(config: &StimuliConfig) -> Self {
        Self {
            root: config.image_root.clone(),
            placeholders: config.placeholders,
            placeholder_size: (config.placeholder_width, config.placeholder_height),
        }
    }
}

impl ImageSource for FileImageSource {
    fn load(&self, image: &ImageDescriptor) -> Result<RgbaImage, ImageError> {
        let path = self.root.join(&image.path);
        match image::open(&path) {
            Ok(decoded) => Ok(decoded.to_rgba8()),
            Err(source) if self.placeholders => {
                debug!(path = %path.display(), error = %source, "using placeholder image");
                let (w, h) = self.placeholder_size;
                Ok(placeholder_image(&image.category, image_number(&image.path), w, h))
            }
            Err(source) => Err(ImageError::Decode { path, source }),
        }
    }
}

/// Generates every image; never touches the filesystem.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderSource {
    pub width: u32,
    pub height: u32,
}

impl ImageSource for PlaceholderSource {
    fn load(&self, image: &ImageDescriptor) -> Result<RgbaImage, ImageError> {
        Ok(placeholder_image(
            &image.category,
            image_number(&image.path),
            self.width,
            self.height,
        ))
    }
}

/// Loads and scrambles one image on the blocking pool.
async fn prepare<S: ImageSource>(
    source: Arc<S>,
    image: ImageDescriptor,
    spec: ScrambleSpec,
    seed: u64,
) -> Result<Arc<RgbaImage>, ImageError> {
    tokio::task::spawn_blocking(move || -> Result<Arc<RgbaImage>, ImageError> {
        let raw = source.load(&image)?;
        Ok(Arc::new(gazex_scramble::scramble_seeded(&raw, spec, seed)))
    })
    .await
    .map_err(|err| ImageError::Worker(err.to_string()))?
}

/// Prepares both stimuli concurrently. The right image uses `seed + 1` so the
/// two transforms differ while staying reproducible from the trial's seed.
pub async fn prepare_pair<S: ImageSource>(
    source: &Arc<S>,
    left: &ImageDescriptor,
    right: &ImageDescriptor,
    spec: ScrambleSpec,
    seed: u64,
) -> Result<(Arc<RgbaImage>, Arc<RgbaImage>), ImageError> {
    let result = tokio::try_join!(
        prepare(Arc::clone(source), left.clone(), spec, seed),
        prepare(Arc::clone(source), right.clone(), spec, seed.wrapping_add(1)),
    );
    if let Err(err) = &result {
        warn!(left = %left.path, right = %right.path, error = %err, "stimulus preparation failed");
    }
    result
}
