//! Pixel scrambling transforms for the stimulus images.
//!
//! Every transform takes an RGBA buffer and returns a new buffer of the same
//! dimensions. A level of 0 is always the identity.

mod color;
mod edge;
mod mosaic;
mod rotation;
mod shuffle;
mod spectral;
mod wavelet;

use gazex_core::{ScrambleMethod, ScrambleSpec};
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::debug;

pub use spectral::{amplitude_spectrum, phase_scramble_plane};
pub use shuffle::block_size_for;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScrambleError {
    #[error("buffer of {len} bytes does not hold a {width}x{height} RGBA image")]
    BufferSize { width: u32, height: u32, len: usize },
}

/// Applies `spec` to `image` using `rng` for every random decision.
pub fn scramble<R: Rng + ?Sized>(image: &RgbaImage, spec: ScrambleSpec, rng: &mut R) -> RgbaImage {
    let level = if spec.level.is_nan() {
        0.0
    } else {
        spec.level.clamp(0.0, 1.0)
    };
    let (w, h) = image.dimensions();
    if level <= 0.0 || w == 0 || h == 0 {
        return image.clone();
    }

    debug!(method = %spec.method, level, width = w, height = h, "scrambling image");
    let mut out = image.clone();
    match spec.method {
        ScrambleMethod::Block => shuffle::block(&mut out, level, rng),
        ScrambleMethod::Pixel => shuffle::pixel(&mut out, level, rng),
        ScrambleMethod::Rotation => rotation::rotate_segments(&mut out, level, rng),
        ScrambleMethod::Mosaic => mosaic::pixelate(&mut out, level),
        ScrambleMethod::Edge => edge::swap_flat_regions(&mut out, level, rng),
        ScrambleMethod::Color => color::randomize_chroma(&mut out, level, rng),
        ScrambleMethod::Phase => spectral::phase(&mut out, level, rng),
        ScrambleMethod::Wavelet => wavelet::shuffle_details(&mut out, level, rng),
    }
    out
}

/// Same as [`scramble`] with a seeded generator, so a trial can be reproduced
/// from its recorded seed.
pub fn scramble_seeded(image: &RgbaImage, spec: ScrambleSpec, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    scramble(image, spec, &mut rng)
}

/// Scrambles an interleaved RGBA byte buffer of the given dimensions.
pub fn scramble_raw(
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    spec: ScrambleSpec,
    seed: u64,
) -> Result<Vec<u8>, ScrambleError> {
    let len = rgba.len();
    let image = RgbaImage::from_raw(width, height, rgba).ok_or(ScrambleError::BufferSize {
        width,
        height,
        len,
    })?;
    Ok(scramble_seeded(&image, spec, seed).into_raw())
}

/// Splits an interleaved RGBA buffer into one `f64` plane per colour channel.
pub(crate) fn channel_planes(image: &RgbaImage) -> [Vec<f64>; 3] {
    let n = (image.width() * image.height()) as usize;
    let mut planes = [
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    ];
    for px in image.pixels() {
        for (c, plane) in planes.iter_mut().enumerate() {
            plane.push(px.0[c] as f64);
        }
    }
    planes
}

/// Writes planes back, rounding and clamping. Alpha is left as is.
pub(crate) fn write_planes(image: &mut RgbaImage, planes: &[Vec<f64>; 3]) {
    for (i, px) in image.pixels_mut().enumerate() {
        for (c, plane) in planes.iter().enumerate() {
            px.0[c] = plane[i].round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Rec. 601 luma.
pub(crate) fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{Rgba, RgbaImage};

    /// Every pixel distinct, alpha varying too.
    pub fn gradient(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            Rgba([
                (x * 255 / w.max(1)) as u8,
                (y * 255 / h.max(1)) as u8,
                ((x * 7 + y * 13) % 256) as u8,
                (200 + (x + y) % 56) as u8,
            ])
        })
    }

    /// Smooth image with a hard vertical edge in the middle.
    pub fn split(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if x < w / 2 {
                Rgba([20 + (y % 8) as u8, 30, 40 + (x % 8) as u8, 255])
            } else {
                Rgba([220 - (y % 8) as u8, 210, 200 - (x % 8) as u8, 255])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_images::gradient;

    #[test]
    fn level_zero_is_identity_for_every_method() {
        let img = gradient(48, 40);
        for method in ScrambleMethod::ALL {
            let out = scramble_seeded(&img, ScrambleSpec::new(method, 0.0), 7);
            assert_eq!(out, img, "{method} changed the image at level 0");
        }
    }

    #[test]
    fn dimensions_are_preserved() {
        let img = gradient(67, 45);
        for method in ScrambleMethod::ALL {
            for level in [0.1, 0.5, 1.0] {
                let out = scramble_seeded(&img, ScrambleSpec::new(method, level), 11);
                assert_eq!(out.dimensions(), img.dimensions(), "{method} at {level}");
            }
        }
    }

    #[test]
    fn full_level_changes_the_image() {
        let img = gradient(64, 64);
        for method in ScrambleMethod::ALL {
            let out = scramble_seeded(&img, ScrambleSpec::new(method, 1.0), 3);
            assert_ne!(out, img, "{method} left the image untouched at level 1");
        }
    }

    #[test]
    fn same_seed_same_output() {
        let img = gradient(32, 32);
        for method in ScrambleMethod::ALL {
            let spec = ScrambleSpec::new(method, 0.6);
            assert_eq!(scramble_seeded(&img, spec, 99), scramble_seeded(&img, spec, 99));
        }
    }

    #[test]
    fn out_of_range_level_is_clamped() {
        let img = gradient(16, 16);
        let spec = ScrambleSpec {
            method: ScrambleMethod::Pixel,
            level: -3.0,
        };
        assert_eq!(scramble_seeded(&img, spec, 1), img);
    }

    #[test]
    fn raw_buffer_must_match_dimensions() {
        let spec = ScrambleSpec::new(ScrambleMethod::Mosaic, 0.5);
        let err = scramble_raw(4, 4, vec![0; 10], spec, 1).unwrap_err();
        assert_eq!(
            err,
            ScrambleError::BufferSize {
                width: 4,
                height: 4,
                len: 10
            }
        );
        let img = gradient(8, 8);
        let out = scramble_raw(8, 8, img.clone().into_raw(), spec, 1).unwrap();
        assert_eq!(out, scramble_seeded(&img, spec, 1).into_raw());
    }

    #[test]
    fn empty_image_passes_through() {
        let img = RgbaImage::new(0, 0);
        let out = scramble_seeded(&img, ScrambleSpec::new(ScrambleMethod::Phase, 1.0), 1);
        assert_eq!(out.dimensions(), (0, 0));
    }
}
