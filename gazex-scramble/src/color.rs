use image::RgbaImage;
use rand::Rng;
use std::f64::consts::TAU;

use crate::luma;

/// Chroma radius in YCbCr, as a fraction of the full ±127.5 range.
const SATURATION: f64 = 0.5;

/// BT.601 full-range YCbCr → RGB.
fn ycbcr_to_rgb(y: f64, cb: f64, cr: f64) -> [u8; 3] {
    let r = y + 1.402 * cr;
    let g = y - 0.344_136 * cb - 0.714_136 * cr;
    let b = y + 1.772 * cb;
    [r, g, b].map(|v| v.round().clamp(0.0, 255.0) as u8)
}

/// Keeps each chosen pixel's luma, swaps its chroma for a random hue.
pub(crate) fn randomize_chroma<R: Rng + ?Sized>(image: &mut RgbaImage, level: f64, rng: &mut R) {
    let radius = SATURATION * 127.5;
    for px in image.pixels_mut() {
        if !rng.random_bool(level) {
            continue;
        }
        let [r, g, b, _] = px.0;
        let y = luma(r, g, b);
        let hue = rng.random_range(0.0..TAU);
        let rgb = ycbcr_to_rgb(y, radius * hue.cos(), radius * hue.sin());
        px.0[..3].copy_from_slice(&rgb);
    }
}
