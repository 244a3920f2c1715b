use image::RgbaImage;
use rand::Rng;

use crate::luma;

/// Sobel magnitude at or above this marks an edge pixel.
pub(crate) const EDGE_THRESHOLD: f64 = 48.0;

/// Sobel gradient magnitude of the luma plane, borders clamped.
pub(crate) fn gradient_magnitude(image: &RgbaImage) -> Vec<f64> {
    let (w, h) = image.dimensions();
    let (w, h) = (w as i64, h as i64);
    let lum: Vec<f64> = image
        .pixels()
        .map(|p| luma(p.0[0], p.0[1], p.0[2]))
        .collect();
    let at = |x: i64, y: i64| {
        let x = x.clamp(0, w - 1);
        let y = y.clamp(0, h - 1);
        lum[(y * w + x) as usize]
    };

    let mut out = Vec::with_capacity(lum.len());
    for y in 0..h {
        for x in 0..w {
            let gx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
            out.push(gx.hypot(gy));
        }
    }
    out
}

/// Swaps RGB between random pairs of flat (non-edge) pixels.
pub(crate) fn swap_flat_regions<R: Rng + ?Sized>(image: &mut RgbaImage, level: f64, rng: &mut R) {
    let pool: Vec<usize> = gradient_magnitude(image)
        .iter()
        .enumerate()
        .filter(|(_, m)| **m < EDGE_THRESHOLD)
        .map(|(i, _)| i)
        .collect();
    if pool.len() < 2 {
        return;
    }
    let swaps = (level * pool.len() as f64 / 2.0).round() as usize;
    let buf: &mut [u8] = image;
    for _ in 0..swaps {
        let a = pool[rng.random_range(0..pool.len())];
        let b = pool[rng.random_range(0..pool.len())];
        for c in 0..3 {
            buf.swap(a * 4 + c, b * 4 + c);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_images::split;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn hard_edge_is_detected() {
        let img = split(32, 16);
        let mag = gradient_magnitude(&img);
        let w = 32usize;
        assert!(mag[8 * w + 15] >= EDGE_THRESHOLD);
        assert!(mag[8 * w + 16] >= EDGE_THRESHOLD);
        assert!(mag[8 * w + 4] < EDGE_THRESHOLD);
    }

    #[test]
    fn edge_pixels_and_alpha_survive() {
        let img = split(32, 16);
        let mut out = img.clone();
        swap_flat_regions(&mut out, 1.0, &mut StdRng::seed_from_u64(12));
        let mag = gradient_magnitude(&img);
        for (i, (a, b)) in img.pixels().zip(out.pixels()).enumerate() {
            assert_eq!(a.0[3], b.0[3]);
            if mag[i] >= EDGE_THRESHOLD {
                assert_eq!(a, b, "edge pixel {i} moved");
            }
        }
        assert_ne!(img, out);
    }
}
