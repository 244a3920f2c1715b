use image::RgbaImage;

const MAX_TILE: f64 = 48.0;

pub(crate) fn tile_size_for(level: f64) -> u32 {
    ((level * MAX_TILE).round() as u32).max(1)
}

/// Replaces every tile with its mean colour. Edge tiles may be partial.
pub(crate) fn pixelate(image: &mut RgbaImage, level: f64) {
    let (w, h) = image.dimensions();
    let size = tile_size_for(level);
    if size == 1 {
        return;
    }
    for ty in (0..h).step_by(size as usize) {
        for tx in (0..w).step_by(size as usize) {
            let x_end = (tx + size).min(w);
            let y_end = (ty + size).min(h);
            let count = ((x_end - tx) * (y_end - ty)) as u64;
            let mut sums = [0u64; 3];
            for y in ty..y_end {
                for x in tx..x_end {
                    let px = image.get_pixel(x, y).0;
                    for c in 0..3 {
                        sums[c] += px[c] as u64;
                    }
                }
            }
            let mean = sums.map(|s| ((s + count / 2) / count) as u8);
            for y in ty..y_end {
                for x in tx..x_end {
                    let px = image.get_pixel_mut(x, y);
                    px.0[..3].copy_from_slice(&mean);
                }
            }
        }
    }
}
