use image::RgbaImage;
use rand::Rng;

/// Segment edge length: 64px at the lowest levels down to 8px at level 1.
pub(crate) fn segment_size_for(level: f64) -> u32 {
    (8.0 + 56.0 * (1.0 - level)).round() as u32
}

pub(crate) fn rotate_segments<R: Rng + ?Sized>(image: &mut RgbaImage, level: f64, rng: &mut R) {
    let (w, h) = image.dimensions();
    let size = segment_size_for(level).min(w).min(h);
    if size < 2 {
        return;
    }
    let mut scratch = vec![[0u8; 4]; (size * size) as usize];
    for sy in 0..h / size {
        for sx in 0..w / size {
            if !rng.random_bool(level) {
                continue;
            }
            let quarter_turns = rng.random_range(1..=3u8);
            rotate_square(image, sx * size, sy * size, size, quarter_turns, &mut scratch);
        }
    }
}

/// Rotates the `size`×`size` square at (x0, y0) clockwise by `quarter_turns` × 90°.
fn rotate_square(
    image: &mut RgbaImage,
    x0: u32,
    y0: u32,
    size: u32,
    quarter_turns: u8,
    scratch: &mut [[u8; 4]],
) {
    let s = size;
    for y in 0..s {
        for x in 0..s {
            scratch[(y * s + x) as usize] = image.get_pixel(x0 + x, y0 + y).0;
        }
    }
    let last = s - 1;
    for y in 0..s {
        for x in 0..s {
            let (src_x, src_y) = match quarter_turns % 4 {
                1 => (y, last - x),
                2 => (last - x, last - y),
                3 => (last - y, x),
                _ => (x, y),
            };
            image.get_pixel_mut(x0 + x, y0 + y).0 = scratch[(src_y * s + src_x) as usize];
        }
    }
}
