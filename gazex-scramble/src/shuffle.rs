use image::RgbaImage;
use rand::Rng;
use rand::seq::{SliceRandom, index};

/// Block edge length for a level. Higher levels cut finer blocks.
pub fn block_size_for(level: f64) -> u32 {
    if level <= 0.25 {
        64
    } else if level <= 0.5 {
        32
    } else if level <= 0.75 {
        16
    } else {
        8
    }
}

/// Picks `round(level * n)` distinct units in random order. A lone pick has
/// nowhere to go, so it becomes two whenever there are two to choose from.
fn pick<R: Rng + ?Sized>(n: usize, level: f64, rng: &mut R) -> Vec<usize> {
    let k = match ((level * n as f64).round() as usize).min(n) {
        1 if n >= 2 => 2,
        k => k,
    };
    let mut picked = index::sample(rng, n, k).into_vec();
    picked.shuffle(rng);
    picked
}

/// Swapping the first unit with each of the others in turn walks a single cycle
/// through all of them, so every picked unit ends up somewhere else.
fn cycle(picked: &[usize], mut swap: impl FnMut(usize, usize)) {
    if let Some((&anchor, rest)) = picked.split_first() {
        for &other in rest {
            swap(anchor, other);
        }
    }
}

fn swap_pixels(buf: &mut [u8], a: usize, b: usize) {
    for c in 0..4 {
        buf.swap(a * 4 + c, b * 4 + c);
    }
}

pub(crate) fn pixel<R: Rng + ?Sized>(image: &mut RgbaImage, level: f64, rng: &mut R) {
    let n = (image.width() * image.height()) as usize;
    let picked = pick(n, level, rng);
    let buf: &mut [u8] = image;
    cycle(&picked, |a, b| swap_pixels(buf, a, b));
}

pub(crate) fn block<R: Rng + ?Sized>(image: &mut RgbaImage, level: f64, rng: &mut R) {
    let (w, h) = image.dimensions();
    let size = block_size_for(level).min(w).min(h);
    if size == 0 {
        return;
    }
    // Only full blocks take part; a ragged right/bottom strip stays in place.
    let cols = w / size;
    let rows = h / size;
    let picked = pick((cols * rows) as usize, level, rng);
    let width = w as usize;
    let size = size as usize;
    let cols = cols as usize;
    let origin = |block: usize| ((block % cols) * size, (block / cols) * size);

    let buf: &mut [u8] = image;
    cycle(&picked, |a, b| {
        let (ax, ay) = origin(a);
        let (bx, by) = origin(b);
        for dy in 0..size {
            for dx in 0..size {
                let pa = (ay + dy) * width + ax + dx;
                let pb = (by + dy) * width + bx + dx;
                swap_pixels(buf, pa, pb);
            }
        }
    });
}
