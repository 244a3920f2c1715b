use image::RgbaImage;
use rand::Rng;
use rustfft::{FftPlanner, num_complex::Complex};
use std::f64::consts::PI;

use crate::{channel_planes, write_planes};

fn fft_2d(data: &mut [Complex<f64>], width: usize, height: usize, inverse: bool) {
    let mut planner = FftPlanner::new();
    let (row_fft, col_fft) = if inverse {
        (planner.plan_fft_inverse(width), planner.plan_fft_inverse(height))
    } else {
        (planner.plan_fft_forward(width), planner.plan_fft_forward(height))
    };

    // Rows are contiguous, so one call covers all of them.
    row_fft.process(data);

    let mut column = vec![Complex::new(0.0, 0.0); height];
    for x in 0..width {
        for y in 0..height {
            column[y] = data[y * width + x];
        }
        col_fft.process(&mut column);
        for y in 0..height {
            data[y * width + x] = column[y];
        }
    }
}

fn forward(plane: &[f64], width: usize, height: usize) -> Vec<Complex<f64>> {
    let mut data: Vec<Complex<f64>> = plane.iter().map(|&v| Complex::new(v, 0.0)).collect();
    fft_2d(&mut data, width, height, false);
    data
}

/// Magnitude of every 2-D DFT coefficient of a plane.
pub fn amplitude_spectrum(plane: &[f64], width: usize, height: usize) -> Vec<f64> {
    forward(plane, width, height).iter().map(|c| c.norm()).collect()
}

/// Randomises the phase of each coefficient with probability `level`, keeping its
/// magnitude. Coefficients are handled together with their conjugate partner so the
/// inverse stays real; self-conjugate ones can only flip sign. DC is never touched.
pub fn phase_scramble_plane<R: Rng + ?Sized>(
    plane: &[f64],
    width: usize,
    height: usize,
    level: f64,
    rng: &mut R,
) -> Vec<f64> {
    let n = width * height;
    if n == 0 {
        return Vec::new();
    }
    let mut spectrum = forward(plane, width, height);

    for v in 0..height {
        for u in 0..width {
            let idx = v * width + u;
            let partner = ((height - v) % height) * width + (width - u) % width;
            if idx == 0 || partner < idx || !rng.random_bool(level) {
                continue;
            }
            let c = spectrum[idx];
            if partner == idx {
                if rng.random_bool(0.5) {
                    spectrum[idx] = -c;
                }
                continue;
            }
            let phi = rng.random_range(-PI..PI);
            let rotated = Complex::from_polar(c.norm(), phi);
            spectrum[idx] = rotated;
            spectrum[partner] = rotated.conj();
        }
    }

    fft_2d(&mut spectrum, width, height, true);
    let scale = 1.0 / n as f64;
    spectrum.iter().map(|c| c.re * scale).collect()
}

pub(crate) fn phase<R: Rng + ?Sized>(image: &mut RgbaImage, level: f64, rng: &mut R) {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let planes = channel_planes(image).map(|p| phase_scramble_plane(&p, w, h, level, rng));
    write_planes(image, &planes);
}
