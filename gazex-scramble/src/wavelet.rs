use image::RgbaImage;
use rand::Rng;

use crate::{channel_planes, write_planes};

/// One Haar level along rows, then along columns, over the even-sized top-left
/// area. Averages land in the first half of each axis, differences in the second.
fn haar_forward(data: &mut [f64], width: usize, hw: usize, hh: usize) {
    let mut tmp = vec![0.0; 2 * hw.max(hh)];
    for y in 0..2 * hh {
        let row = &mut data[y * width..y * width + 2 * hw];
        for i in 0..hw {
            tmp[i] = (row[2 * i] + row[2 * i + 1]) / 2.0;
            tmp[hw + i] = (row[2 * i] - row[2 * i + 1]) / 2.0;
        }
        row.copy_from_slice(&tmp[..2 * hw]);
    }
    for x in 0..2 * hw {
        for i in 0..hh {
            let a = data[2 * i * width + x];
            let b = data[(2 * i + 1) * width + x];
            tmp[i] = (a + b) / 2.0;
            tmp[hh + i] = (a - b) / 2.0;
        }
        for y in 0..2 * hh {
            data[y * width + x] = tmp[y];
        }
    }
}

fn haar_inverse(data: &mut [f64], width: usize, hw: usize, hh: usize) {
    let mut tmp = vec![0.0; 2 * hw.max(hh)];
    for x in 0..2 * hw {
        for i in 0..hh {
            let a = data[i * width + x];
            let d = data[(hh + i) * width + x];
            tmp[2 * i] = a + d;
            tmp[2 * i + 1] = a - d;
        }
        for y in 0..2 * hh {
            data[y * width + x] = tmp[y];
        }
    }
    for y in 0..2 * hh {
        let row = &mut data[y * width..y * width + 2 * hw];
        for i in 0..hw {
            tmp[2 * i] = row[i] + row[hw + i];
            tmp[2 * i + 1] = row[i] - row[hw + i];
        }
        row.copy_from_slice(&tmp[..2 * hw]);
    }
}

/// Each detail coefficient outside the low-frequency quarter is replaced with
/// probability `level` by a coefficient drawn from anywhere in the transform.
pub(crate) fn scramble_plane<R: Rng + ?Sized>(
    plane: &mut [f64],
    width: usize,
    height: usize,
    level: f64,
    rng: &mut R,
) {
    let (hw, hh) = (width / 2, height / 2);
    if hw == 0 || hh == 0 {
        return;
    }
    haar_forward(plane, width, hw, hh);

    let coeff = |i: usize| (i / (2 * hw)) * width + i % (2 * hw);
    let total = 4 * hw * hh;
    let snapshot: Vec<f64> = (0..total).map(|i| plane[coeff(i)]).collect();
    for y in 0..2 * hh {
        for x in 0..2 * hw {
            if (x < hw && y < hh) || !rng.random_bool(level) {
                continue;
            }
            plane[y * width + x] = snapshot[rng.random_range(0..total)];
        }
    }

    haar_inverse(plane, width, hw, hh);
}

pub(crate) fn shuffle_details<R: Rng + ?Sized>(image: &mut RgbaImage, level: f64, rng: &mut R) {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let mut planes = channel_planes(image);
    for plane in planes.iter_mut() {
        scramble_plane(plane, w, h, level, rng);
    }
    write_planes(image, &planes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_images::gradient;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn haar_round_trip_is_exact() {
        let (w, h) = (9, 6);
        let original: Vec<f64> = (0..w * h).map(|i| ((i * 53) % 256) as f64).collect();
        let mut data = original.clone();
        haar_forward(&mut data, w, 4, 3);
        assert_ne!(data, original);
        haar_inverse(&mut data, w, 4, 3);
        assert_eq!(data, original);
    }

    #[test]
    fn constant_block_has_zero_details() {
        let (w, h) = (4, 4);
        let mut data = vec![10.0; w * h];
        haar_forward(&mut data, w, 2, 2);
        for y in 0..4 {
            for x in 0..4 {
                let expect = if x < 2 && y < 2 { 10.0 } else { 0.0 };
                assert_eq!(data[y * w + x], expect);
            }
        }
    }

    #[test]
    fn odd_trailing_column_and_alpha_untouched() {
        let img = gradient(33, 21);
        let mut out = img.clone();
        shuffle_details(&mut out, 1.0, &mut StdRng::seed_from_u64(17));
        for y in 0..21 {
            assert_eq!(img.get_pixel(32, y), out.get_pixel(32, y));
        }
        for x in 0..33 {
            assert_eq!(img.get_pixel(x, 20), out.get_pixel(x, 20));
        }
        for (a, b) in img.pixels().zip(out.pixels()) {
            assert_eq!(a.0[3], b.0[3]);
        }
    }
}
