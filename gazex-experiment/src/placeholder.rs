//! Generated stand-in stimuli for development runs without an image set.

use gazex_core::AttentionClass;
use image::{Rgb, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const PLACEHOLDER_IMAGES_PER_CATEGORY: u32 = 5;

/// Category name, attention class and tint.
pub const PLACEHOLDER_CATEGORIES: [(&str, AttentionClass, Rgb<u8>); 7] = [
    ("erotica", AttentionClass::High, Rgb([255, 100, 150])),
    ("violence", AttentionClass::High, Rgb([200, 50, 50])),
    ("gore", AttentionClass::High, Rgb([150, 0, 0])),
    ("office-supplies", AttentionClass::Low, Rgb([150, 150, 150])),
    ("furniture", AttentionClass::Low, Rgb([139, 90, 60])),
    ("textures", AttentionClass::Low, Rgb([200, 200, 180])),
    ("noise", AttentionClass::Low, Rgb([128, 128, 128])),
];

const OUTLINE: f64 = 5.0;
const STRIPE: f64 = 3.0;
const STRIPE_SPACING: f64 = 50.0;

fn tint(category: &str) -> Rgb<u8> {
    PLACEHOLDER_CATEGORIES
        .iter()
        .find(|(name, _, _)| *name == category)
        .map_or(Rgb([128, 128, 128]), |(_, _, c)| *c)
}

/// Draws image `number` (1-based) of `category`.
///
/// A vertical gradient of the category tint with an outline shape picked by
/// `number % 3`; the `noise` category is seeded grey noise instead.
pub fn placeholder_image(category: &str, number: u32, width: u32, height: u32) -> RgbaImage {
    if category == "noise" {
        let mut rng = StdRng::seed_from_u64(u64::from(number));
        return RgbaImage::from_fn(width, height, |_, _| {
            let g: u8 = rng.random();
            Rgba([g, g, g, 255])
        });
    }

    let base = tint(category);
    let shape = Rgba([
        base[0].saturating_sub(50),
        base[1].saturating_sub(50),
        base[2].saturating_sub(50),
        255,
    ]);
    let (w, h) = (width as f64, height as f64);
    let on_shape: Box<dyn Fn(f64, f64) -> bool> = match number % 3 {
        0 => {
            let (cx, cy, rx, ry) = (w / 2.0, h / 2.0, w / 4.0, h / 4.0);
            Box::new(move |x, y| {
                let outer = ((x - cx) / rx).powi(2) + ((y - cy) / ry).powi(2);
                let inner = ((x - cx) / (rx - OUTLINE).max(1.0)).powi(2)
                    + ((y - cy) / (ry - OUTLINE).max(1.0)).powi(2);
                outer <= 1.0 && inner > 1.0
            })
        }
        1 => {
            let (x0, y0, x1, y1) = (w / 4.0, h / 4.0, 3.0 * w / 4.0, 3.0 * h / 4.0);
            Box::new(move |x, y| {
                let inside = x >= x0 && x <= x1 && y >= y0 && y <= y1;
                let near_edge = x - x0 < OUTLINE || x1 - x < OUTLINE || y - y0 < OUTLINE || y1 - y < OUTLINE;
                inside && near_edge
            })
        }
        _ => Box::new(move |x, y| {
            // stripes from (i, 0) to (i + h/2, h)
            let u = x - y / 2.0;
            let k = (u / STRIPE_SPACING).round();
            k >= 0.0 && k * STRIPE_SPACING < w && (u - k * STRIPE_SPACING).abs() <= STRIPE / 2.0
        }),
    };

    RgbaImage::from_fn(width, height, |x, y| {
        let (fx, fy) = (x as f64 + 0.5, y as f64 + 0.5);
        if on_shape(fx, fy) {
            return shape;
        }
        let factor = 0.7 + 0.3 * (y as f64 / h);
        Rgba([
            (base[0] as f64 * factor) as u8,
            (base[1] as f64 * factor) as u8,
            (base[2] as f64 * factor) as u8,
            255,
        ])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gradient_brightens_downwards() {
        let img = placeholder_image("gore", 1, 80, 60);
        assert_eq!(img.dimensions(), (80, 60));
        assert_eq!(img.get_pixel(1, 0).0, [105, 0, 0, 255]);
        assert!(img.get_pixel(1, 59)[0] > img.get_pixel(1, 0)[0]);
    }

    #[test]
    fn shape_depends_on_number() {
        let rect = placeholder_image("furniture", 1, 80, 60);
        // top-left corner of the outline
        assert_eq!(rect.get_pixel(21, 16).0, [89, 40, 10, 255]);
        let circle = placeholder_image("furniture", 3, 80, 60);
        assert_ne!(circle.get_pixel(21, 16).0, [89, 40, 10, 255]);
        assert_ne!(rect, circle);
    }

    #[test]
    fn noise_is_seeded_grey() {
        let a = placeholder_image("noise", 2, 16, 16);
        assert_eq!(a, placeholder_image("noise", 2, 16, 16));
        assert_ne!(a, placeholder_image("noise", 3, 16, 16));
        assert!(a.pixels().all(|p| p[0] == p[1] && p[1] == p[2] && p[3] == 255));
    }

    #[test]
    fn unknown_category_is_grey() {
        let img = placeholder_image("unlisted", 2, 8, 8);
        assert!(img.pixels().all(|p| p[0] == p[1] && p[1] == p[2]));
    }
}
