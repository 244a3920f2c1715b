use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use gazex_core::{GazePoint, Region};
use gazex_experiment::{LayoutConfig, Screen};
use image::RgbaImage;
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];
const GREY: [u8; 4] = [110, 110, 110, 255];
const RED: [u8; 4] = [220, 40, 40, 255];
const GREEN: [u8; 4] = [40, 200, 80, 255];

#[repr(usize)]
#[derive(Debug, Clone, Copy)]
enum CacheIndex {
    FixationCross = 0,
    CalibrationDot = 1,
    ValidationDot = 2,
}

impl CacheIndex {
    const COUNT: usize = 3;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub total: Duration,
    pub dirty_count: usize,
}

fn solid(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.anti_alias = false;
    paint.set_color(Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]));
    paint
}

/// Porter-Duff over with a premultiplied source.
#[inline]
fn blend_over(dst: &mut [u8], src: [u8; 4]) {
    let inv = 255 - src[3] as u32;
    for c in 0..4 {
        dst[c] = (src[c] as u32 + (dst[c] as u32 * inv + 127) / 255) as u8;
    }
}

#[inline]
fn premultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let m = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
    [m(r), m(g), m(b), a]
}

fn cache_fixation() -> Result<Pixmap> {
    let size = 40u32;
    let mut pm = Pixmap::new(size, size).context("fixation pixmap")?;
    let paint = solid(WHITE);
    let s = size as f32;

    let h = Rect::from_xywh(0.0, (s - 2.0) * 0.5, s, 2.0).context("fixation bar")?;
    pm.fill_rect(h, &paint, Transform::identity(), None);
    let v = Rect::from_xywh((s - 2.0) * 0.5, 0.0, 2.0, s).context("fixation bar")?;
    pm.fill_rect(v, &paint, Transform::identity(), None);
    Ok(pm)
}

/// Filled disc with a white core.
fn cache_dot(radius: f32, rgba: [u8; 4]) -> Result<Pixmap> {
    let size = (radius * 2.0).ceil() as u32;
    let mut pm = Pixmap::new(size, size).context("dot pixmap")?;
    let mut paint = solid(rgba);
    paint.anti_alias = true;

    let outer = PathBuilder::from_circle(radius, radius, radius).context("dot outline")?;
    pm.fill_path(&outer, &paint, FillRule::Winding, Transform::identity(), None);
    let core = PathBuilder::from_circle(radius, radius, radius * 0.3).context("dot core")?;
    pm.fill_path(&core, &solid(WHITE), FillRule::Winding, Transform::identity(), None);
    Ok(pm)
}

fn position(p: &GazePoint) -> (f32, f32) {
    (p.x as f32, p.y as f32)
}

/// Draws [`Screen`]s into an opaque, premultiplied canvas. Only regions touched
/// by the previous frame are cleared before the next one is drawn.
pub struct FrameRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    regions: (Region, Region),

    static_cache: Vec<Pixmap>,

    canvas: Pixmap,
    dirty_regions: Vec<Rect>,
    first_frame: bool,
}

impl FrameRenderer {
    pub fn new(layout: &LayoutConfig) -> Result<Self> {
        let (width, height) = (layout.screen_width, layout.screen_height);
        let mut canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("invalid canvas size {width}x{height}"))?;
        canvas.fill(Color::from_rgba8(0, 0, 0, 255));

        let mut static_cache = Vec::with_capacity(CacheIndex::COUNT);
        static_cache.push(cache_fixation()?);
        static_cache.push(cache_dot(14.0, RED)?);
        static_cache.push(cache_dot(14.0, GREEN)?);

        Ok(Self {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            regions: layout.regions(),
            static_cache,
            canvas,
            dirty_regions: Vec::with_capacity(16),
            first_frame: true,
        })
    }

    pub fn resize(&mut self, layout: &LayoutConfig) -> Result<()> {
        let (width, height) = (layout.screen_width, layout.screen_height);
        self.canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("invalid canvas size {width}x{height}"))?;
        self.width = width;
        self.height = height;
        self.center = (width as f32 / 2.0, height as f32 / 2.0);
        self.regions = layout.regions();
        self.first_frame = true;
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    /// Premultiplied RGBA at a canvas position.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.canvas
            .pixel(x, y)
            .map(|p| [p.red(), p.green(), p.blue(), p.alpha()])
    }

    pub fn render(&mut self, screen: &Screen) -> Result<FrameStats> {
        let start = Instant::now();
        if self.first_frame {
            self.first_frame = false;
            self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));
            self.dirty_regions.clear();
        }

        let old_dirty = std::mem::take(&mut self.dirty_regions);
        self.clear_dirty(&old_dirty);
        let clear = start.elapsed();

        let t = Instant::now();
        self.draw(screen)?;
        Self::coalesce_dirty(&mut self.dirty_regions);
        let draw = t.elapsed();

        Ok(FrameStats {
            clear,
            draw,
            total: start.elapsed(),
            dirty_count: self.dirty_regions.len(),
        })
    }

    fn draw(&mut self, screen: &Screen) -> Result<()> {
        match screen {
            Screen::Welcome | Screen::Instructions => {
                let (left, right) = self.regions;
                self.outline_region(&left, GREY)?;
                self.outline_region(&right, GREY)?;
            }
            Screen::Camera => {
                let ring = PathBuilder::from_circle(self.center.0, self.center.1, 40.0)
                    .context("camera ring")?;
                let stroke = Stroke {
                    width: 3.0,
                    ..Stroke::default()
                };
                self.canvas
                    .stroke_path(&ring, &solid(GREY), &stroke, Transform::identity(), None);
                self.mark_dirty(self.center.0 - 42.0, self.center.1 - 42.0, 84.0, 84.0);
            }
            Screen::CalibrationTarget { point, .. } => {
                self.blit_cached(CacheIndex::CalibrationDot as usize, position(point))
            }
            Screen::ValidationTarget { point, .. } => {
                self.blit_cached(CacheIndex::ValidationDot as usize, position(point))
            }
            Screen::ValidationResult { report, passed } => {
                let color = if *passed { GREEN } else { RED };
                self.progress_bar(report.accuracy, color)?;
            }
            Screen::Blank => {}
            Screen::Fixation { center } => {
                self.blit_cached(CacheIndex::FixationCross as usize, position(center))
            }
            Screen::Stimuli {
                left,
                right,
                left_region,
                right_region,
                ..
            } => {
                self.blit_image(left, left_region);
                self.blit_image(right, right_region);
            }
            Screen::Break { completed, total } => {
                let fraction = if *total == 0 {
                    0.0
                } else {
                    *completed as f64 / *total as f64
                };
                self.progress_bar(fraction, WHITE)?;
            }
            Screen::Completion { .. } => self.progress_bar(1.0, GREEN)?,
        }
        Ok(())
    }

    /// Blits a cached pixmap centred on `pos`.
    fn blit_cached(&mut self, index: usize, pos: (f32, f32)) {
        let Some(pixmap) = self.static_cache.get(index) else {
            return;
        };
        let w = pixmap.width() as i32;
        let h = pixmap.height() as i32;
        let x0 = (pos.0 - w as f32 * 0.5).floor() as i32;
        let y0 = (pos.1 - h as f32 * 0.5).floor() as i32;

        let dst_x_start = x0.max(0);
        let dst_y_start = y0.max(0);
        let dst_x_end = (x0 + w).min(self.width as i32);
        let dst_y_end = (y0 + h).min(self.height as i32);
        if dst_x_end <= dst_x_start || dst_y_end <= dst_y_start {
            return;
        }
        let src_x_start = (dst_x_start - x0) as usize;
        let src_y_start = (dst_y_start - y0) as usize;
        let max_w = (dst_x_end - dst_x_start) as usize;
        let max_h = (dst_y_end - dst_y_start) as usize;

        let src_stride = pixmap.width() as usize * 4;
        let dst_stride = self.width as usize * 4;
        let src = pixmap.data();
        let dst = self.canvas.data_mut();

        for y in 0..max_h {
            let s = (src_y_start + y) * src_stride + src_x_start * 4;
            let d = (dst_y_start as usize + y) * dst_stride + dst_x_start as usize * 4;
            let src_row = &src[s..s + max_w * 4];
            let dst_row = &mut dst[d..d + max_w * 4];
            if src_row.chunks_exact(4).all(|px| px[3] == 255) {
                dst_row.copy_from_slice(src_row);
                continue;
            }
            for (out, px) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                blend_over(out, [px[0], px[1], px[2], px[3]]);
            }
        }
        self.mark_dirty(
            dst_x_start as f32,
            dst_y_start as f32,
            max_w as f32,
            max_h as f32,
        );
    }

    /// Nearest-neighbour scale of a straight-alpha image into `region`.
    fn blit_image(&mut self, image: &RgbaImage, region: &Region) {
        let (sw, sh) = image.dimensions();
        if sw == 0 || sh == 0 || region.width <= 0.0 || region.height <= 0.0 {
            return;
        }
        let x0 = region.x.max(0.0).floor() as u32;
        let y0 = region.y.max(0.0).floor() as u32;
        let x1 = (region.x + region.width).min(self.width as f64).ceil() as u32;
        let y1 = (region.y + region.height).min(self.height as f64).ceil() as u32;
        if x1 <= x0 || y1 <= y0 {
            return;
        }

        let stride = self.width as usize * 4;
        let dst = self.canvas.data_mut();
        for y in y0..y1 {
            let sy = ((y as f64 - region.y) / region.height * sh as f64)
                .clamp(0.0, (sh - 1) as f64) as u32;
            for x in x0..x1 {
                let sx = ((x as f64 - region.x) / region.width * sw as f64)
                    .clamp(0.0, (sw - 1) as f64) as u32;
                let i = y as usize * stride + x as usize * 4;
                blend_over(&mut dst[i..i + 4], premultiply(image.get_pixel(sx, sy).0));
            }
        }
        self.mark_dirty(x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32);
    }

    fn outline_region(&mut self, region: &Region, rgba: [u8; 4]) -> Result<()> {
        let rect = Rect::from_xywh(
            region.x as f32,
            region.y as f32,
            region.width as f32,
            region.height as f32,
        )
        .context("region outline")?;
        let stroke = Stroke {
            width: 2.0,
            ..Stroke::default()
        };
        self.canvas.stroke_path(
            &PathBuilder::from_rect(rect),
            &solid(rgba),
            &stroke,
            Transform::identity(),
            None,
        );
        self.mark_dirty(
            rect.x() - 2.0,
            rect.y() - 2.0,
            rect.width() + 4.0,
            rect.height() + 4.0,
        );
        Ok(())
    }

    /// Horizontal bar centred on the screen, filled to `fraction`.
    fn progress_bar(&mut self, fraction: f64, rgba: [u8; 4]) -> Result<()> {
        let bar_w = (self.width as f32 * 0.6).min(600.0);
        let bar_h = 16.0;
        let x = self.center.0 - bar_w / 2.0;
        let y = self.center.1 - bar_h / 2.0;

        let outline = Rect::from_xywh(x - 3.0, y - 3.0, bar_w + 6.0, bar_h + 6.0)
            .context("progress outline")?;
        let stroke = Stroke {
            width: 2.0,
            ..Stroke::default()
        };
        self.canvas.stroke_path(
            &PathBuilder::from_rect(outline),
            &solid(GREY),
            &stroke,
            Transform::identity(),
            None,
        );

        let filled = bar_w * fraction.clamp(0.0, 1.0) as f32;
        if filled >= 1.0 {
            let fill = Rect::from_xywh(x, y, filled, bar_h).context("progress fill")?;
            self.canvas
                .fill_rect(fill, &solid(rgba), Transform::identity(), None);
        }
        self.mark_dirty(x - 5.0, y - 5.0, bar_w + 10.0, bar_h + 10.0);
        Ok(())
    }

    fn mark_dirty(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let x0 = x.floor().max(0.0);
        let y0 = y.floor().max(0.0);
        let x1 = (x + w).ceil().min(self.width as f32);
        let y1 = (y + h).ceil().min(self.height as f32);
        if let Some(rect) = Rect::from_ltrb(x0, y0, x1, y1) {
            self.dirty_regions.push(rect);
        }
    }

    fn clear_dirty(&mut self, dirty: &[Rect]) {
        let stride = self.width as usize * 4;
        let data = self.canvas.data_mut();
        for rect in dirty {
            let x0 = rect.x().max(0.0).min(self.width as f32) as usize;
            let y0 = rect.y().max(0.0).min(self.height as f32) as usize;
            let x1 = rect.right().ceil().min(self.width as f32) as usize;
            let y1 = rect.bottom().ceil().min(self.height as f32) as usize;
            if x1 <= x0 || y1 <= y0 {
                continue;
            }
            for y in y0..y1 {
                let off = y * stride;
                for px in data[off + x0 * 4..off + x1 * 4].chunks_exact_mut(4) {
                    px.copy_from_slice(&BACKGROUND);
                }
            }
        }
    }

    fn coalesce_dirty(rects: &mut Vec<Rect>) {
        rects.sort_by(|a, b| a.y().total_cmp(&b.y()).then(a.x().total_cmp(&b.x())));
        let mut out: Vec<Rect> = Vec::with_capacity(rects.len());
        for r in rects.drain(..) {
            if let Some(last) = out.last_mut() {
                let same_row =
                    (r.y() - last.y()).abs() < 1.0 && (r.height() - last.height()).abs() < 1.0;
                let touching = r.x() <= last.right() + 1.0;
                if same_row && touching {
                    let left = last.x().min(r.x());
                    let right = last.right().max(r.right());
                    if let Some(merged) = Rect::from_ltrb(left, last.y(), right, last.bottom()) {
                        *last = merged;
                        continue;
                    }
                }
            }
            out.push(r);
        }
        *rects = out;
    }

    /// Straight-alpha copy of the canvas.
    pub fn snapshot(&self) -> Result<RgbaImage> {
        let mut raw = Vec::with_capacity(self.canvas.data().len());
        for px in self.canvas.pixels() {
            let c = px.demultiply();
            raw.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
        }
        RgbaImage::from_raw(self.width, self.height, raw).context("canvas snapshot")
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.snapshot()?
            .save(path)
            .with_context(|| format!("writing frame {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazex_core::{SessionSummary, Side};
    use image::Rgba;
    use std::sync::Arc;

    fn layout() -> LayoutConfig {
        LayoutConfig {
            screen_width: 320,
            screen_height: 180,
            image_width: 100,
            image_height: 75,
        }
    }

    fn is_background(px: [u8; 4]) -> bool {
        px == BACKGROUND
    }

    #[test]
    fn fixation_cross_is_centred() {
        let mut r = FrameRenderer::new(&layout()).unwrap();
        r.render(&Screen::Fixation {
            center: GazePoint::new(160.0, 90.0),
        })
        .unwrap();
        assert_eq!(r.pixel(160, 90), Some(WHITE));
        assert!(is_background(r.pixel(0, 0).unwrap()));
        assert!(is_background(r.pixel(150, 80).unwrap()));
    }

    #[test]
    fn previous_frame_is_cleared() {
        let mut r = FrameRenderer::new(&layout()).unwrap();
        r.render(&Screen::Fixation {
            center: GazePoint::new(160.0, 90.0),
        })
        .unwrap();
        let stats = r.render(&Screen::Blank).unwrap();
        assert_eq!(stats.dirty_count, 0);
        assert!(is_background(r.pixel(160, 90).unwrap()));
    }

    #[test]
    fn stimuli_fill_their_regions() {
        let mut r = FrameRenderer::new(&layout()).unwrap();
        let (left_region, right_region) = layout().regions();
        let red = Arc::new(RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255])));
        let blue = Arc::new(RgbaImage::from_pixel(4, 3, Rgba([0, 0, 255, 255])));
        r.render(&Screen::Stimuli {
            trial: 1,
            left: red,
            right: blue,
            left_region,
            right_region,
        })
        .unwrap();

        let at = |p: GazePoint| r.pixel(p.x as u32, p.y as u32).unwrap();
        assert_eq!(at(left_region.center()), [255, 0, 0, 255]);
        assert_eq!(at(right_region.center()), [0, 0, 255, 255]);
        assert!(is_background(r.pixel(160, 90).unwrap()));
    }

    #[test]
    fn calibration_dot_marks_the_target() {
        let mut r = FrameRenderer::new(&layout()).unwrap();
        r.render(&Screen::CalibrationTarget {
            side: Side::Left,
            point: GazePoint::new(80.0, 90.0),
        })
        .unwrap();
        assert_eq!(r.pixel(80, 90), Some(WHITE));
        assert!(!is_background(r.pixel(80, 80).unwrap()));
        assert!(is_background(r.pixel(160, 90).unwrap()));
    }

    #[test]
    fn targets_near_the_edge_are_clipped() {
        let mut r = FrameRenderer::new(&layout()).unwrap();
        r.render(&Screen::ValidationTarget {
            index: 0,
            point: GazePoint::new(0.0, 0.0),
        })
        .unwrap();
        assert!(!is_background(r.pixel(0, 0).unwrap()));
    }

    #[test]
    fn break_bar_shows_progress() {
        let mut r = FrameRenderer::new(&layout()).unwrap();
        r.render(&Screen::Break {
            completed: 1,
            total: 2,
        })
        .unwrap();
        // bar spans 192 px centred at x = 160
        assert_eq!(r.pixel(80, 90), Some(WHITE));
        assert!(is_background(r.pixel(240, 90).unwrap()));
    }

    #[test]
    fn completion_bar_is_full() {
        let mut r = FrameRenderer::new(&layout()).unwrap();
        r.render(&Screen::Completion {
            summary: SessionSummary::default(),
        })
        .unwrap();
        assert_eq!(r.pixel(250, 90), Some(GREEN));
    }

    #[test]
    fn resize_resets_the_canvas() {
        let mut r = FrameRenderer::new(&layout()).unwrap();
        r.render(&Screen::Welcome).unwrap();
        let mut bigger = layout();
        bigger.screen_width = 640;
        bigger.screen_height = 360;
        r.resize(&bigger).unwrap();
        assert_eq!(r.size(), (640, 360));
        r.render(&Screen::Blank).unwrap();
        assert!(r.canvas().pixels().iter().all(|p| p.alpha() == 255 && p.red() == 0));
    }

    #[test]
    fn snapshot_roundtrips_through_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = FrameRenderer::new(&layout()).unwrap();
        r.render(&Screen::Instructions).unwrap();
        let path = dir.path().join("frame.png");
        r.save_png(&path).unwrap();
        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back, r.snapshot().unwrap());
    }

    #[test]
    fn zero_sized_layout_is_rejected() {
        let mut l = layout();
        l.screen_width = 0;
        assert!(FrameRenderer::new(&l).is_err());
    }
}
