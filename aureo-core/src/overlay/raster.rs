//! Rasterization of seal overlays into a transparent RGBA layer.

use image::{Rgba, RgbaImage};

use super::font::{is_inked, GLYPH_HEIGHT, GLYPH_WIDTH};
use super::{AnchorMark, Glyph, Overlay, RadialFade, Stroke};

/// Premultiplied RGBA accumulation buffer.
struct Canvas {
    size: u32,
    pixels: Vec<[f32; 4]>,
}

impl Canvas {
    fn new(size: u32) -> Self {
        Self {
            size,
            pixels: vec![[0.0; 4]; (size as usize) * (size as usize)],
        }
    }

    /// Source-over blend of `color` at `alpha` onto (`x`, `y`).
    fn blend(&mut self, x: i64, y: i64, color: [u8; 3], alpha: f32) {
        if alpha <= 0.0 || x < 0 || y < 0 || x >= i64::from(self.size) || y >= i64::from(self.size)
        {
            return;
        }
        let alpha = alpha.min(1.0);
        let idx = (y as usize) * (self.size as usize) + x as usize;
        let dst = &mut self.pixels[idx];
        for channel in 0..3 {
            let src = f32::from(color[channel]) / 255.0 * alpha;
            dst[channel] = src + dst[channel] * (1.0 - alpha);
        }
        dst[3] = alpha + dst[3] * (1.0 - alpha);
    }

    fn set_opaque(&mut self, x: u32, y: u32, value: u8) {
        if x >= self.size || y >= self.size {
            return;
        }
        let idx = (y as usize) * (self.size as usize) + x as usize;
        let v = f32::from(value) / 255.0;
        self.pixels[idx] = [v, v, v, 1.0];
    }

    fn into_image(self) -> RgbaImage {
        let mut image = RgbaImage::new(self.size, self.size);
        for (pixel, acc) in image.pixels_mut().zip(self.pixels) {
            let alpha = acc[3];
            *pixel = if alpha <= f32::EPSILON {
                Rgba([0, 0, 0, 0])
            } else {
                let straight = |c: f32| ((c / alpha).clamp(0.0, 1.0) * 255.0).round() as u8;
                Rgba([
                    straight(acc[0]),
                    straight(acc[1]),
                    straight(acc[2]),
                    (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
                ])
            };
        }
        image
    }
}

/// Render `overlay` to a transparent layer of `overlay.size` pixels.
///
/// Layers are painted fade, strokes, glyphs, then anchors; anchors are opaque
/// and overwrite whatever lies beneath them.
pub fn rasterize(overlay: &Overlay) -> RgbaImage {
    let mut canvas = Canvas::new(overlay.size);

    paint_fade(&mut canvas, &overlay.fade);
    for stroke in &overlay.strokes {
        paint_stroke(&mut canvas, stroke);
    }
    for glyph in &overlay.glyphs {
        paint_glyph(&mut canvas, glyph);
    }
    for anchor in &overlay.anchors {
        paint_anchor(&mut canvas, anchor);
    }

    canvas.into_image()
}

fn paint_fade(canvas: &mut Canvas, fade: &RadialFade) {
    if fade.radius <= 0.0 {
        return;
    }
    for y in 0..canvas.size {
        for x in 0..canvas.size {
            let dx = f64::from(x) + 0.5 - fade.center.x;
            let dy = f64::from(y) + 0.5 - fade.center.y;
            let t = dx.hypot(dy) / fade.radius;
            if t <= 1.0 {
                let alpha = fade.inner_opacity + (fade.outer_opacity - fade.inner_opacity) * t;
                canvas.blend(i64::from(x), i64::from(y), fade.color, alpha as f32);
            }
        }
    }
}

fn paint_stroke(canvas: &mut Canvas, stroke: &Stroke) {
    let half = stroke.width / 2.0;
    let reach = half + 1.0;
    let min_x = (stroke.from.x.min(stroke.to.x) - reach).floor() as i64;
    let max_x = (stroke.from.x.max(stroke.to.x) + reach).ceil() as i64;
    let min_y = (stroke.from.y.min(stroke.to.y) - reach).floor() as i64;
    let max_y = (stroke.from.y.max(stroke.to.y) + reach).ceil() as i64;

    let (ax, ay) = (stroke.from.x, stroke.from.y);
    let (bx, by) = (stroke.to.x, stroke.to.y);
    let (vx, vy) = (bx - ax, by - ay);
    let length_sq = vx * vx + vy * vy;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let px = x as f64 + 0.5;
            let py = y as f64 + 0.5;
            let t = if length_sq > 0.0 {
                (((px - ax) * vx + (py - ay) * vy) / length_sq).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let distance = (px - (ax + t * vx)).hypot(py - (ay + t * vy));
            let coverage = (half + 0.5 - distance).clamp(0.0, 1.0);
            if coverage > 0.0 {
                canvas.blend(x, y, stroke.color, (stroke.opacity * coverage) as f32);
            }
        }
    }
}

fn paint_glyph(canvas: &mut Canvas, glyph: &Glyph) {
    let cell = i64::from(glyph.cell);
    let left = (glyph.x - f64::from(GLYPH_WIDTH * glyph.cell) / 2.0).round() as i64;
    let top = (glyph.y - f64::from(GLYPH_HEIGHT * glyph.cell) / 2.0).round() as i64;

    for row in 0..GLYPH_HEIGHT {
        for col in 0..GLYPH_WIDTH {
            if !is_inked(glyph.ch, col, row) {
                continue;
            }
            let x0 = left + i64::from(col) * cell;
            let y0 = top + i64::from(row) * cell;
            for y in y0..y0 + cell {
                for x in x0..x0 + cell {
                    canvas.blend(x, y, glyph.color, glyph.opacity as f32);
                }
            }
        }
    }
}

fn paint_anchor(canvas: &mut Canvas, anchor: &AnchorMark) {
    for dy in 0..3u32 {
        for dx in 0..3u32 {
            let (x, y) = ((anchor.x + dx).wrapping_sub(1), (anchor.y + dy).wrapping_sub(1));
            let value = if dx == 1 && dy == 1 { anchor.core } else { 0 };
            canvas.set_opaque(x, y, value);
        }
    }
}
