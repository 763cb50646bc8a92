use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::point::Point;
use imageproc::rect::Rect;

/// Rectangle in pixel coordinates, `left..right` by `top..bottom`
/// (right and bottom exclusive). May extend past the surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        (i64::from(self.right) - i64::from(self.left)).clamp(0, i64::from(u32::MAX)) as u32
    }

    pub fn height(&self) -> u32 {
        (i64::from(self.bottom) - i64::from(self.top)).clamp(0, i64::from(u32::MAX)) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Grow (positive) or shrink (negative) on every side.
    pub fn inflate(&self, amount: i32) -> Self {
        Self::new(
            self.left.saturating_sub(amount),
            self.top.saturating_sub(amount),
            self.right.saturating_add(amount),
            self.bottom.saturating_add(amount),
        )
    }

    fn to_rect(self) -> Option<Rect> {
        if self.is_empty() {
            None
        } else {
            Some(Rect::at(self.left, self.top).of_size(self.width(), self.height()))
        }
    }
}

/// Drawing primitives the overlay needs.
///
/// Implementations clip everything to their own bounds; callers may pass
/// coordinates outside the surface.
pub trait Surface {
    fn dimensions(&self) -> (u32, u32);

    fn stroke_rect(&mut self, rect: PixelRect, color: Rgb<u8>, thickness: u32);

    fn fill_rect(&mut self, rect: PixelRect, color: Rgb<u8>);

    /// Draw a closed outline through `points`.
    fn stroke_polygon(&mut self, points: &[Point<i32>], color: Rgb<u8>, thickness: u32);

    /// Width and height of `text` rendered at `scale` pixels.
    fn text_size(&self, text: &str, scale: f32) -> (u32, u32);

    /// Draw `text` with its top-left corner at `(x, y)`.
    fn draw_text(&mut self, text: &str, x: i32, y: i32, scale: f32, color: Rgb<u8>);
}

/// [`Surface`] over an RGB frame buffer.
///
/// Without a font, text is not drawn and measures as zero-sized.
pub struct RgbSurface<'a> {
    image: &'a mut RgbImage,
    font: Option<&'a FontVec>,
}

impl<'a> RgbSurface<'a> {
    pub fn new(image: &'a mut RgbImage, font: Option<&'a FontVec>) -> Self {
        Self { image, font }
    }
}

/// Load a TrueType/OpenType font for label text.
pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|_| anyhow!("{} is not a usable font", path.display()))
}

/// Offsets spreading a stroke of `thickness` pixels around the nominal line.
fn stroke_offsets(thickness: u32) -> std::ops::RangeInclusive<i32> {
    let thickness = thickness.max(1) as i32;
    -((thickness - 1) / 2)..=thickness / 2
}

impl Surface for RgbSurface<'_> {
    fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn stroke_rect(&mut self, rect: PixelRect, color: Rgb<u8>, thickness: u32) {
        for offset in stroke_offsets(thickness) {
            if let Some(rect) = rect.inflate(offset).to_rect() {
                draw_hollow_rect_mut(&mut *self.image, rect, color);
            }
        }
    }

    fn fill_rect(&mut self, rect: PixelRect, color: Rgb<u8>) {
        let (width, height) = self.image.dimensions();
        let clipped = PixelRect::new(
            rect.left.max(0),
            rect.top.max(0),
            rect.right.min(width as i32),
            rect.bottom.min(height as i32),
        );
        if let Some(rect) = clipped.to_rect() {
            draw_filled_rect_mut(&mut *self.image, rect, color);
        }
    }

    fn stroke_polygon(&mut self, points: &[Point<i32>], color: Rgb<u8>, thickness: u32) {
        if points.is_empty() {
            return;
        }
        let offsets = stroke_offsets(thickness);
        for (i, start) in points.iter().enumerate() {
            let end = points[(i + 1) % points.len()];
            for dy in offsets.clone() {
                for dx in offsets.clone() {
                    draw_line_segment_mut(
                        &mut *self.image,
                        ((start.x + dx) as f32, (start.y + dy) as f32),
                        ((end.x + dx) as f32, (end.y + dy) as f32),
                        color,
                    );
                }
            }
        }
    }

    fn text_size(&self, text: &str, scale: f32) -> (u32, u32) {
        match self.font {
            Some(font) => {
                let (width, height) = text_size(PxScale::from(scale), font, text);
                (width as u32, height as u32)
            }
            None => (0, 0),
        }
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32, scale: f32, color: Rgb<u8>) {
        if let Some(font) = self.font {
            draw_text_mut(&mut *self.image, color, x, y, PxScale::from(scale), font, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);

    #[test]
    fn load_font_rejects_non_font_files() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"definitely not a font").unwrap();
        assert!(load_font(file.path()).is_err());
        assert!(load_font(Path::new("/nonexistent/font.ttf")).is_err());
    }

    #[test]
    fn stroke_offsets_cover_thickness() {
        assert_eq!(stroke_offsets(1).count(), 1);
        assert_eq!(stroke_offsets(2).count(), 2);
        assert_eq!(stroke_offsets(3), -1..=1);
        assert_eq!(stroke_offsets(0).count(), 1);
    }

    #[test]
    fn fill_rect_clips_to_image() {
        let mut image = RgbImage::new(10, 10);
        let mut surface = RgbSurface::new(&mut image, None);
        surface.fill_rect(PixelRect::new(-5, -5, 3, 3), RED);
        assert_eq!(*image.get_pixel(0, 0), RED);
        assert_eq!(*image.get_pixel(2, 2), RED);
        assert_eq!(*image.get_pixel(3, 3), Rgb([0, 0, 0]));
    }

    #[test]
    fn stroke_rect_leaves_interior_untouched() {
        let mut image = RgbImage::new(20, 20);
        let mut surface = RgbSurface::new(&mut image, None);
        surface.stroke_rect(PixelRect::new(2, 2, 18, 18), RED, 1);
        assert_eq!(*image.get_pixel(2, 2), RED);
        assert_eq!(*image.get_pixel(17, 10), RED);
        assert_eq!(*image.get_pixel(10, 10), Rgb([0, 0, 0]));
    }

    #[test]
    fn stroke_polygon_closes_outline() {
        let mut image = RgbImage::new(20, 20);
        let mut surface = RgbSurface::new(&mut image, None);
        let square = [
            Point::new(2, 2),
            Point::new(10, 2),
            Point::new(10, 10),
            Point::new(2, 10),
        ];
        surface.stroke_polygon(&square, RED, 1);
        // Closing edge from (2, 10) back to (2, 2).
        assert_eq!(*image.get_pixel(2, 6), RED);
        assert_eq!(*image.get_pixel(6, 6), Rgb([0, 0, 0]));
    }

    #[test]
    fn text_without_font_is_noop() {
        let mut image = RgbImage::new(10, 10);
        let mut surface = RgbSurface::new(&mut image, None);
        assert_eq!(surface.text_size("label", 16.0), (0, 0));
        surface.draw_text("label", 0, 0, 16.0, RED);
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn empty_rects_are_skipped() {
        let mut image = RgbImage::new(10, 10);
        let mut surface = RgbSurface::new(&mut image, None);
        surface.fill_rect(PixelRect::new(5, 5, 5, 8), RED);
        surface.stroke_rect(PixelRect::new(5, 5, 4, 8), RED, 1);
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }
}
