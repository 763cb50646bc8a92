use image::Rgb;

use crate::detect::{ClassNames, Detection};
use crate::overlay::contour::{mask_to_polygon, ContourOptions, Resampling};
use crate::overlay::palette::class_color;
use crate::overlay::render::{hud_text, label_text, place_label, TEXT_COLOR};
use crate::overlay::surface::{PixelRect, Surface};
use crate::overlay::threshold::ConfidenceThreshold;

/// Tunables for drawing detections.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayOptions {
    pub resampling: Resampling,
    pub approximate_contours: bool,
    pub line_thickness: u32,
    pub label_scale: f32,
    pub label_padding: u32,
    pub hud_scale: f32,
    pub hud_origin: (i32, i32),
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            resampling: Resampling::Bilinear,
            approximate_contours: false,
            line_thickness: 2,
            label_scale: 16.0,
            label_padding: 5,
            hud_scale: 22.0,
            hud_origin: (10, 10),
        }
    }
}

/// Keep detections with `confidence >= threshold`, in their original order.
pub fn filter_detections(detections: &[Detection], threshold: ConfidenceThreshold) -> Vec<&Detection> {
    detections
        .iter()
        .filter(|detection| threshold.admits(detection.confidence))
        .collect()
}

/// Turns per-frame detections into drawing calls on a [`Surface`].
#[derive(Clone, Debug, Default)]
pub struct OverlayPipeline {
    options: OverlayOptions,
}

impl OverlayPipeline {
    pub fn new(options: OverlayOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &OverlayOptions {
        &self.options
    }

    fn contour_options(&self) -> ContourOptions {
        ContourOptions {
            resampling: self.options.resampling,
            approximate: self.options.approximate_contours,
        }
    }

    /// Draw every detection passing `threshold`, then the HUD.
    ///
    /// Returns how many detections were drawn. A detection with a
    /// non-finite box is skipped without affecting the others.
    pub fn annotate<S: Surface>(
        &self,
        surface: &mut S,
        detections: &[Detection],
        threshold: ConfidenceThreshold,
        class_names: &ClassNames,
    ) -> usize {
        let mut rendered = 0;
        for detection in filter_detections(detections, threshold) {
            if !detection.bbox.is_finite() {
                log::debug!(
                    "skipping class {} detection with non-finite box",
                    detection.class_id
                );
                continue;
            }
            let color = class_color(detection.class_id);
            let label = label_text(&class_names.name(detection.class_id), detection.confidence);
            self.render_detection(surface, detection, color, &label);
            rendered += 1;
        }
        self.render_hud(surface, threshold);
        rendered
    }

    /// Draw box, mask outlines and label for one detection.
    pub fn render_detection<S: Surface>(
        &self,
        surface: &mut S,
        detection: &Detection,
        color: Rgb<u8>,
        label: &str,
    ) {
        let (width, height) = surface.dimensions();
        let thickness = self.options.line_thickness;

        if let Some(mask) = &detection.mask {
            for contour in mask_to_polygon(mask, width, height, self.contour_options()) {
                surface.stroke_polygon(&contour, color, thickness);
            }
        }

        let bbox = detection.bbox.normalized();
        let x1 = frame_coord(bbox.x1, width);
        let y1 = frame_coord(bbox.y1, height);
        let x2 = frame_coord(bbox.x2, width);
        let y2 = frame_coord(bbox.y2, height);
        surface.stroke_rect(PixelRect::new(x1, y1, x2 + 1, y2 + 1), color, thickness);

        let (text_width, text_height) = surface.text_size(label, self.options.label_scale);
        let placement = place_label(x1, y1, text_width, text_height, self.options.label_padding);
        surface.fill_rect(placement.background, color);
        let (tx, ty) = placement.text_origin;
        surface.draw_text(label, tx, ty, self.options.label_scale, TEXT_COLOR);
    }

    /// Draw the current threshold in the top-left corner.
    pub fn render_hud<S: Surface>(&self, surface: &mut S, threshold: ConfidenceThreshold) {
        let (x, y) = self.options.hud_origin;
        surface.draw_text(&hud_text(threshold.value()), x, y, self.options.hud_scale, TEXT_COLOR);
    }
}

/// Pixel coordinate for a box edge, limited to one frame extent beyond
/// either side so later offsets cannot overflow.
fn frame_coord(value: f32, extent: u32) -> i32 {
    let extent = extent as f32;
    value.clamp(-extent, 2.0 * extent) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Mask};
    use crate::overlay::palette::DEFAULT_COLOR;
    use image::Luma;
    use imageproc::point::Point;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        StrokeRect(PixelRect, Rgb<u8>),
        FillRect(PixelRect, Rgb<u8>),
        Polygon(usize, Rgb<u8>),
        Text(String, i32, i32),
    }

    struct RecordingSurface {
        width: u32,
        height: u32,
        ops: Vec<Op>,
    }

    impl RecordingSurface {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                ops: Vec::new(),
            }
        }
    }

    impl Surface for RecordingSurface {
        fn dimensions(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn stroke_rect(&mut self, rect: PixelRect, color: Rgb<u8>, _thickness: u32) {
            self.ops.push(Op::StrokeRect(rect, color));
        }

        fn fill_rect(&mut self, rect: PixelRect, color: Rgb<u8>) {
            self.ops.push(Op::FillRect(rect, color));
        }

        fn stroke_polygon(&mut self, points: &[Point<i32>], color: Rgb<u8>, _thickness: u32) {
            self.ops.push(Op::Polygon(points.len(), color));
        }

        fn text_size(&self, text: &str, _scale: f32) -> (u32, u32) {
            (text.len() as u32 * 8, 10)
        }

        fn draw_text(&mut self, text: &str, x: i32, y: i32, _scale: f32, _color: Rgb<u8>) {
            self.ops.push(Op::Text(text.to_string(), x, y));
        }
    }

    fn detection(class_id: u32, confidence: f32) -> Detection {
        Detection::without_mask(class_id, confidence, BoundingBox::new(10.0, 40.0, 60.0, 90.0))
    }

    fn names() -> ClassNames {
        ClassNames::new(vec!["person".into(), "bicycle".into()])
    }

    #[test]
    fn filter_keeps_boundary_and_order() {
        let detections = vec![detection(0, 0.9), detection(1, 0.5), detection(0, 0.49), detection(1, 0.7)];
        let threshold = ConfidenceThreshold::new(0.5);
        let kept = filter_detections(&detections, threshold);
        let confidences: Vec<f32> = kept.iter().map(|d| d.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.5, 0.7]);
    }

    #[test]
    fn filter_is_idempotent() {
        let detections = vec![detection(0, 0.3), detection(1, 0.8), detection(0, 0.6)];
        let threshold = ConfidenceThreshold::new(0.55);
        let once: Vec<Detection> = filter_detections(&detections, threshold).into_iter().cloned().collect();
        let twice = filter_detections(&once, threshold);
        assert_eq!(once.len(), twice.len());
        assert_eq!(twice.len(), 2);
    }

    #[test]
    fn maskless_detection_still_gets_box_and_label() {
        let pipeline = OverlayPipeline::default();
        let mut surface = RecordingSurface::new(200, 200);
        let rendered = pipeline.annotate(&mut surface, &[detection(1, 0.8)], ConfidenceThreshold::default(), &names());
        assert_eq!(rendered, 1);
        assert!(surface.ops.iter().any(|op| matches!(op, Op::StrokeRect(_, _))));
        assert!(surface.ops.iter().any(|op| matches!(op, Op::Text(text, _, _) if text == "bicycle 0.80")));
        assert!(!surface.ops.iter().any(|op| matches!(op, Op::Polygon(_, _))));
    }

    #[test]
    fn below_threshold_detections_are_not_drawn() {
        let pipeline = OverlayPipeline::default();
        let mut surface = RecordingSurface::new(200, 200);
        let rendered = pipeline.annotate(&mut surface, &[detection(0, 0.2)], ConfidenceThreshold::default(), &names());
        assert_eq!(rendered, 0);
        // Only the HUD remains.
        assert_eq!(
            surface.ops,
            vec![Op::Text("Confidence threshold: 0.50".into(), 10, 10)]
        );
    }

    #[test]
    fn every_blob_in_mask_is_outlined() {
        let pipeline = OverlayPipeline::default();
        let mut surface = RecordingSurface::new(100, 100);
        let mask = Mask::from_fn(100, 100, |x, y| {
            let left = (10..30).contains(&x) && (10..30).contains(&y);
            let right = (60..90).contains(&x) && (50..80).contains(&y);
            Luma([if left || right { 1.0 } else { 0.0 }])
        });
        let detection = detection(0, 0.9).with_mask(mask);
        pipeline.render_detection(&mut surface, &detection, class_color(0), "person 0.90");
        let polygons = surface
            .ops
            .iter()
            .filter(|op| matches!(op, Op::Polygon(_, _)))
            .count();
        assert_eq!(polygons, 2);
    }

    #[test]
    fn unknown_class_uses_default_color() {
        let pipeline = OverlayPipeline::default();
        let mut surface = RecordingSurface::new(200, 200);
        pipeline.annotate(&mut surface, &[detection(99, 0.9)], ConfidenceThreshold::default(), &names());
        assert!(surface
            .ops
            .iter()
            .any(|op| matches!(op, Op::StrokeRect(_, color) if *color == DEFAULT_COLOR)));
        assert!(surface
            .ops
            .iter()
            .any(|op| matches!(op, Op::Text(text, _, _) if text == "class 99 0.90")));
    }

    #[test]
    fn label_flips_when_box_touches_top() {
        let pipeline = OverlayPipeline::default();
        let mut surface = RecordingSurface::new(200, 200);
        let near_top = Detection::without_mask(0, 0.9, BoundingBox::new(10.0, 5.0, 60.0, 90.0));
        pipeline.render_detection(&mut surface, &near_top, class_color(0), "person 0.90");
        let background = surface
            .ops
            .iter()
            .find_map(|op| match op {
                Op::FillRect(rect, _) => Some(*rect),
                _ => None,
            })
            .unwrap();
        // Text height 10 + 2 * padding 5 = 20 px label, so it cannot fit above y1 = 5.
        assert_eq!(background.top, 5);
        assert!(background.top >= 0);
    }

    #[test]
    fn non_finite_box_is_skipped_alone() {
        let pipeline = OverlayPipeline::default();
        let mut surface = RecordingSurface::new(200, 200);
        let broken = Detection::without_mask(0, 0.9, BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0));
        let rendered = pipeline.annotate(&mut surface, &[broken, detection(1, 0.9)], ConfidenceThreshold::default(), &names());
        assert_eq!(rendered, 1);
    }

    #[test]
    fn oversized_box_is_clipped_not_dropped() {
        let pipeline = OverlayPipeline::default();
        let mut surface = RecordingSurface::new(200, 200);
        let huge = Detection::without_mask(0, 0.9, BoundingBox::new(10.0, 10.0, 3.0e9, 40.0));
        let rendered = pipeline.annotate(&mut surface, &[huge.clone()], ConfidenceThreshold::default(), &names());
        assert_eq!(rendered, 1);
        assert!(surface
            .ops
            .contains(&Op::StrokeRect(PixelRect::new(10, 10, 401, 41), class_color(0))));

        let mut frame = image::RgbImage::new(200, 200);
        let mut rgb = crate::overlay::RgbSurface::new(&mut frame, None);
        assert_eq!(pipeline.annotate(&mut rgb, &[huge], ConfidenceThreshold::default(), &names()), 1);
        assert_eq!(*frame.get_pixel(100, 10), class_color(0));
    }

    #[test]
    fn same_class_shares_color() {
        let pipeline = OverlayPipeline::default();
        let mut surface = RecordingSurface::new(200, 200);
        pipeline.annotate(&mut surface, &[detection(1, 0.9), detection(1, 0.6)], ConfidenceThreshold::default(), &names());
        let colors: Vec<Rgb<u8>> = surface
            .ops
            .iter()
            .filter_map(|op| match op {
                Op::StrokeRect(_, color) => Some(*color),
                _ => None,
            })
            .collect();
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0], colors[1]);
    }
}
