//! Detection overlay pipeline.
//!
//! Per frame: filter detections by the session's confidence threshold, turn
//! each surviving mask into outer contours, and draw box, contours, label
//! and the threshold HUD onto a [`Surface`].

mod contour;
mod palette;
mod pipeline;
mod render;
mod surface;
mod threshold;

pub use contour::{binarize_mask, mask_to_polygon, Contour, ContourOptions, Resampling, MASK_CUTOFF};
pub use palette::{class_color, DEFAULT_COLOR};
pub use pipeline::{filter_detections, OverlayOptions, OverlayPipeline};
pub use render::{hud_text, label_text, place_label, LabelPlacement, TEXT_COLOR};
pub use surface::{load_font, PixelRect, RgbSurface, Surface};
pub use threshold::{ConfidenceThreshold, DEFAULT_THRESHOLD};
