use image::Rgb;

use crate::overlay::surface::PixelRect;

pub const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Where a detection label goes relative to its box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelPlacement {
    pub background: PixelRect,
    /// Top-left corner of the text.
    pub text_origin: (i32, i32),
    /// True when the label was moved under the box's top edge for lack of
    /// room above it.
    pub flipped: bool,
}

/// Place a label of `text_width` x `text_height` at the box's top-left
/// corner `(x1, y1)`.
///
/// The label normally sits just above the box. When `y1 - label_height`
/// would be negative it flips to hang just below the top edge instead.
pub fn place_label(x1: i32, y1: i32, text_width: u32, text_height: u32, padding: u32) -> LabelPlacement {
    let padding = i32::try_from(padding).unwrap_or(i32::MAX);
    let label_width = to_i32(text_width).saturating_add(padding.saturating_mul(2));
    let label_height = to_i32(text_height).saturating_add(padding.saturating_mul(2));
    let flipped = y1.saturating_sub(label_height) < 0;
    let top = if flipped { y1 } else { y1 - label_height };
    LabelPlacement {
        background: PixelRect::new(
            x1,
            top,
            x1.saturating_add(label_width),
            top.saturating_add(label_height),
        ),
        text_origin: (x1.saturating_add(padding), top.saturating_add(padding)),
        flipped,
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// `"<name> <confidence>"` with two decimals.
pub fn label_text(class_name: &str, confidence: f32) -> String {
    format!("{} {:.2}", class_name, confidence)
}

pub fn hud_text(threshold: f32) -> String {
    format!("Confidence threshold: {:.2}", threshold)
}
