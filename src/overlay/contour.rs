//! Mask to outline conversion.
//!
//! A mask arrives at model resolution, gets resampled to the frame,
//! binarized at [`MASK_CUTOFF`] and traced. Only outermost borders are kept:
//! holes, and any blobs sitting inside a hole, do not produce outlines.

use std::borrow::Cow;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

use crate::detect::Mask;

/// Fixed probability cutoff for mask membership. Independent of the
/// user-adjustable confidence threshold.
pub const MASK_CUTOFF: f32 = 0.5;

/// Polygon approximation tolerance as a fraction of contour perimeter.
const APPROX_EPSILON_RATIO: f64 = 0.01;

/// Closed outline in frame pixel coordinates.
pub type Contour = Vec<Point<i32>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Resampling {
    Nearest,
    #[default]
    Bilinear,
}

impl Resampling {
    fn filter(self) -> FilterType {
        match self {
            Resampling::Nearest => FilterType::Nearest,
            Resampling::Bilinear => FilterType::Triangle,
        }
    }
}

impl FromStr for Resampling {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Resampling::Nearest),
            "bilinear" | "linear" => Ok(Resampling::Bilinear),
            other => Err(anyhow!(
                "unknown resampling '{}' (expected nearest or bilinear)",
                other
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContourOptions {
    pub resampling: Resampling,
    /// Simplify each outline with Douglas-Peucker at 1% of its perimeter.
    pub approximate: bool,
}

/// Resample `mask` to the frame size and binarize it at [`MASK_CUTOFF`].
pub fn binarize_mask(
    mask: &Mask,
    frame_width: u32,
    frame_height: u32,
    resampling: Resampling,
) -> GrayImage {
    let resized: Cow<'_, Mask> = if mask.dimensions() == (frame_width, frame_height) {
        Cow::Borrowed(mask)
    } else {
        Cow::Owned(imageops::resize(
            mask,
            frame_width,
            frame_height,
            resampling.filter(),
        ))
    };
    GrayImage::from_fn(frame_width, frame_height, |x, y| {
        if resized.get_pixel(x, y)[0] > MASK_CUTOFF {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Outer boundary contours of `mask` at frame resolution.
///
/// Returns one contour per disjoint top-level blob; an empty mask yields
/// no contours.
pub fn mask_to_polygon(
    mask: &Mask,
    frame_width: u32,
    frame_height: u32,
    options: ContourOptions,
) -> Vec<Contour> {
    let (mask_width, mask_height) = mask.dimensions();
    if mask_width == 0 || mask_height == 0 || frame_width == 0 || frame_height == 0 {
        return Vec::new();
    }

    let binary = binarize_mask(mask, frame_width, frame_height, options.resampling);
    // The tracer only finds borders between foreground and background pixels
    // inside the image, so blobs touching the frame edge need a zero margin.
    let mut padded = GrayImage::new(frame_width + 2, frame_height + 2);
    imageops::replace(&mut padded, &binary, 1, 1);

    let max_x = frame_width as i32 - 1;
    let max_y = frame_height as i32 - 1;
    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.parent.is_none())
        .map(|contour| {
            let points: Contour = contour
                .points
                .into_iter()
                .map(|p| Point::new((p.x - 1).clamp(0, max_x), (p.y - 1).clamp(0, max_y)))
                .collect();
            if options.approximate {
                approximate(&points)
            } else {
                points
            }
        })
        .filter(|points| !points.is_empty())
        .collect()
}

fn approximate(points: &[Point<i32>]) -> Contour {
    if points.len() < 3 {
        return points.to_vec();
    }
    let epsilon = APPROX_EPSILON_RATIO * arc_length(points, true);
    if epsilon <= 0.0 {
        return points.to_vec();
    }
    approximate_polygon_dp(points, epsilon, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(width: u32, height: u32, inside: impl Fn(u32, u32) -> bool) -> Mask {
        Mask::from_fn(width, height, |x, y| {
            if inside(x, y) {
                Luma([1.0])
            } else {
                Luma([0.0])
            }
        })
    }

    fn bounds(contour: &Contour) -> (i32, i32, i32, i32) {
        let min_x = contour.iter().map(|p| p.x).min().unwrap();
        let min_y = contour.iter().map(|p| p.y).min().unwrap();
        let max_x = contour.iter().map(|p| p.x).max().unwrap();
        let max_y = contour.iter().map(|p| p.y).max().unwrap();
        (min_x, min_y, max_x, max_y)
    }

    #[test]
    fn empty_mask_has_no_contours() {
        let mask = mask_from(16, 16, |_, _| false);
        let contours = mask_to_polygon(&mask, 64, 48, ContourOptions::default());
        assert!(contours.is_empty());
    }

    #[test]
    fn full_mask_encloses_whole_frame() {
        let mask = mask_from(8, 8, |_, _| true);
        let contours = mask_to_polygon(&mask, 40, 30, ContourOptions::default());
        assert_eq!(contours.len(), 1);
        assert_eq!(bounds(&contours[0]), (0, 0, 39, 29));
    }

    #[test]
    fn full_mask_with_approximation_still_one_contour() {
        let mask = mask_from(8, 8, |_, _| true);
        let options = ContourOptions {
            resampling: Resampling::Nearest,
            approximate: true,
        };
        let contours = mask_to_polygon(&mask, 40, 30, options);
        assert_eq!(contours.len(), 1);
        assert_eq!(bounds(&contours[0]), (0, 0, 39, 29));
    }

    #[test]
    fn disjoint_blobs_yield_one_contour_each() {
        let mask = mask_from(20, 10, |x, y| (2..6).contains(&y) && ((2..6).contains(&x) || (12..18).contains(&x)));
        let contours = mask_to_polygon(&mask, 20, 10, ContourOptions::default());
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn holes_and_nested_blobs_are_ignored() {
        // Ring from 2..18 with a hole from 6..14 and an island at 9..11.
        let mask = mask_from(20, 20, |x, y| {
            let ring = (2..18).contains(&x) && (2..18).contains(&y);
            let hole = (6..14).contains(&x) && (6..14).contains(&y);
            let island = (9..11).contains(&x) && (9..11).contains(&y);
            (ring && !hole) || island
        });
        let contours = mask_to_polygon(&mask, 20, 20, ContourOptions::default());
        assert_eq!(contours.len(), 1);
        assert_eq!(bounds(&contours[0]), (2, 2, 17, 17));
    }

    #[test]
    fn cutoff_is_strictly_above_one_half() {
        let mask = Mask::from_pixel(4, 4, Luma([0.5]));
        assert!(mask_to_polygon(&mask, 4, 4, ContourOptions::default()).is_empty());
        let mask = Mask::from_pixel(4, 4, Luma([0.51]));
        assert_eq!(mask_to_polygon(&mask, 4, 4, ContourOptions::default()).len(), 1);
    }

    #[test]
    fn approximation_reduces_point_count() {
        let mask = mask_from(40, 40, |x, y| (5..30).contains(&x) && (8..20).contains(&y));
        let raw = mask_to_polygon(&mask, 40, 40, ContourOptions::default());
        let approx = mask_to_polygon(
            &mask,
            40,
            40,
            ContourOptions {
                approximate: true,
                ..ContourOptions::default()
            },
        );
        assert_eq!(raw.len(), 1);
        assert_eq!(approx.len(), 1);
        assert!(approx[0].len() >= 4);
        assert!(approx[0].len() < raw[0].len());
    }

    #[test]
    fn mask_is_scaled_to_frame() {
        let mask = mask_from(10, 10, |x, y| x < 5 && y < 5);
        let contours = mask_to_polygon(
            &mask,
            100,
            100,
            ContourOptions {
                resampling: Resampling::Nearest,
                approximate: false,
            },
        );
        assert_eq!(contours.len(), 1);
        assert_eq!(bounds(&contours[0]), (0, 0, 49, 49));
    }

    #[test]
    fn blob_cut_off_by_frame_edge_keeps_outline() {
        // Object running off the right and bottom edges.
        let mask = mask_from(20, 20, |x, y| x >= 12 && y >= 5);
        let contours = mask_to_polygon(&mask, 20, 20, ContourOptions::default());
        assert_eq!(contours.len(), 1);
        assert_eq!(bounds(&contours[0]), (12, 5, 19, 19));
    }

    #[test]
    fn resampling_parses_names() {
        assert_eq!("nearest".parse::<Resampling>().unwrap(), Resampling::Nearest);
        assert_eq!("Bilinear".parse::<Resampling>().unwrap(), Resampling::Bilinear);
        assert!("cubic".parse::<Resampling>().is_err());
    }
}
