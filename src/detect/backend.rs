use anyhow::Result;
use image::RgbImage;

use crate::detect::result::{ClassNames, RawSegmentation};

/// Instance-segmentation model backend.
///
/// Backends are black boxes to the overlay pipeline: they receive the
/// (already mirrored) frame and return aligned box/mask arrays. Boxes are in
/// frame pixel coordinates; masks are at the model's input resolution and
/// are resized to the frame by the pipeline.
pub trait SegmentationModel {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Display names indexed by class id.
    fn class_names(&self) -> &ClassNames;

    /// Run inference on a frame.
    fn infer(&mut self, frame: &RgbImage) -> Result<RawSegmentation>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
