mod backend;
mod backends;
mod registry;
mod result;

pub use backend::SegmentationModel;
pub use backends::{ScriptedObject, StubSegmenter};
#[cfg(feature = "backend-tract")]
pub use backends::TractSegmenter;
pub use registry::{build_model, ModelBackend};
pub use result::{
    pair_detections, BoundingBox, BoxPrediction, ClassNames, Detection, Mask, RawSegmentation,
};
