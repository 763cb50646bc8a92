//! segcam: live instance-segmentation overlay for webcams.
//!
//! # Architecture
//!
//! A single-threaded loop pulls frames from a [`FrameSource`], runs a
//! [`SegmentationModel`], and draws every detection whose confidence clears
//! the session threshold: the box, the outer contours of its mask, and a
//! `"<class> <confidence>"` label. The current threshold is drawn in the
//! corner and can be moved with `+`/`=` and `-` while running; `q` quits.
//!
//! A second tool, `split_dataset`, partitions a YOLO-style image/label
//! dataset into train and validation subsets.
//!
//! # Module Structure
//!
//! - `config`: TOML configuration with `SEGCAM_*` environment overrides
//! - `detect`: model trait, stub and ONNX backends, detection pairing
//! - `ingest`: frame sources (synthetic, image directory, V4L2, OpenCV)
//! - `overlay`: threshold, palette, contour extraction and drawing
//! - `display`: frame sinks (headless, OpenCV window)
//! - `session`: key handling and the per-frame loop
//! - `dataset`: train/val splitting
//! - `ui`: terminal stage and progress reporting

pub mod config;
pub mod dataset;
pub mod detect;
pub mod display;
pub mod ingest;
pub mod overlay;
pub mod session;
pub mod ui;

pub use config::SegcamConfig;
pub use dataset::{split_dataset, SplitConfig, SplitSummary};
pub use detect::{
    build_model, pair_detections, BoundingBox, ClassNames, Detection, RawSegmentation,
    SegmentationModel,
};
pub use display::{open_sink, DisplaySink, HeadlessSink};
pub use ingest::{open_source, FrameSource};
pub use overlay::{filter_detections, mask_to_polygon, ConfidenceThreshold, OverlayPipeline};
pub use session::{Session, SessionState, SessionSummary, StopReason};
