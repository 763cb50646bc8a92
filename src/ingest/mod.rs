//! Frame sources for the live session.
//!
//! A source is selected by URI:
//! - `stub://name[?frames=N]`: synthetic frames for tests and camera-less runs
//! - `dir:PATH`: still images from a directory, in lexical order
//! - `v4l2:DEVICE`: local V4L2 device (feature: ingest-v4l2)
//! - `opencv:INDEX`: OpenCV `VideoCapture` (feature: opencv)
//!
//! Every source yields RGB frames. `Ok(None)` means no frame is available
//! any more; the session treats it the same as a read failure and stops.

mod dir;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
#[cfg(feature = "opencv")]
pub mod cv_capture;
mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::config::CameraSettings;

pub use dir::DirectorySource;
#[cfg(feature = "opencv")]
pub use cv_capture::OpenCvSource;
pub use synthetic::{SyntheticSource, DEFAULT_SYNTHETIC_FRAMES};
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Camera-like producer of RGB frames.
pub trait FrameSource {
    /// Open the underlying device or directory.
    fn connect(&mut self) -> Result<()>;

    /// Next frame, or `None` once the source has nothing more to give.
    fn read_frame(&mut self) -> Result<Option<RgbImage>>;

    fn is_healthy(&self) -> bool {
        true
    }

    fn stats(&self) -> SourceStats;
}

/// Statistics for a frame source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub uri: String,
}

/// Parsed `camera.source` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceUri {
    Synthetic { name: String, frames: u64 },
    Directory(String),
    V4l2(String),
    OpenCv(i32),
}

impl SourceUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        if let Some(rest) = uri.strip_prefix("stub://") {
            let (name, frames) = match rest.split_once("?frames=") {
                Some((name, count)) => {
                    let frames = count
                        .parse()
                        .map_err(|_| anyhow!("invalid frame count in source {}", uri))?;
                    (name, frames)
                }
                None => (rest, DEFAULT_SYNTHETIC_FRAMES),
            };
            return Ok(SourceUri::Synthetic {
                name: name.to_string(),
                frames,
            });
        }
        if let Some(path) = uri.strip_prefix("dir:") {
            if path.is_empty() {
                return Err(anyhow!("dir: source needs a path"));
            }
            return Ok(SourceUri::Directory(path.to_string()));
        }
        if let Some(device) = uri.strip_prefix("v4l2:") {
            if device.is_empty() {
                return Err(anyhow!("v4l2: source needs a device path"));
            }
            return Ok(SourceUri::V4l2(device.to_string()));
        }
        if let Some(index) = uri.strip_prefix("opencv:") {
            let index = index
                .parse()
                .map_err(|_| anyhow!("opencv: source needs a camera index, got {}", uri))?;
            return Ok(SourceUri::OpenCv(index));
        }
        Err(anyhow!(
            "unsupported source '{}' (expected stub://, dir:, v4l2: or opencv:)",
            uri
        ))
    }
}

/// Build the source named by `settings.source`. The source is not yet connected.
pub fn open_source(settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    match SourceUri::parse(&settings.source)? {
        SourceUri::Synthetic { name, frames } => Ok(Box::new(SyntheticSource::new(
            name,
            settings.width,
            settings.height,
            frames,
        ))),
        SourceUri::Directory(path) => Ok(Box::new(DirectorySource::new(path))),
        SourceUri::V4l2(device) => open_v4l2(device, settings),
        SourceUri::OpenCv(index) => open_opencv(index, settings),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_v4l2(device: String, settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::new(v4l2::V4l2Config {
        device,
        target_fps: settings.target_fps,
        width: settings.width,
        height: settings.height,
    })))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_v4l2(device: String, _settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "cannot open {}: segcam was built without the ingest-v4l2 feature",
        device
    ))
}

#[cfg(feature = "opencv")]
fn open_opencv(index: i32, settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(OpenCvSource::new(index, settings.width, settings.height)))
}

#[cfg(not(feature = "opencv"))]
fn open_opencv(index: i32, _settings: &CameraSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow!(
        "cannot open camera {}: segcam was built without the opencv feature",
        index
    ))
}
