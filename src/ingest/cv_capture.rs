//! OpenCV `VideoCapture` source for cameras the V4L2 path does not cover.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use opencv::core::Mat;
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};

use super::{FrameSource, SourceStats};

pub struct OpenCvSource {
    index: i32,
    width: u32,
    height: u32,
    capture: Option<VideoCapture>,
    frame_count: u64,
}

impl OpenCvSource {
    pub fn new(index: i32, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            capture: None,
            frame_count: 0,
        }
    }
}

/// Log a capture property the driver refused. Returns whether it was taken.
fn property_applied(index: i32, name: &str, value: u32, outcome: opencv::Result<bool>) -> bool {
    match outcome {
        Ok(true) => true,
        Ok(false) => {
            log::warn!("OpenCvSource: camera {} ignored {} {}", index, name, value);
            false
        }
        Err(err) => {
            log::warn!(
                "OpenCvSource: failed to set {} on camera {}: {}",
                name,
                index,
                err
            );
            false
        }
    }
}

impl FrameSource for OpenCvSource {
    fn connect(&mut self) -> Result<()> {
        let mut capture = VideoCapture::new(self.index, videoio::CAP_ANY)
            .with_context(|| format!("open camera {}", self.index))?;
        if !capture.is_opened()? {
            return Err(anyhow!("camera {} could not be opened", self.index));
        }
        // Resolution hints are best effort; the driver may pick another mode.
        for (prop, name, value) in [
            (videoio::CAP_PROP_FRAME_WIDTH, "width", self.width),
            (videoio::CAP_PROP_FRAME_HEIGHT, "height", self.height),
        ] {
            let outcome = capture.set(prop, f64::from(value));
            property_applied(self.index, name, value, outcome);
        }
        log::info!(
            "OpenCvSource: connected to camera {} ({}x{})",
            self.index,
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32
        );
        self.capture = Some(capture);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let capture = self.capture.as_mut().context("camera not connected")?;
        let mut bgr = Mat::default();
        if !capture.read(&mut bgr)? || bgr.empty() {
            return Ok(None);
        }
        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let frame = RgbImage::from_raw(width, height, rgb.data_bytes()?.to_vec())
            .ok_or_else(|| anyhow!("camera frame has unexpected layout"))?;
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn is_healthy(&self) -> bool {
        self.capture
            .as_ref()
            .map(|capture| capture.is_opened().unwrap_or(false))
            .unwrap_or(true)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: format!("opencv:{}", self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_properties_are_reported() {
        assert!(property_applied(0, "width", 640, Ok(true)));
        assert!(!property_applied(0, "width", 640, Ok(false)));
        let err = opencv::Error::new(opencv::core::StsError, "backend rejected property");
        assert!(!property_applied(0, "height", 480, Err(err)));
    }

    #[test]
    fn unconnected_source_reports_stats() {
        let source = OpenCvSource::new(2, 640, 480);
        assert!(source.is_healthy());
        assert_eq!(source.stats().uri, "opencv:2");
        assert_eq!(source.stats().frames_captured, 0);
    }
}
