use anyhow::Result;
use image::{Rgb, RgbImage};

use super::{FrameSource, SourceStats};

pub const DEFAULT_SYNTHETIC_FRAMES: u64 = 300;

/// Finite source of generated frames for `stub://` URIs.
///
/// Frames are a slowly shifting gradient with a bright square that moves
/// across the scene, enough to exercise drawing and display code without a
/// camera.
pub struct SyntheticSource {
    name: String,
    width: u32,
    height: u32,
    frame_limit: u64,
    frame_count: u64,
    connected: bool,
}

impl SyntheticSource {
    pub fn new(name: impl Into<String>, width: u32, height: u32, frame_limit: u64) -> Self {
        Self {
            name: name.into(),
            width: width.max(1),
            height: height.max(1),
            frame_limit,
            frame_count: 0,
            connected: false,
        }
    }

    fn generate(&self) -> RgbImage {
        let shift = self.frame_count as u32;
        let side = (self.width.min(self.height) / 4).max(1);
        let square_x = (shift * 4) % self.width.max(side);
        let square_y = self.height / 2 - side.min(self.height) / 2;
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let inside = x >= square_x && x < square_x + side && y >= square_y && y < square_y + side;
            if inside {
                Rgb([240, 240, 240])
            } else {
                Rgb([
                    ((x + shift) % 256) as u8,
                    ((y + shift / 2) % 256) as u8,
                    64,
                ])
            }
        })
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "SyntheticSource: connected to stub://{} ({}x{}, {} frames)",
            self.name,
            self.width,
            self.height,
            self.frame_limit
        );
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        if !self.connected || self.frame_count >= self.frame_limit {
            return Ok(None);
        }
        let frame = self.generate();
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: format!("stub://{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_frames_until_limit() -> Result<()> {
        let mut source = SyntheticSource::new("test", 64, 48, 2);
        source.connect()?;
        assert!(source.read_frame()?.is_some());
        assert!(source.read_frame()?.is_some());
        assert!(source.read_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn frames_change_over_time() -> Result<()> {
        let mut source = SyntheticSource::new("test", 64, 48, 5);
        source.connect()?;
        let first = source.read_frame()?.unwrap();
        let second = source.read_frame()?.unwrap();
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn unconnected_source_has_no_frames() -> Result<()> {
        let mut source = SyntheticSource::new("test", 8, 8, 5);
        assert!(source.read_frame()?.is_none());
        Ok(())
    }
}
