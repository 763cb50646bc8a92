use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;

use super::DisplaySink;

/// Display stand-in for machines without a screen.
///
/// Writes each frame as `frame_000001.png`, `frame_000002.png`, ... when an
/// output directory is set, and never reports a key press.
pub struct HeadlessSink {
    output_dir: Option<PathBuf>,
    frames_shown: u64,
}

impl HeadlessSink {
    pub fn new(output_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &output_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create frame output directory {}", dir.display()))?;
        }
        Ok(Self {
            output_dir,
            frames_shown: 0,
        })
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }
}

impl DisplaySink for HeadlessSink {
    fn show(&mut self, _window: &str, frame: &RgbImage) -> Result<()> {
        self.frames_shown += 1;
        if let Some(dir) = &self.output_dir {
            let path = dir.join(format!("frame_{:06}.png", self.frames_shown));
            frame
                .save(&path)
                .with_context(|| format!("write frame {}", path.display()))?;
        }
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> Result<Option<char>> {
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        log::info!("HeadlessSink: {} frames shown", self.frames_shown);
        Ok(())
    }
}
