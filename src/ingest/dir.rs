use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use super::{FrameSource, SourceStats};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays still images from a local directory in lexical file-name order.
pub struct DirectorySource {
    root: PathBuf,
    queue: Vec<PathBuf>,
    next_index: usize,
    frames_captured: u64,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            queue: Vec::new(),
            next_index: 0,
            frames_captured: 0,
        }
    }
}

fn is_frame_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for DirectorySource {
    fn connect(&mut self) -> Result<()> {
        if !self.root.is_dir() {
            return Err(anyhow!("frame directory {} not found", self.root.display()));
        }
        let mut queue = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("read frame directory {}", self.root.display()))?
        {
            let path = entry?.path();
            if path.is_file() && is_frame_file(&path) {
                queue.push(path);
            }
        }
        queue.sort();
        log::info!(
            "DirectorySource: connected to {} ({} frames)",
            self.root.display(),
            queue.len()
        );
        self.queue = queue;
        self.next_index = 0;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(path) = self.queue.get(self.next_index) else {
            return Ok(None);
        };
        let frame = image::open(path)
            .with_context(|| format!("decode frame {}", path.display()))?
            .to_rgb8();
        self.next_index += 1;
        self.frames_captured += 1;
        Ok(Some(frame))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frames_captured,
            uri: format!("dir:{}", self.root.display()),
        }
    }
}
