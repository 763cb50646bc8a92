use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;
use opencv::core::{Mat, Scalar, CV_8UC3};
use opencv::highgui;
use opencv::imgproc;
use opencv::prelude::*;

use super::DisplaySink;

/// OpenCV window.
pub struct HighguiSink {
    window: String,
    open: bool,
}

impl HighguiSink {
    pub fn new(window: &str) -> Result<Self> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE)
            .with_context(|| format!("open display window '{}'", window))?;
        Ok(Self {
            window: window.to_string(),
            open: true,
        })
    }
}

fn to_bgr_mat(frame: &RgbImage) -> Result<Mat> {
    let (width, height) = frame.dimensions();
    let mut rgb = Mat::new_rows_cols_with_default(
        height as i32,
        width as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(frame.as_raw());
    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

impl DisplaySink for HighguiSink {
    fn show(&mut self, window: &str, frame: &RgbImage) -> Result<()> {
        let bgr = to_bgr_mat(frame)?;
        highgui::imshow(window, &bgr)?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>> {
        let millis = timeout.as_millis().clamp(1, i32::MAX as u128) as i32;
        let key = highgui::wait_key(millis)?;
        if key < 0 {
            return Ok(None);
        }
        Ok(Some(((key & 0xFF) as u8) as char))
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            highgui::destroy_window(&self.window)?;
        }
        Ok(())
    }
}

impl Drop for HighguiSink {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("HighguiSink: failed to close window: {}", err);
        }
    }
}
