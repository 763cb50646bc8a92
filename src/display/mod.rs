//! Where annotated frames go.

mod headless;
#[cfg(feature = "opencv")]
mod highgui;

use std::time::Duration;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::config::DisplaySettings;

pub use headless::HeadlessSink;
#[cfg(feature = "opencv")]
pub use highgui::HighguiSink;

/// A window (or stand-in) that shows frames and reports key presses.
pub trait DisplaySink {
    fn show(&mut self, window: &str, frame: &RgbImage) -> Result<()>;

    /// Wait up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Result<Option<char>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Build the sink named by `settings.backend`.
pub fn open_sink(settings: &DisplaySettings) -> Result<Box<dyn DisplaySink>> {
    match settings.backend.as_str() {
        "headless" => Ok(Box::new(HeadlessSink::new(settings.output_dir.clone())?)),
        "highgui" => open_highgui(settings),
        other => Err(anyhow!("unknown display backend '{}'", other)),
    }
}

#[cfg(feature = "opencv")]
fn open_highgui(settings: &DisplaySettings) -> Result<Box<dyn DisplaySink>> {
    Ok(Box::new(HighguiSink::new(&settings.window_name)?))
}

#[cfg(not(feature = "opencv"))]
fn open_highgui(_settings: &DisplaySettings) -> Result<Box<dyn DisplaySink>> {
    Err(anyhow!(
        "highgui display needs the opencv feature; use display.backend = \"headless\""
    ))
}
