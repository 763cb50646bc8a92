//! Live session loop.
//!
//! One iteration: read a frame, mirror it, run the model, draw detections
//! above the current threshold, show the frame, then poll for a key. The
//! session owns the confidence threshold; keys move it in 0.05 steps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ab_glyph::FontVec;
use anyhow::Result;
use image::RgbImage;

use crate::config::SegcamConfig;
use crate::detect::{pair_detections, SegmentationModel};
use crate::display::DisplaySink;
use crate::ingest::{FrameSource, SourceStats};
use crate::overlay::{ConfidenceThreshold, OverlayPipeline, RgbSurface};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Stopped,
}

/// What a key press asks the session to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Raise,
    Lower,
    Ignore,
}

impl From<char> for KeyAction {
    fn from(key: char) -> Self {
        match key {
            'q' => KeyAction::Quit,
            '+' | '=' => KeyAction::Raise,
            '-' => KeyAction::Lower,
            _ => KeyAction::Ignore,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    SourceExhausted,
    ReadFailed,
    Interrupted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub detections_drawn: u64,
    pub final_threshold: f32,
    pub stop_reason: StopReason,
    pub source: SourceStats,
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub window_name: String,
    pub mirror: bool,
    pub poll_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            window_name: "segcam".to_string(),
            mirror: true,
            poll_timeout: Duration::from_millis(1),
        }
    }
}

pub struct Session {
    state: SessionState,
    threshold: ConfidenceThreshold,
    pipeline: OverlayPipeline,
    font: Option<FontVec>,
    options: SessionOptions,
    frames: u64,
    detections_drawn: u64,
}

impl Session {
    pub fn new(
        options: SessionOptions,
        pipeline: OverlayPipeline,
        threshold: ConfidenceThreshold,
        font: Option<FontVec>,
    ) -> Self {
        Self {
            state: SessionState::Running,
            threshold,
            pipeline,
            font,
            options,
            frames: 0,
            detections_drawn: 0,
        }
    }

    pub fn from_config(cfg: &SegcamConfig, font: Option<FontVec>) -> Self {
        let options = SessionOptions {
            window_name: cfg.display.window_name.clone(),
            mirror: cfg.camera.mirror,
            poll_timeout: cfg.display.poll_timeout,
        };
        Self::new(
            options,
            OverlayPipeline::new(cfg.overlay_options()),
            cfg.overlay.initial_threshold,
            font,
        )
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn threshold(&self) -> ConfidenceThreshold {
        self.threshold
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Apply a key press. Keys arriving after the session stopped are ignored.
    pub fn handle_key(&mut self, key: char) -> SessionState {
        if self.state == SessionState::Stopped {
            return self.state;
        }
        match KeyAction::from(key) {
            KeyAction::Quit => {
                log::info!("quit requested");
                self.state = SessionState::Stopped;
            }
            KeyAction::Raise => {
                let value = self.threshold.raise();
                log::info!("Confidence threshold increased to {:.2}", value);
            }
            KeyAction::Lower => {
                let value = self.threshold.lower();
                log::info!("Confidence threshold decreased to {:.2}", value);
            }
            KeyAction::Ignore => {}
        }
        self.state
    }

    /// Mirror (if enabled), infer and draw onto `frame` in place.
    ///
    /// Returns the number of detections drawn.
    pub fn process_frame(
        &mut self,
        frame: &mut RgbImage,
        model: &mut dyn SegmentationModel,
    ) -> Result<usize> {
        if self.options.mirror {
            image::imageops::flip_horizontal_in_place(frame);
        }
        let detections = pair_detections(model.infer(frame)?);
        let mut surface = RgbSurface::new(frame, self.font.as_ref());
        let drawn = self
            .pipeline
            .annotate(&mut surface, &detections, self.threshold, model.class_names());
        self.frames += 1;
        self.detections_drawn += drawn as u64;
        Ok(drawn)
    }

    /// Run one iteration. `Some(reason)` means the session has stopped.
    pub fn step(
        &mut self,
        source: &mut dyn FrameSource,
        model: &mut dyn SegmentationModel,
        sink: &mut dyn DisplaySink,
    ) -> Result<Option<StopReason>> {
        let mut frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                self.state = SessionState::Stopped;
                if !source.is_healthy() {
                    log::error!("frame source stopped delivering frames");
                    return Ok(Some(StopReason::ReadFailed));
                }
                log::info!("frame source has no more frames");
                return Ok(Some(StopReason::SourceExhausted));
            }
            Err(err) => {
                log::error!("failed to read frame: {:#}", err);
                self.state = SessionState::Stopped;
                return Ok(Some(StopReason::ReadFailed));
            }
        };

        self.process_frame(&mut frame, model)?;
        sink.show(&self.options.window_name, &frame)?;

        if let Some(key) = sink.poll_key(self.options.poll_timeout)? {
            if self.handle_key(key) == SessionState::Stopped {
                return Ok(Some(StopReason::QuitKey));
            }
        }
        Ok(None)
    }

    /// Loop until quit, source exhaustion, a read failure or `interrupt`.
    ///
    /// The sink is closed on every exit path.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        model: &mut dyn SegmentationModel,
        sink: &mut dyn DisplaySink,
        interrupt: &AtomicBool,
    ) -> Result<SessionSummary> {
        let outcome = self.drive(source, model, sink, interrupt);
        let closed = sink.close();
        let stop_reason = outcome?;
        closed?;
        let stats = source.stats();
        log::info!(
            "session stopped ({:?}) after {} frames, threshold {}; {} captured {} frames",
            stop_reason,
            self.frames,
            self.threshold,
            stats.uri,
            stats.frames_captured
        );
        Ok(SessionSummary {
            frames: self.frames,
            detections_drawn: self.detections_drawn,
            final_threshold: self.threshold.value(),
            stop_reason,
            source: stats,
        })
    }

    fn drive(
        &mut self,
        source: &mut dyn FrameSource,
        model: &mut dyn SegmentationModel,
        sink: &mut dyn DisplaySink,
        interrupt: &AtomicBool,
    ) -> Result<StopReason> {
        loop {
            if interrupt.load(Ordering::SeqCst) {
                log::info!("interrupted");
                self.state = SessionState::Stopped;
                return Ok(StopReason::Interrupted);
            }
            if let Some(reason) = self.step(source, model, sink)? {
                return Ok(reason);
            }
        }
    }
}
