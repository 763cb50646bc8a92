//! segcam - live segmentation overlay
//!
//! Reads frames from the configured camera, runs the segmentation model and
//! shows boxes, mask outlines and labels for everything above the confidence
//! threshold.
//!
//! Keys: `q` quit, `+`/`=` raise the threshold, `-` lower it.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use segcam::overlay::load_font;
use segcam::ui::Ui;
use segcam::{build_model, open_sink, open_source, SegcamConfig, Session};

#[derive(Parser, Debug)]
#[command(name = "segcam", about = "Live instance segmentation overlay for webcams")]
struct Args {
    /// Path to a TOML config file (defaults to $SEGCAM_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Model version substituted into model.path_template; prompted for when omitted
    #[arg(long, value_name = "N")]
    model_version: Option<u32>,

    /// Frame source URI (stub://name, dir:PATH, v4l2:DEVICE, opencv:INDEX)
    #[arg(long, value_name = "URI")]
    source: Option<String>,

    /// Run without a window, writing annotated frames to DIR
    #[arg(long, value_name = "DIR")]
    headless_out: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, env = "SEGCAM_UI", default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal(), false);

    let mut cfg = SegcamConfig::load(args.config.as_deref())?;
    if let Some(source) = args.source {
        cfg.camera.source = source;
    }
    if let Some(dir) = args.headless_out {
        cfg.display.backend = "headless".to_string();
        cfg.display.output_dir = Some(dir);
    }

    let model_path = if cfg.needs_model_version() {
        let version = match args.model_version {
            Some(version) => version,
            None => prompt_version()?,
        };
        cfg.model_path(version)
    } else {
        cfg.model_path(0)
    };

    let mut model = {
        let _stage = ui.stage("Load model");
        let mut model = build_model(&cfg.model, &model_path)?;
        model.warm_up().context("model warm-up failed")?;
        model
    };
    let class_names = model.class_names();
    if class_names.is_empty() {
        log::warn!("{} has no class names; labels show class ids", model.name());
    } else {
        log::info!("{} knows {} classes", model.name(), class_names.len());
    }

    let font = match cfg.resolve_font_path() {
        Some(path) => match load_font(&path) {
            Ok(font) => Some(font),
            Err(err) => {
                log::warn!("labels disabled: {:#}", err);
                None
            }
        },
        None => {
            log::warn!("no font found; set overlay.font_path to draw labels");
            None
        }
    };

    let mut source = {
        let _stage = ui.stage("Open camera");
        let mut source = open_source(&cfg.camera)?;
        source
            .connect()
            .with_context(|| format!("could not open camera {}", cfg.camera.source))?;
        source
    };
    let mut sink = open_sink(&cfg.display)?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;

    log::info!(
        "running {} on {} (threshold {}); keys: q quit, +/= raise, - lower",
        model.name(),
        cfg.camera.source,
        cfg.overlay.initial_threshold
    );
    let mut session = Session::from_config(&cfg, font);
    let summary = session.run(
        source.as_mut(),
        model.as_mut(),
        sink.as_mut(),
        &interrupted,
    )?;

    println!(
        "segcam: {} frames, {} detections drawn, final threshold {:.2} ({:?})",
        summary.frames, summary.detections_drawn, summary.final_threshold, summary.stop_reason
    );
    println!(
        "source {}: {} frames captured",
        summary.source.uri, summary.source.frames_captured
    );
    Ok(())
}

/// Ask for the model version on stdin.
fn prompt_version() -> Result<u32> {
    print!("Version: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let trimmed = line.trim();
    trimmed
        .parse()
        .map_err(|_| anyhow!("model version must be a non-negative integer, got '{}'", trimmed))
}
