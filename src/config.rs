use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::overlay::{ConfidenceThreshold, OverlayOptions, Resampling, DEFAULT_THRESHOLD};

const DEFAULT_SOURCE: &str = "v4l2:/dev/video0";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_MODEL_BACKEND: &str = "tract";
const DEFAULT_MODEL_PATH_TEMPLATE: &str = "models/best_v{version}.onnx";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_MIN_CONFIDENCE: f32 = 0.05;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_LINE_THICKNESS: u32 = 2;
const DEFAULT_DISPLAY_BACKEND: &str = "highgui";
const DEFAULT_WINDOW_NAME: &str = "YOLOv11 Segmentation";
const DEFAULT_POLL_TIMEOUT_MS: u64 = 1;

/// Font files tried in order when `overlay.font_path` is not set.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const KNOWN_MODEL_BACKENDS: &[&str] = &["tract", "stub"];
const KNOWN_DISPLAY_BACKENDS: &[&str] = &["highgui", "headless"];

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SegcamConfigFile {
    camera: Option<CameraConfigFile>,
    model: Option<ModelConfigFile>,
    overlay: Option<OverlayConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    source: Option<String>,
    mirror: Option<bool>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    path_template: Option<String>,
    fixture: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    min_confidence: Option<f32>,
    iou_threshold: Option<f32>,
    class_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    initial_threshold: Option<f32>,
    approximate_contours: Option<bool>,
    resampling: Option<String>,
    font_path: Option<PathBuf>,
    line_thickness: Option<u32>,
    label_scale: Option<f32>,
    hud_scale: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    backend: Option<String>,
    window_name: Option<String>,
    poll_timeout_ms: Option<u64>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SegcamConfig {
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub overlay: OverlaySettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    /// Source URI: `stub://name`, `dir:PATH`, `v4l2:DEVICE` or `opencv:INDEX`.
    pub source: String,
    /// Flip frames horizontally before inference.
    pub mirror: bool,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: String,
    /// Model file path; `{version}` is replaced by the chosen version number.
    pub path_template: String,
    /// JSON fixture for the stub backend.
    pub fixture: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub min_confidence: f32,
    pub iou_threshold: f32,
    pub class_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub initial_threshold: ConfidenceThreshold,
    pub approximate_contours: bool,
    pub resampling: Resampling,
    pub font_path: Option<PathBuf>,
    pub line_thickness: u32,
    pub label_scale: f32,
    pub hud_scale: f32,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub backend: String,
    pub window_name: String,
    pub poll_timeout: Duration,
    /// Where the headless sink writes annotated frames, if anywhere.
    pub output_dir: Option<PathBuf>,
}

impl Default for SegcamConfig {
    fn default() -> Self {
        Self::assemble(SegcamConfigFile::default(), Resampling::default())
    }
}

impl SegcamConfig {
    /// Load configuration from `path`, or from `SEGCAM_CONFIG` when no path
    /// is given, then apply `SEGCAM_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("SEGCAM_CONFIG").ok().map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SegcamConfigFile) -> Result<Self> {
        let resampling = match file
            .overlay
            .as_ref()
            .and_then(|overlay| overlay.resampling.as_deref())
        {
            Some(name) => name.parse()?,
            None => Resampling::default(),
        };
        Ok(Self::assemble(file, resampling))
    }

    fn assemble(file: SegcamConfigFile, resampling: Resampling) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            source: camera_file
                .source
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            mirror: camera_file.mirror.unwrap_or(true),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
        };

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            backend: model_file
                .backend
                .unwrap_or_else(|| DEFAULT_MODEL_BACKEND.to_string()),
            path_template: model_file
                .path_template
                .unwrap_or_else(|| DEFAULT_MODEL_PATH_TEMPLATE.to_string()),
            fixture: model_file.fixture,
            input_width: model_file.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: model_file.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
            min_confidence: model_file.min_confidence.unwrap_or(DEFAULT_MIN_CONFIDENCE),
            iou_threshold: model_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            class_names: model_file.class_names.unwrap_or_default(),
        };

        let overlay_file = file.overlay.unwrap_or_default();
        let defaults = OverlayOptions::default();
        let overlay = OverlaySettings {
            initial_threshold: ConfidenceThreshold::new(
                overlay_file.initial_threshold.unwrap_or(DEFAULT_THRESHOLD),
            ),
            approximate_contours: overlay_file.approximate_contours.unwrap_or(false),
            resampling,
            font_path: overlay_file.font_path,
            line_thickness: overlay_file.line_thickness.unwrap_or(DEFAULT_LINE_THICKNESS),
            label_scale: overlay_file.label_scale.unwrap_or(defaults.label_scale),
            hud_scale: overlay_file.hud_scale.unwrap_or(defaults.hud_scale),
        };

        let display_file = file.display.unwrap_or_default();
        let display = DisplaySettings {
            backend: display_file
                .backend
                .unwrap_or_else(|| DEFAULT_DISPLAY_BACKEND.to_string()),
            window_name: display_file
                .window_name
                .unwrap_or_else(|| DEFAULT_WINDOW_NAME.to_string()),
            poll_timeout: Duration::from_millis(
                display_file.poll_timeout_ms.unwrap_or(DEFAULT_POLL_TIMEOUT_MS),
            ),
            output_dir: display_file.output_dir,
        };

        Self {
            camera,
            model,
            overlay,
            display,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(source) = non_empty_env("SEGCAM_SOURCE") {
            self.camera.source = source;
        }
        if let Some(backend) = non_empty_env("SEGCAM_MODEL_BACKEND") {
            self.model.backend = backend;
        }
        if let Some(template) = non_empty_env("SEGCAM_MODEL_PATH") {
            self.model.path_template = template;
        }
        if let Some(threshold) = non_empty_env("SEGCAM_INITIAL_THRESHOLD") {
            let value: f32 = threshold
                .parse()
                .map_err(|_| anyhow!("SEGCAM_INITIAL_THRESHOLD must be a number"))?;
            self.overlay.initial_threshold = ConfidenceThreshold::new(value);
        }
        if let Some(path) = non_empty_env("SEGCAM_FONT_PATH") {
            self.overlay.font_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = non_empty_env("SEGCAM_APPROXIMATE") {
            self.overlay.approximate_contours = parse_bool(&flag)
                .ok_or_else(|| anyhow!("SEGCAM_APPROXIMATE must be true/false"))?;
        }
        if let Some(backend) = non_empty_env("SEGCAM_DISPLAY") {
            self.display.backend = backend;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        self.model.backend = self.model.backend.to_ascii_lowercase();
        if !KNOWN_MODEL_BACKENDS.contains(&self.model.backend.as_str()) {
            return Err(anyhow!(
                "unknown model backend '{}' (expected one of {:?})",
                self.model.backend,
                KNOWN_MODEL_BACKENDS
            ));
        }
        self.display.backend = self.display.backend.to_ascii_lowercase();
        if !KNOWN_DISPLAY_BACKENDS.contains(&self.display.backend.as_str()) {
            return Err(anyhow!(
                "unknown display backend '{}' (expected one of {:?})",
                self.display.backend,
                KNOWN_DISPLAY_BACKENDS
            ));
        }
        if self.camera.source.trim().is_empty() {
            return Err(anyhow!("camera source must not be empty"));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(anyhow!("model input size must be non-zero"));
        }
        if !(self.model.iou_threshold > 0.0 && self.model.iou_threshold <= 1.0) {
            return Err(anyhow!("model iou_threshold must be in (0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.model.min_confidence) {
            return Err(anyhow!("model min_confidence must be in [0, 1]"));
        }
        if self.model.backend == "stub" && self.model.fixture.is_none() {
            return Err(anyhow!("stub model backend requires model.fixture"));
        }
        if self.overlay.line_thickness == 0 {
            return Err(anyhow!("overlay line_thickness must be at least 1"));
        }
        if self.overlay.label_scale <= 0.0 || self.overlay.hud_scale <= 0.0 {
            return Err(anyhow!("overlay text scales must be positive"));
        }
        if self.display.window_name.trim().is_empty() {
            return Err(anyhow!("display window_name must not be empty"));
        }
        if self.display.poll_timeout.is_zero() {
            // A zero wait would block the highgui loop until a key arrives.
            self.display.poll_timeout = Duration::from_millis(DEFAULT_POLL_TIMEOUT_MS);
        }
        Ok(())
    }

    /// Model path for a given version number.
    pub fn model_path(&self, version: u32) -> PathBuf {
        PathBuf::from(
            self.model
                .path_template
                .replace("{version}", &version.to_string()),
        )
    }

    /// Whether the model path depends on a version number.
    pub fn needs_model_version(&self) -> bool {
        self.model.backend != "stub" && self.model.path_template.contains("{version}")
    }

    /// Configured font, or the first existing system font.
    pub fn resolve_font_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.overlay.font_path {
            return Some(path.clone());
        }
        FONT_CANDIDATES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.is_file())
    }

    pub fn overlay_options(&self) -> OverlayOptions {
        OverlayOptions {
            resampling: self.overlay.resampling,
            approximate_contours: self.overlay.approximate_contours,
            line_thickness: self.overlay.line_thickness,
            label_scale: self.overlay.label_scale,
            hud_scale: self.overlay.hud_scale,
            ..OverlayOptions::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<SegcamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
