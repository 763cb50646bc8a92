use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::config::ModelSettings;
use crate::detect::backend::SegmentationModel;
use crate::detect::backends::StubSegmenter;
use crate::detect::result::ClassNames;

/// Segmentation backends known to the binary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelBackend {
    /// Scripted detections loaded from a JSON fixture.
    Stub,
    /// ONNX export run through tract.
    Tract,
}

impl ModelBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelBackend::Stub => "stub",
            ModelBackend::Tract => "tract",
        }
    }
}

impl FromStr for ModelBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "stub" => Ok(ModelBackend::Stub),
            "tract" | "onnx" => Ok(ModelBackend::Tract),
            other => Err(anyhow!("unknown model backend '{}'", other)),
        }
    }
}

/// Construct the configured backend.
///
/// `model_path` is only consulted by file-backed backends; the stub reads
/// `settings.fixture` instead.
pub fn build_model(settings: &ModelSettings, model_path: &Path) -> Result<Box<dyn SegmentationModel>> {
    let backend: ModelBackend = settings.backend.parse()?;
    let class_names = ClassNames::new(settings.class_names.clone());
    log::info!("loading {} segmentation backend", backend.as_str());
    match backend {
        ModelBackend::Stub => {
            let fixture = settings
                .fixture
                .as_deref()
                .ok_or_else(|| anyhow!("stub backend requires model.fixture"))?;
            let model = StubSegmenter::from_fixture(fixture, class_names)?;
            Ok(Box::new(model))
        }
        ModelBackend::Tract => build_tract(settings, model_path, class_names),
    }
}

#[cfg(feature = "backend-tract")]
fn build_tract(
    settings: &ModelSettings,
    model_path: &Path,
    class_names: ClassNames,
) -> Result<Box<dyn SegmentationModel>> {
    use crate::detect::backends::TractSegmenter;

    if !model_path.is_file() {
        return Err(anyhow!("model file {} not found", model_path.display()));
    }
    let model = TractSegmenter::new(
        model_path,
        settings.input_width,
        settings.input_height,
        class_names,
    )?
    .with_min_confidence(settings.min_confidence)
    .with_iou_threshold(settings.iou_threshold);
    Ok(Box::new(model))
}

#[cfg(not(feature = "backend-tract"))]
fn build_tract(
    _settings: &ModelSettings,
    model_path: &Path,
    _class_names: ClassNames,
) -> Result<Box<dyn SegmentationModel>> {
    Err(anyhow!(
        "cannot load {}: segcam was built without the backend-tract feature",
        model_path.display()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SegcamConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_backend_names() {
        assert_eq!("Stub".parse::<ModelBackend>().unwrap(), ModelBackend::Stub);
        assert_eq!("onnx".parse::<ModelBackend>().unwrap(), ModelBackend::Tract);
        assert!("cuda".parse::<ModelBackend>().is_err());
    }

    #[test]
    fn builds_stub_from_fixture() {
        let mut fixture = NamedTempFile::new().unwrap();
        write!(
            fixture,
            r#"{{"class_names": ["person"], "objects": [{{"class_id": 0, "confidence": 0.9, "box": [1, 1, 20, 20]}}]}}"#
        )
        .unwrap();
        let mut settings = SegcamConfig::default().model;
        settings.backend = "stub".into();
        settings.fixture = Some(fixture.path().to_path_buf());
        let model = build_model(&settings, Path::new("unused.onnx")).unwrap();
        assert_eq!(model.name(), "stub");
        assert_eq!(model.class_names().name(0), "person");
    }

    #[test]
    fn missing_model_file_fails_before_any_frame() {
        let settings = SegcamConfig::default().model;
        assert!(build_model(&settings, Path::new("/nonexistent/best_v9.onnx")).is_err());
    }
}
