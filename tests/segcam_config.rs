use std::sync::Mutex;

use tempfile::NamedTempFile;

use segcam::config::SegcamConfig;
use segcam::overlay::Resampling;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SEGCAM_CONFIG",
        "SEGCAM_SOURCE",
        "SEGCAM_MODEL_BACKEND",
        "SEGCAM_MODEL_PATH",
        "SEGCAM_INITIAL_THRESHOLD",
        "SEGCAM_FONT_PATH",
        "SEGCAM_APPROXIMATE",
        "SEGCAM_DISPLAY",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
            [camera]
            source = "v4l2:/dev/video2"
            mirror = false
            width = 1280
            height = 720

            [model]
            path_template = "weights/seg_v{version}.onnx"
            class_names = ["person", "cup"]
            iou_threshold = 0.6

            [overlay]
            initial_threshold = 0.3
            resampling = "nearest"

            [display]
            backend = "headless"
            window_name = "Preview"
        "#,
    );

    std::env::set_var("SEGCAM_CONFIG", file.path());
    std::env::set_var("SEGCAM_SOURCE", "stub://bench");
    std::env::set_var("SEGCAM_INITIAL_THRESHOLD", "0.65");
    std::env::set_var("SEGCAM_APPROXIMATE", "true");

    let cfg = SegcamConfig::load(None).expect("load config");

    assert_eq!(cfg.camera.source, "stub://bench");
    assert!(!cfg.camera.mirror);
    assert_eq!((cfg.camera.width, cfg.camera.height), (1280, 720));
    assert_eq!(cfg.model.class_names, vec!["person", "cup"]);
    assert!((cfg.model.iou_threshold - 0.6).abs() < 1e-6);
    assert!((cfg.overlay.initial_threshold.value() - 0.65).abs() < 1e-6);
    assert!(cfg.overlay.approximate_contours);
    assert_eq!(cfg.overlay.resampling, Resampling::Nearest);
    assert_eq!(cfg.display.backend, "headless");
    assert_eq!(cfg.display.window_name, "Preview");
    assert_eq!(
        cfg.model_path(4),
        std::path::PathBuf::from("weights/seg_v4.onnx")
    );

    clear_env();
}

#[test]
fn explicit_path_beats_env_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let env_file = write_config("[camera]\nsource = \"stub://from-env\"\n");
    let cli_file = write_config("[camera]\nsource = \"stub://from-cli\"\n");
    std::env::set_var("SEGCAM_CONFIG", env_file.path());

    let cfg = SegcamConfig::load(Some(cli_file.path())).expect("load config");
    assert_eq!(cfg.camera.source, "stub://from-cli");

    clear_env();
}

#[test]
fn initial_threshold_is_clamped() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config("[overlay]\ninitial_threshold = 1.4\n");
    let cfg = SegcamConfig::load(Some(file.path())).expect("load config");
    assert!((cfg.overlay.initial_threshold.value() - 0.95).abs() < 1e-6);

    std::env::set_var("SEGCAM_INITIAL_THRESHOLD", "0.01");
    let cfg = SegcamConfig::load(Some(file.path())).expect("load config");
    assert!((cfg.overlay.initial_threshold.value() - 0.05).abs() < 1e-6);

    clear_env();
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let bad_backend = write_config("[model]\nbackend = \"cuda\"\n");
    assert!(SegcamConfig::load(Some(bad_backend.path())).is_err());

    let unknown_section = write_config("[network]\nport = 80\n");
    assert!(SegcamConfig::load(Some(unknown_section.path())).is_err());

    let ok = write_config("");
    std::env::set_var("SEGCAM_INITIAL_THRESHOLD", "high");
    assert!(SegcamConfig::load(Some(ok.path())).is_err());
    std::env::remove_var("SEGCAM_INITIAL_THRESHOLD");

    std::env::set_var("SEGCAM_APPROXIMATE", "sometimes");
    assert!(SegcamConfig::load(Some(ok.path())).is_err());

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let err = SegcamConfig::load(Some(std::path::Path::new("/nonexistent/segcam.toml")))
        .expect_err("missing file");
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}

#[test]
fn demo_config_loads() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let cfg = SegcamConfig::load(Some(&root.join("demos/segcam.toml"))).expect("demo config");
    assert_eq!(cfg.model.backend, "stub");
    assert_eq!(cfg.display.backend, "headless");
    assert!(!cfg.needs_model_version());

    let fixture = root.join(cfg.model.fixture.as_ref().unwrap());
    let mut settings = cfg.model.clone();
    settings.fixture = Some(fixture);
    let model = segcam::build_model(&settings, std::path::Path::new("unused")).expect("stub model");
    assert_eq!(model.class_names().name(7), "class 7");

    clear_env();
}
