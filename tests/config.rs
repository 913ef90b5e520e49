use std::sync::Mutex;

use tempfile::NamedTempFile;

use detection_workbench::config::WorkbenchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "WORKBENCH_CONFIG",
        "WORKBENCH_DETECTORS_DIR",
        "WORKBENCH_OUTPUT_DIR",
        "WORKBENCH_MAX_FRAMES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
detectors_dir = "/srv/detectors"
output_dir = "/srv/out"

[source]
path = "stub://25"
max_frames = 10

[defaults]
flip_horizontal = false
show_confidence = true
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("WORKBENCH_CONFIG", file.path());
    std::env::set_var("WORKBENCH_OUTPUT_DIR", "/tmp/annotated");
    std::env::set_var("WORKBENCH_MAX_FRAMES", "4");

    let cfg = WorkbenchConfig::load().expect("load config");
    assert_eq!(cfg.detectors_dir.to_str(), Some("/srv/detectors"));
    assert_eq!(cfg.output_dir.to_str(), Some("/tmp/annotated"));
    assert_eq!(cfg.source.path.as_deref(), Some("stub://25"));
    assert_eq!(cfg.source.max_frames, Some(4));

    let options = cfg.initial_options();
    assert!(!options.flip_horizontal);
    assert!(options.show_confidence);
    assert_eq!(options.binary_threshold, 0);

    clear_env();
}

#[test]
fn defaults_apply_without_a_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = WorkbenchConfig::load().expect("load config");
    assert_eq!(cfg.detectors_dir.to_str(), Some("detector_paths"));
    assert_eq!(cfg.output_dir.to_str(), Some("workbench_out"));
    assert_eq!(cfg.source.path, None);
    assert!(cfg.initial_options().flip_horizontal);
    assert!(!cfg.initial_options().show_confidence);

    clear_env();
}

#[test]
fn rejects_bad_frame_limits() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("WORKBENCH_MAX_FRAMES", "lots");
    let err = WorkbenchConfig::load().unwrap_err();
    assert!(err.to_string().contains("WORKBENCH_MAX_FRAMES"));

    std::env::set_var("WORKBENCH_MAX_FRAMES", "0");
    assert!(WorkbenchConfig::load().is_err());

    clear_env();
}

#[test]
fn invalid_file_names_the_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"detectors_dir = [").expect("write config");
    std::env::set_var("WORKBENCH_CONFIG", file.path());

    let err = WorkbenchConfig::load().unwrap_err().to_string();
    assert!(err.starts_with("invalid config file"), "{err}");

    clear_env();
}
