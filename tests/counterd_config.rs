use std::sync::Mutex;

use tempfile::NamedTempFile;

use flock_counter::config::CounterdConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FLOCK_CONFIG",
        "FLOCK_LISTEN_ADDR",
        "FLOCK_TARGET_CLASS",
        "FLOCK_MIN_CONFIDENCE",
        "FLOCK_CAMERAS",
        "FLOCK_JPEG_QUALITY",
        "FLOCK_FRAME_WIDTH",
        "FLOCK_FRAME_HEIGHT",
        "FLOCK_DETECTOR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "server": { "listen_addr": "0.0.0.0:9100" },
        "detection": { "target_class": "goat", "min_confidence": 0.6 },
        "video": {
            "cameras": ["stub://north", "/srv/herd/frames"],
            "width": 800,
            "height": 600,
            "jpeg_quality": 70
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("FLOCK_CONFIG", file.path());
    std::env::set_var("FLOCK_MIN_CONFIDENCE", "0.9");
    std::env::set_var("FLOCK_CAMERAS", "stub://east, stub://west");

    let cfg = CounterdConfig::load().expect("load config");

    assert_eq!(cfg.listen_addr, "0.0.0.0:9100");
    assert_eq!(cfg.policy.target_class, "goat");
    assert_eq!(cfg.policy.min_confidence, 0.9);
    assert_eq!(cfg.video.cameras, vec!["stub://east", "stub://west"]);
    assert_eq!((cfg.video.width, cfg.video.height), (800, 600));
    assert_eq!(cfg.video.jpeg_quality, 70);
    assert_eq!(cfg.detector, "scripted-herd");

    let settings = cfg.controller_settings();
    assert_eq!(settings.pipeline.jpeg_quality, 70);
    assert_eq!(settings.source.cameras.len(), 2);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
        [server]
        listen_addr = "127.0.0.1:9200"

        [detection]
        detector = "scripted-herd"
        min_confidence = 0.5

        [video]
        target_fps = 5
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    std::env::set_var("FLOCK_CONFIG", file.path());

    let cfg = CounterdConfig::load().expect("load config");
    assert_eq!(cfg.listen_addr, "127.0.0.1:9200");
    assert_eq!(cfg.policy.min_confidence, 0.5);
    assert_eq!(cfg.policy.target_class, "sheep");
    assert_eq!(cfg.video.target_fps, 5);
    assert_eq!(cfg.video.cameras, vec!["stub://pasture"]);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CounterdConfig::load().expect("load config");
    assert_eq!(cfg.listen_addr, "127.0.0.1:8765");
    assert_eq!(cfg.policy.min_confidence, 0.82);
    assert_eq!((cfg.video.width, cfg.video.height), (640, 480));
    assert_eq!(cfg.video.jpeg_quality, 80);
}

#[test]
fn rejects_invalid_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FLOCK_MIN_CONFIDENCE", "1.7");
    assert!(CounterdConfig::load().is_err());
    clear_env();

    std::env::set_var("FLOCK_JPEG_QUALITY", "loud");
    assert!(CounterdConfig::load().is_err());
    clear_env();

    std::env::set_var("FLOCK_FRAME_WIDTH", "0");
    assert!(CounterdConfig::load().is_err());
    clear_env();
}
