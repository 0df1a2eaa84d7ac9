use std::sync::Mutex;

use tempfile::NamedTempFile;

use zone_sentinel::SentineldConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTINEL_CONFIG",
        "SENTINEL_CAMERA_SOURCE",
        "SENTINEL_CONFIDENCE",
        "SENTINEL_COOLDOWN_SECS",
        "SENTINEL_QUEUE_SIZE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model": {
            "confidence_threshold": 0.7,
            "target_classes": [0, 16]
        },
        "camera": {
            "source": "file:///var/frames",
            "width": 800,
            "height": 600
        },
        "system": {
            "queue_size": 4,
            "limit_fps": false,
            "reconnect_on_failure": false
        },
        "alerts": {
            "cooldown_seconds": 30,
            "mqtt": {
                "enabled": true,
                "broker_host": "broker.local",
                "topic": "cameras/front"
            }
        },
        "output": {
            "frame_save_interval": 5
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SENTINEL_CONFIG", file.path());
    std::env::set_var("SENTINEL_COOLDOWN_SECS", "90");

    let cfg = SentineldConfig::load().expect("load config");

    assert_eq!(cfg.model.confidence_threshold, 0.7);
    assert_eq!(cfg.model.target_classes, vec![0, 16]);
    assert_eq!(cfg.camera.source, "file:///var/frames");
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.camera.height, 600);
    assert_eq!(cfg.system.queue_size, 4);
    assert!(!cfg.system.limit_fps);
    assert!(!cfg.system.reconnect_on_failure);
    // env override wins over the file value
    assert_eq!(cfg.alerts.cooldown_seconds, 90);
    let mqtt = cfg.alerts.mqtt.expect("mqtt enabled");
    assert_eq!(mqtt.broker_host, "broker.local");
    assert_eq!(mqtt.broker_port, 1883);
    assert_eq!(mqtt.topic, "cameras/front");
    assert!(cfg.alerts.bot.is_none());
    assert_eq!(cfg.output.frame_save_interval, 5);
    // unspecified sections fall back to defaults
    assert_eq!(cfg.system.target_fps, 15);
    assert_eq!(cfg.zones.len(), 2);

    clear_env();
}

#[test]
fn missing_file_writes_defaults_back() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::TempDir::new().expect("temp dir");
    let path = dir.path().join("config/sentinel.json");
    assert!(!path.exists());

    let cfg = SentineldConfig::load_from(&path).expect("load defaults");
    assert_eq!(cfg.system.queue_size, 10);
    assert_eq!(cfg.alerts.cooldown_seconds, 60);
    assert!(path.exists());

    // The written file loads back to the same settings.
    let reloaded = SentineldConfig::load_from(&path).expect("reload");
    assert_eq!(reloaded.system.queue_size, cfg.system.queue_size);
    assert_eq!(reloaded.zones.len(), cfg.zones.len());

    clear_env();
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{"model": {"confidence_threshold": 2.0}}"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    assert!(SentineldConfig::load_from(file.path()).is_err());

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{"system": {"queue_size": 0}}"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    assert!(SentineldConfig::load_from(file.path()).is_err());

    clear_env();
}

#[test]
fn bad_env_override_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{}").expect("write config");
    std::env::set_var("SENTINEL_QUEUE_SIZE", "lots");
    assert!(SentineldConfig::load_from(file.path()).is_err());

    clear_env();
}
