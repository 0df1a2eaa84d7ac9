//! Daemon configuration.
//!
//! Configuration is a JSON file with env overrides layered on top, then
//! validated. A missing file (or a missing section) falls back to built-in
//! defaults; on first run the defaults are written back so operators have a
//! file to edit. Partial updates go through `ConfigPatch`, which enumerates
//! the fields that may change instead of deep-merging arbitrary structures.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::zones::ZoneRecord;

const DEFAULT_CONFIG_PATH: &str = "config/sentinel.json";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_CAMERA_SOURCE: &str = "synthetic://";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_QUEUE_SIZE: usize = 10;
const DEFAULT_TARGET_FPS: u32 = 15;
const DEFAULT_COOLDOWN_SECS: u64 = 60;
const DEFAULT_HISTORY_DIR: &str = "logs/alerts";
const DEFAULT_FRAMES_DIR: &str = "data/detections";
const DEFAULT_FRAME_SAVE_INTERVAL: u64 = 15;

// -------------------- File schema --------------------

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    model: Option<ModelFile>,
    camera: Option<CameraFile>,
    system: Option<SystemFile>,
    zones: Option<BTreeMap<String, ZoneRecord>>,
    alerts: Option<AlertsFile>,
    output: Option<OutputFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelFile {
    confidence_threshold: Option<f32>,
    target_classes: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraFile {
    source: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SystemFile {
    queue_size: Option<usize>,
    limit_fps: Option<bool>,
    target_fps: Option<u32>,
    reconnect_on_failure: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertsFile {
    enabled: Option<bool>,
    cooldown_seconds: Option<u64>,
    history_dir: Option<PathBuf>,
    mqtt: Option<MqttAlertsFile>,
    bot: Option<BotAlertsFile>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttAlertsFile {
    enabled: Option<bool>,
    broker_host: Option<String>,
    broker_port: Option<u16>,
    topic: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct BotAlertsFile {
    enabled: Option<bool>,
    bot_token: Option<String>,
    chat_id: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct OutputFile {
    save_detection_frames: Option<bool>,
    detection_frames_dir: Option<PathBuf>,
    frame_save_interval: Option<u64>,
}

// -------------------- Resolved settings --------------------

#[derive(Debug, Clone, Serialize)]
pub struct ModelSettings {
    pub confidence_threshold: f32,
    /// Detector class ids to keep; empty means all classes.
    pub target_classes: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraSettings {
    /// `synthetic://` or a directory of images (`file://<dir>`).
    pub source: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSettings {
    /// Capacity of both pipeline queues.
    pub queue_size: usize,
    pub limit_fps: bool,
    pub target_fps: u32,
    pub reconnect_on_failure: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertSettings {
    pub enabled: bool,
    pub cooldown_seconds: u64,
    pub history_dir: PathBuf,
    pub mqtt: Option<MqttAlertSettings>,
    pub bot: Option<BotAlertSettings>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MqttAlertSettings {
    pub broker_host: String,
    pub broker_port: u16,
    pub topic: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotAlertSettings {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutputSettings {
    pub save_detection_frames: bool,
    pub detection_frames_dir: PathBuf,
    /// Persist every Nth frame-with-detections.
    pub frame_save_interval: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentineldConfig {
    pub model: ModelSettings,
    pub camera: CameraSettings,
    pub system: SystemSettings,
    pub zones: BTreeMap<String, ZoneRecord>,
    pub alerts: AlertSettings,
    pub output: OutputSettings,
}

impl SentineldConfig {
    /// Load from `SENTINEL_CONFIG` (or the default path), layer env
    /// overrides, validate. A missing file yields defaults and writes them
    /// back so the operator has a file to edit.
    pub fn load() -> Result<Self> {
        let path = std::env::var("SENTINEL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
            let file: ConfigFile = serde_json::from_str(&raw)
                .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
            Self::from_file(file)
        } else {
            log::warn!(
                "config file {} not found, writing defaults",
                path.display()
            );
            let cfg = Self::from_file(ConfigFile::default());
            cfg.save(path)?;
            cfg
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let model = file.model.unwrap_or_default();
        let camera = file.camera.unwrap_or_default();
        let system = file.system.unwrap_or_default();
        let alerts = file.alerts.unwrap_or_default();
        let output = file.output.unwrap_or_default();

        // A present section is enabled unless it says otherwise, so a saved
        // resolved config loads back to the same settings.
        let mqtt = alerts.mqtt.and_then(|mqtt| {
            if mqtt.enabled.unwrap_or(true) {
                Some(MqttAlertSettings {
                    broker_host: mqtt.broker_host.unwrap_or_else(|| "localhost".to_string()),
                    broker_port: mqtt.broker_port.unwrap_or(1883),
                    topic: mqtt.topic.unwrap_or_else(|| "sentinel/alerts".to_string()),
                })
            } else {
                None
            }
        });
        let bot = alerts.bot.and_then(|bot| {
            if bot.enabled.unwrap_or(true) {
                Some(BotAlertSettings {
                    bot_token: bot.bot_token.unwrap_or_default(),
                    chat_id: bot.chat_id.unwrap_or_default(),
                })
            } else {
                None
            }
        });

        Self {
            model: ModelSettings {
                confidence_threshold: model.confidence_threshold.unwrap_or(DEFAULT_CONFIDENCE),
                target_classes: model.target_classes.unwrap_or_else(|| vec![0]),
            },
            camera: CameraSettings {
                source: camera
                    .source
                    .unwrap_or_else(|| DEFAULT_CAMERA_SOURCE.to_string()),
                width: camera.width.unwrap_or(DEFAULT_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_HEIGHT),
            },
            system: SystemSettings {
                queue_size: system.queue_size.unwrap_or(DEFAULT_QUEUE_SIZE),
                limit_fps: system.limit_fps.unwrap_or(true),
                target_fps: system.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                reconnect_on_failure: system.reconnect_on_failure.unwrap_or(true),
            },
            zones: file.zones.unwrap_or_else(default_zones),
            alerts: AlertSettings {
                enabled: alerts.enabled.unwrap_or(true),
                cooldown_seconds: alerts.cooldown_seconds.unwrap_or(DEFAULT_COOLDOWN_SECS),
                history_dir: alerts
                    .history_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_HISTORY_DIR)),
                mqtt,
                bot,
            },
            output: OutputSettings {
                save_detection_frames: output.save_detection_frames.unwrap_or(true),
                detection_frames_dir: output
                    .detection_frames_dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FRAMES_DIR)),
                frame_save_interval: output
                    .frame_save_interval
                    .unwrap_or(DEFAULT_FRAME_SAVE_INTERVAL),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(source) = std::env::var("SENTINEL_CAMERA_SOURCE") {
            if !source.trim().is_empty() {
                self.camera.source = source;
            }
        }
        if let Ok(confidence) = std::env::var("SENTINEL_CONFIDENCE") {
            self.model.confidence_threshold = confidence
                .parse()
                .map_err(|_| anyhow!("SENTINEL_CONFIDENCE must be a number"))?;
        }
        if let Ok(cooldown) = std::env::var("SENTINEL_COOLDOWN_SECS") {
            self.alerts.cooldown_seconds = cooldown
                .parse()
                .map_err(|_| anyhow!("SENTINEL_COOLDOWN_SECS must be an integer"))?;
        }
        if let Ok(queue) = std::env::var("SENTINEL_QUEUE_SIZE") {
            self.system.queue_size = queue
                .parse()
                .map_err(|_| anyhow!("SENTINEL_QUEUE_SIZE must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.model.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within 0..=1"));
        }
        if self.system.queue_size == 0 {
            return Err(anyhow!("queue_size must be greater than zero"));
        }
        if self.system.limit_fps && self.system.target_fps == 0 {
            return Err(anyhow!("target_fps must be greater than zero when limit_fps is set"));
        }
        if self.output.frame_save_interval == 0 {
            return Err(anyhow!("frame_save_interval must be greater than zero"));
        }
        if let Some(bot) = &self.alerts.bot {
            if bot.bot_token.trim().is_empty() || bot.chat_id.trim().is_empty() {
                return Err(anyhow!("bot alerts enabled but bot_token/chat_id missing"));
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow!("failed to write config {}: {}", path.display(), e))?;
        Ok(())
    }

    /// Apply a partial update. Only the fields enumerated on `ConfigPatch`
    /// can change; everything else is untouched. Re-validates afterwards.
    pub fn apply_patch(&mut self, patch: &ConfigPatch) -> Result<()> {
        if let Some(confidence) = patch.confidence_threshold {
            self.model.confidence_threshold = confidence;
        }
        if let Some(cooldown) = patch.cooldown_seconds {
            self.alerts.cooldown_seconds = cooldown;
        }
        if let Some(target_fps) = patch.target_fps {
            self.system.target_fps = target_fps;
        }
        if let Some(interval) = patch.frame_save_interval {
            self.output.frame_save_interval = interval;
        }
        if let Some(reconnect) = patch.reconnect_on_failure {
            self.system.reconnect_on_failure = reconnect;
        }
        self.validate()
    }
}

/// The set of fields a runtime update may change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub confidence_threshold: Option<f32>,
    pub cooldown_seconds: Option<u64>,
    pub target_fps: Option<u32>,
    pub frame_save_interval: Option<u64>,
    pub reconnect_on_failure: Option<bool>,
}

fn default_zones() -> BTreeMap<String, ZoneRecord> {
    let mut zones = BTreeMap::new();
    zones.insert(
        "zone1".to_string(),
        ZoneRecord {
            name: "Main Entrance".to_string(),
            points: vec![[100.0, 400.0], [300.0, 400.0], [300.0, 300.0], [100.0, 300.0]],
            color: [255, 0, 0],
            alert_enabled: true,
        },
    );
    zones.insert(
        "zone2".to_string(),
        ZoneRecord {
            name: "Side Door".to_string(),
            points: vec![[400.0, 400.0], [600.0, 400.0], [600.0, 300.0], [400.0, 300.0]],
            color: [0, 255, 0],
            alert_enabled: true,
        },
    );
    zones
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_include_two_zones() {
        let cfg = SentineldConfig::from_file(ConfigFile::default());
        assert_eq!(cfg.zones.len(), 2);
        assert_eq!(cfg.system.queue_size, DEFAULT_QUEUE_SIZE);
        assert!(cfg.alerts.mqtt.is_none());
    }

    #[test]
    fn patch_only_touches_enumerated_fields() {
        let mut cfg = SentineldConfig::from_file(ConfigFile::default());
        let source_before = cfg.camera.source.clone();
        cfg.apply_patch(&ConfigPatch {
            cooldown_seconds: Some(120),
            ..ConfigPatch::default()
        })
        .unwrap();
        assert_eq!(cfg.alerts.cooldown_seconds, 120);
        assert_eq!(cfg.camera.source, source_before);
    }

    #[test]
    fn patch_rejects_invalid_values() {
        let mut cfg = SentineldConfig::from_file(ConfigFile::default());
        assert!(cfg
            .apply_patch(&ConfigPatch {
                confidence_threshold: Some(1.5),
                ..ConfigPatch::default()
            })
            .is_err());
    }

    #[test]
    fn validate_rejects_zero_queue() {
        let mut cfg = SentineldConfig::from_file(ConfigFile::default());
        cfg.system.queue_size = 0;
        assert!(cfg.validate().is_err());
    }
}
