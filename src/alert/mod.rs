//! Cooldown-gated alert dispatch and multi-channel fan-out.
//!
//! One dispatcher instance gates all alerts behind a single cooldown window,
//! global across zones: an intrusion anywhere suppresses further alerts until
//! the window elapses. The gate mutex protects only the read-check-and-set of
//! the last dispatch time; artifact persistence and channel sends happen
//! after it is released, so channel I/O never serializes against new cooldown
//! decisions and never blocks the output stage.
//!
//! Channel sends are fire-and-forget threads. A channel failure is logged and
//! fully isolated: it cannot affect the committed cooldown, other channels,
//! or the caller, and it is never retried.

pub mod channels;

pub use channels::{AlertChannel, BotChannel, BotConfig, MqttChannel, MqttConfig, StubChannel};

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::AlertSettings;
use crate::render::{Renderer, SoftwareRenderer};
use crate::{now_s, Detection, Frame};

/// An immutable alert batch: the detections, the snapshot, and when.
pub struct AlertEvent {
    pub detections: Vec<Detection>,
    pub snapshot_jpeg: Vec<u8>,
    pub timestamp_s: u64,
}

/// Rate-limited fan-out to alert channels.
pub struct AlertDispatcher {
    enabled: bool,
    cooldown: Duration,
    last_dispatch: Mutex<Option<Instant>>,
    channels: Vec<Arc<dyn AlertChannel>>,
    history_dir: PathBuf,
}

impl AlertDispatcher {
    pub fn new(enabled: bool, cooldown: Duration, history_dir: &Path) -> Self {
        Self {
            enabled,
            cooldown,
            last_dispatch: Mutex::new(None),
            channels: Vec::new(),
            history_dir: history_dir.to_path_buf(),
        }
    }

    /// Build the dispatcher with the channels the configuration enables.
    pub fn from_settings(settings: &AlertSettings) -> Result<Self> {
        let mut dispatcher = Self::new(
            settings.enabled,
            Duration::from_secs(settings.cooldown_seconds),
            &settings.history_dir,
        );
        if let Some(mqtt) = &settings.mqtt {
            dispatcher.add_channel(Arc::new(MqttChannel::new(MqttConfig {
                broker_host: mqtt.broker_host.clone(),
                broker_port: mqtt.broker_port,
                topic: mqtt.topic.clone(),
                ..MqttConfig::default()
            })));
        }
        if let Some(bot) = &settings.bot {
            dispatcher.add_channel(Arc::new(BotChannel::new(BotConfig::new(
                &bot.bot_token,
                &bot.chat_id,
            ))?));
        }
        Ok(dispatcher)
    }

    pub fn add_channel(&mut self, channel: Arc<dyn AlertChannel>) {
        self.channels.push(channel);
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Dispatch an alert if the cooldown window has elapsed.
    ///
    /// Returns `Ok(false)` with zero side effects when the gate holds.
    /// On gate pass: the cooldown is committed first, the snapshot and the
    /// sidecar detection record are persisted synchronously, then every
    /// channel receives the payload on its own thread.
    pub fn maybe_dispatch(&self, detections: &[Detection], snapshot: &Frame) -> Result<bool> {
        if !self.enabled || detections.is_empty() {
            return Ok(false);
        }

        {
            let mut last = self.last_dispatch.lock().expect("cooldown lock poisoned");
            if let Some(at) = *last {
                if at.elapsed() < self.cooldown {
                    log::debug!("alert cooldown active, skipping");
                    return Ok(false);
                }
            }
            *last = Some(Instant::now());
        }

        let event = Arc::new(AlertEvent {
            detections: detections.to_vec(),
            snapshot_jpeg: snapshot.to_jpeg()?,
            timestamp_s: now_s()?,
        });
        self.persist_event(&event)?;
        self.fan_out(&event);
        Ok(true)
    }

    /// Write the `alert_<ts>.jpg` / `alert_<ts>.json` artifact pair.
    fn persist_event(&self, event: &AlertEvent) -> Result<()> {
        std::fs::create_dir_all(&self.history_dir)?;
        let image_path = self
            .history_dir
            .join(format!("alert_{}.jpg", event.timestamp_s));
        std::fs::write(&image_path, &event.snapshot_jpeg)?;

        let meta_path = self
            .history_dir
            .join(format!("alert_{}.json", event.timestamp_s));
        let json = serde_json::to_string_pretty(&event.detections)?;
        std::fs::write(&meta_path, json)?;
        log::info!("alert artifacts written to {}", image_path.display());
        Ok(())
    }

    fn fan_out(&self, event: &Arc<AlertEvent>) {
        for channel in &self.channels {
            let channel = Arc::clone(channel);
            let event = Arc::clone(event);
            std::thread::spawn(move || {
                match channel.send(&event.snapshot_jpeg, &event.detections) {
                    Ok(()) => log::info!("{} alert sent", channel.name()),
                    Err(e) => log::error!("{} alert failed: {}", channel.name(), e),
                }
            });
        }
    }

    /// Synchronously exercise every channel with a synthetic payload.
    ///
    /// Bypasses the cooldown gate; used for configuration validation, not
    /// for live alerts.
    pub fn test_channels(&self) -> BTreeMap<String, bool> {
        let payload = test_payload();
        let detections = vec![Detection {
            class_name: "person".to_string(),
            class_id: 0,
            confidence: 0.95,
            zone_id: "test_zone".to_string(),
            timestamp_s: now_s().unwrap_or(0),
            bbox: crate::BoundingBox::new(50, 50, 150, 250),
        }];

        let mut results = BTreeMap::new();
        for channel in &self.channels {
            let ok = match channel.send(&payload, &detections) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("channel {} test failed: {}", channel.name(), e);
                    false
                }
            };
            results.insert(channel.name().to_string(), ok);
        }
        results
    }
}

fn test_payload() -> Vec<u8> {
    let mut frame = Frame::new(vec![0u8; 400 * 300 * 3], 400, 300, 0, 0);
    let renderer = SoftwareRenderer::new();
    renderer.draw_text(&mut frame, "TEST ALERT", 160, 145, [255, 255, 255]);
    frame.to_jpeg().unwrap_or_default()
}
