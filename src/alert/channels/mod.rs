//! Alert transport channels.
//!
//! Each channel is an independent transport for one alert payload (snapshot
//! JPEG + detection records). Channels are fanned out on their own threads by
//! the dispatcher; a channel's failure or latency never blocks another's, so
//! implementations are free to be slow or flaky without destabilizing the
//! pipeline.

mod bot;
mod mqtt;

pub use bot::{BotChannel, BotConfig};
pub use mqtt::{MqttChannel, MqttConfig};

use anyhow::Result;

use crate::Detection;

/// One alert transport.
pub trait AlertChannel: Send + Sync {
    /// Channel identifier for logs and `test_channels` results.
    fn name(&self) -> &str;

    /// Deliver one alert payload. Retry/backoff policy is the transport's
    /// own business; the dispatcher never retries.
    fn send(&self, image: &[u8], detections: &[Detection]) -> Result<()>;
}

/// Human-readable caption shared by the transports.
pub(crate) fn format_caption(detections: &[Detection]) -> String {
    let mut lines = vec![
        "INTRUDER ALERT".to_string(),
        format!("Detections: {}", detections.len()),
    ];
    for (i, det) in detections.iter().enumerate() {
        lines.push(format!(
            "Detection {}: {} in zone {} (confidence: {:.2})",
            i + 1,
            det.class_name,
            det.zone_id,
            det.confidence
        ));
    }
    lines.join("\n")
}

/// In-memory channel for tests: records payload sizes, optionally fails.
pub struct StubChannel {
    name: String,
    fail: bool,
    sent: std::sync::Mutex<Vec<usize>>,
}

impl StubChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: true,
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("stub channel lock poisoned").len()
    }
}

impl AlertChannel for StubChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, image: &[u8], _detections: &[Detection]) -> Result<()> {
        if self.fail {
            anyhow::bail!("stub channel {} configured to fail", self.name);
        }
        self.sent
            .lock()
            .expect("stub channel lock poisoned")
            .push(image.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    #[test]
    fn caption_lists_each_detection() {
        let detections = vec![Detection {
            class_name: "person".to_string(),
            class_id: 0,
            confidence: 0.91,
            zone_id: "zone1".to_string(),
            timestamp_s: 0,
            bbox: BoundingBox::new(0, 0, 10, 10),
        }];
        let caption = format_caption(&detections);
        assert!(caption.contains("Detections: 1"));
        assert!(caption.contains("person in zone zone1"));
    }
}
