//! MQTT alert transport.
//!
//! Publishes two messages per alert: the structured detection record on
//! `<topic>/event` and the snapshot JPEG on `<topic>/snapshot`. A fresh
//! connection is made per send; alerts are rare enough (cooldown-gated) that
//! holding a session open buys nothing.

use anyhow::{anyhow, Result};
use rumqttc::{Client, Event, MqttOptions, Outgoing, QoS};
use std::time::Duration;

use super::AlertChannel;
use crate::Detection;

#[derive(Clone, Debug)]
pub struct MqttConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub topic: String,
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            topic: "sentinel/alerts".to_string(),
            client_id: "zone-sentinel".to_string(),
        }
    }
}

pub struct MqttChannel {
    config: MqttConfig,
}

impl MqttChannel {
    pub fn new(config: MqttConfig) -> Self {
        Self { config }
    }
}

impl AlertChannel for MqttChannel {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn send(&self, image: &[u8], detections: &[Detection]) -> Result<()> {
        let mut options = MqttOptions::new(
            &self.config.client_id,
            &self.config.broker_host,
            self.config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(5));

        let (client, mut connection) = Client::new(options, 10);
        let payload = serde_json::to_vec(detections)?;
        client.publish(
            format!("{}/event", self.config.topic),
            QoS::AtLeastOnce,
            false,
            payload,
        )?;
        client.publish(
            format!("{}/snapshot", self.config.topic),
            QoS::AtLeastOnce,
            false,
            image.to_vec(),
        )?;
        client.disconnect()?;

        // Drive the event loop until the disconnect goes out; surfacing the
        // first connection error instead of spinning forever.
        for event in connection.iter() {
            match event {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                Ok(_) => {}
                Err(e) => return Err(anyhow!("mqtt connection error: {}", e)),
            }
        }
        Ok(())
    }
}
