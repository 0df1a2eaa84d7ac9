//! Chat-bot alert transport (Telegram Bot API shape).
//!
//! Uploads the snapshot via `sendPhoto` with a caption listing the
//! detections. The multipart body is assembled by hand; the payload is one
//! photo and two text fields, which does not justify a multipart crate.

use anyhow::{anyhow, Result};
use url::Url;

use super::{format_caption, AlertChannel};
use crate::Detection;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub bot_token: String,
    pub chat_id: String,
    /// Override for tests; defaults to the public Bot API.
    pub api_base: String,
}

impl BotConfig {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

pub struct BotChannel {
    config: BotConfig,
}

impl BotChannel {
    pub fn new(config: BotConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() || config.chat_id.trim().is_empty() {
            return Err(anyhow!("bot channel requires bot_token and chat_id"));
        }
        Url::parse(&config.api_base).map_err(|e| anyhow!("invalid bot api base: {}", e))?;
        Ok(Self { config })
    }

    fn build_multipart(&self, boundary: &str, image: &[u8], caption: &str) -> Vec<u8> {
        let mut body = Vec::with_capacity(image.len() + 1024);
        let mut text_part = |name: &str, value: &str| {
            body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            );
            body.extend_from_slice(value.as_bytes());
            body.extend_from_slice(b"\r\n");
        };
        text_part("chat_id", &self.config.chat_id);
        text_part("caption", caption);

        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            b"Content-Disposition: form-data; name=\"photo\"; filename=\"alert.jpg\"\r\n",
        );
        body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(image);
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        body
    }
}

impl AlertChannel for BotChannel {
    fn name(&self) -> &str {
        "bot"
    }

    fn send(&self, image: &[u8], detections: &[Detection]) -> Result<()> {
        let caption = format_caption(detections);
        let boundary = format!("sentinel{:016x}", rand::random::<u64>());
        let body = self.build_multipart(&boundary, image, &caption);

        let url = format!(
            "{}/bot{}/sendPhoto",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        );
        let response = ureq::post(&url)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .map_err(|e| anyhow!("bot send failed: {}", e))?;
        if response.status() != 200 {
            return Err(anyhow!("bot api returned status {}", response.status()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_credentials() {
        assert!(BotChannel::new(BotConfig::new("", "42")).is_err());
        assert!(BotChannel::new(BotConfig::new("token", "")).is_err());
        assert!(BotChannel::new(BotConfig::new("token", "42")).is_ok());
    }

    #[test]
    fn multipart_body_contains_fields_and_photo() {
        let channel = BotChannel::new(BotConfig::new("token", "42")).unwrap();
        let body = channel.build_multipart("XX", &[0xFF, 0xD8], "caption text");
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("name=\"chat_id\""));
        assert!(text.contains("name=\"caption\""));
        assert!(text.contains("filename=\"alert.jpg\""));
        assert!(text.ends_with("--XX--\r\n"));
    }
}
