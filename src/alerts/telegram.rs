//! Telegram notifier
//!
//! Delivers alerts via the Telegram Bot API.

use std::time::Duration;

use super::Notifier;
use crate::error::MonitorError;

/// Telegram notification service
pub struct TelegramNotifier {
    bot_token: String,
    client: reqwest::Client,
    enabled: bool,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, enabled: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            bot_token,
            client,
            enabled,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        if bot_token.is_empty() {
            return None;
        }
        Some(Self::new(bot_token, true))
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, destination: &str, message: &str) -> anyhow::Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);
        let payload = serde_json::json!({
            "chat_id": destination,
            "text": message,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::Notify(format!("Telegram API error: {status} - {body}")).into());
        }

        Ok(true)
    }

    fn is_enabled(&self) -> bool {
        self.enabled && !self.bot_token.is_empty()
    }
}
