// src/notify/telegram.rs
use anyhow::{Context, Result};
use reqwest::Client;

use super::{base_url, http_client, Notifier};
use crate::config::NotificationSinkConfig;

const TELEGRAM_API: &str = "https://api.telegram.org";

pub struct TelegramNotifier {
    api: String,
    token: String,
    chat_id: i64,
    client: Client,
}

impl TelegramNotifier {
    pub fn from_config(cfg: &NotificationSinkConfig) -> Result<Self> {
        let raw = cfg.require("chat_id")?;
        let chat_id = raw
            .trim()
            .parse::<i64>()
            .with_context(|| format!("invalid telegram chat_id: {raw:?}"))?;
        Ok(Self {
            api: base_url(cfg, TELEGRAM_API),
            token: cfg.require("token")?.to_string(),
            chat_id,
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": format!("{subject}\n\n{body}"),
        });
        self.client
            .post(format!("{}/bot{}/sendMessage", self.api, self.token))
            .json(&payload)
            .send()
            .await
            .context("telegram post")?
            .error_for_status()
            .context("telegram non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
