// src/notify/pushover.rs
use anyhow::{Context, Result};
use reqwest::Client;

use super::{base_url, http_client, Notifier};
use crate::config::NotificationSinkConfig;

const PUSHOVER_API: &str = "https://api.pushover.net/1";

pub struct PushoverNotifier {
    api: String,
    token: String,
    recipient_id: String,
    client: Client,
}

impl PushoverNotifier {
    pub fn from_config(cfg: &NotificationSinkConfig) -> Result<Self> {
        Ok(Self {
            api: base_url(cfg, PUSHOVER_API),
            token: cfg.require("token")?.to_string(),
            recipient_id: cfg.require("recipient_id")?.to_string(),
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for PushoverNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let form = [
            ("token", self.token.as_str()),
            ("user", self.recipient_id.as_str()),
            ("title", subject),
            ("message", body),
        ];
        self.client
            .post(format!("{}/messages.json", self.api))
            .form(&form)
            .send()
            .await
            .context("pushover post")?
            .error_for_status()
            .context("pushover non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "pushover"
    }
}
