// src/notify/slack.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{base_url, http_client, Notifier};
use crate::config::NotificationSinkConfig;

const SLACK_API: &str = "https://slack.com/api";

pub struct SlackNotifier {
    api: String,
    token: String,
    channel_id: String,
    client: Client,
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn from_config(cfg: &NotificationSinkConfig) -> Result<Self> {
        Ok(Self {
            api: base_url(cfg, SLACK_API),
            token: cfg.require("token")?.to_string(),
            channel_id: cfg.require("channel_id")?.trim().to_string(),
            client: http_client()?,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let text = format!("*{subject}*\n{body}");
        let payload = serde_json::json!({ "channel": self.channel_id, "text": text });

        let rsp: SlackResponse = self
            .client
            .post(format!("{}/chat.postMessage", self.api))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .context("slack post")?
            .error_for_status()
            .context("slack non-2xx")?
            .json()
            .await
            .context("slack response body")?;

        // Slack reports most failures with 200 + ok=false.
        if !rsp.ok {
            return Err(anyhow!(
                "slack rejected message: {}",
                rsp.error.unwrap_or_else(|| "unknown error".into())
            ));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slack"
    }
}
