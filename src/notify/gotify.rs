// src/notify/gotify.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{http_client, Notifier};
use crate::config::NotificationSinkConfig;

/// Self-hosted Gotify server; `endpoint` is mandatory.
pub struct GotifyNotifier {
    endpoint: String,
    token: String,
    client: Client,
}

#[derive(Serialize)]
struct GotifyMessage<'a> {
    title: &'a str,
    message: &'a str,
    priority: u8,
}

impl GotifyNotifier {
    pub fn from_config(cfg: &NotificationSinkConfig) -> Result<Self> {
        let endpoint = cfg.endpoint.trim().trim_end_matches('/');
        if endpoint.is_empty() {
            return Err(anyhow!("gotify requires an endpoint"));
        }
        Ok(Self {
            endpoint: endpoint.to_string(),
            token: cfg.require("token")?.to_string(),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl Notifier for GotifyNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        self.client
            .post(format!("{}/message", self.endpoint))
            .header("X-Gotify-Key", &self.token)
            .json(&GotifyMessage {
                title: subject,
                message: body,
                priority: 5,
            })
            .send()
            .await
            .context("gotify post")?
            .error_for_status()
            .context("gotify non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gotify"
    }
}
