// src/notify/discord.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;

use super::{base_url, http_client, Notifier};
use crate::config::NotificationSinkConfig;

const DISCORD_API: &str = "https://discord.com/api/v10";

/// Posts to a channel as a bot user.
#[derive(Clone)]
pub struct DiscordNotifier {
    api: String,
    token: String,
    channel_id: String,
    client: Client,
}

impl DiscordNotifier {
    pub fn from_config(cfg: &NotificationSinkConfig) -> Result<Self> {
        Ok(Self {
            api: base_url(cfg, DISCORD_API),
            token: cfg.require("token")?.to_string(),
            channel_id: cfg.require("channel_id")?.trim().to_string(),
            client: http_client()?,
        })
    }
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    description: String,
}

#[derive(Serialize)]
struct DiscordMessagePayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}

impl DiscordMessagePayload {
    fn embed(title: &str, description: &str) -> Self {
        Self {
            content: None,
            embeds: vec![DiscordEmbed {
                title: title.to_string(),
                description: description.to_string(),
            }],
        }
    }
}

#[async_trait::async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let payload = DiscordMessagePayload::embed(subject, body);

        let rsp = self
            .client
            .post(format!("{}/channels/{}/messages", self.api, self.channel_id))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .json(&payload)
            .send()
            .await
            .context("discord request failed")?;

        if let Err(e) = rsp.error_for_status_ref() {
            return Err(anyhow!("discord HTTP error: {e}"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "discord"
    }
}
