// src/notify/pushbullet.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;

use super::{base_url, http_client, Notifier};
use crate::config::NotificationSinkConfig;

const PUSHBULLET_API: &str = "https://api.pushbullet.com/v2";

/// Pushes a note to the device with the configured nickname.
pub struct PushbulletNotifier {
    api: String,
    token: String,
    device_nickname: String,
    client: Client,
}

#[derive(Deserialize)]
struct DeviceList {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Deserialize)]
struct Device {
    iden: String,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    active: bool,
}

impl PushbulletNotifier {
    pub fn from_config(cfg: &NotificationSinkConfig) -> Result<Self> {
        Ok(Self {
            api: base_url(cfg, PUSHBULLET_API),
            token: cfg.require("token")?.to_string(),
            device_nickname: cfg.require("device_nickname")?.to_string(),
            client: http_client()?,
        })
    }

    async fn device_iden(&self) -> Result<String> {
        let list: DeviceList = self
            .client
            .get(format!("{}/devices", self.api))
            .header("Access-Token", &self.token)
            .send()
            .await
            .context("pushbullet list devices")?
            .error_for_status()
            .context("pushbullet non-2xx")?
            .json()
            .await
            .context("pushbullet devices body")?;

        list.devices
            .into_iter()
            .find(|d| d.active && d.nickname.as_deref() == Some(self.device_nickname.as_str()))
            .map(|d| d.iden)
            .ok_or_else(|| anyhow!("pushbullet device '{}' not found", self.device_nickname))
    }
}

#[async_trait::async_trait]
impl Notifier for PushbulletNotifier {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        let iden = self.device_iden().await?;
        let payload = serde_json::json!({
            "type": "note",
            "title": subject,
            "body": body,
            "device_iden": iden,
        });
        self.client
            .post(format!("{}/pushes", self.api))
            .header("Access-Token", &self.token)
            .json(&payload)
            .send()
            .await
            .context("pushbullet push")?
            .error_for_status()
            .context("pushbullet non-2xx")?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "pushbullet"
    }
}
