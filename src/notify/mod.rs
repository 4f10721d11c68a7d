// src/notify/mod.rs
pub mod discord;
pub mod dispatcher;
pub mod gotify;
pub mod pushbullet;
pub mod pushover;
pub mod slack;
pub mod telegram;

use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

use crate::config::{NotificationSinkConfig, SinkKind};
use crate::search::FoundItem;

pub use dispatcher::Dispatcher;

pub const DATE_FMT: &str = "%Y-%m-%d";
pub const TIME_FMT: &str = "%H:%M:%S";
const SINK_TIMEOUT: Duration = Duration::from_secs(10);

/// One outbound destination. Fire-and-forget: success or error, nothing else.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

pub fn found_message(item: &FoundItem) -> Message {
    Message {
        subject: format!("Found {}!", item.name),
        body: format!(
            "Found {} at {} on {} at {} for {}",
            item.name,
            item.store,
            item.found_at.format(DATE_FMT),
            item.found_at.format(TIME_FMT),
            item.price
        ),
    }
}

/// Multi-item digest. Callers pass at least two items; the timestamp line
/// comes from the first item.
fn condensed_message(items: &[FoundItem]) -> Message {
    let mut body = format!("Found {} liquor items:\n\n", items.len());
    for (i, item) in items.iter().enumerate() {
        body.push_str(&format!(
            "{}. {} at {} for {}\n",
            i + 1,
            item.name,
            item.store,
            item.price
        ));
    }
    if let Some(first) = items.first() {
        body.push_str(&format!(
            "\nSearch completed on {} at {}",
            first.found_at.format(DATE_FMT),
            first.found_at.format(TIME_FMT)
        ));
    }
    Message {
        subject: format!("Found {} items!", items.len()),
        body,
    }
}

/// Message shape for one pass' batch.
/// A single item is always rendered individually, condensed or not.
pub fn render_found(items: &[FoundItem], condense: bool) -> Vec<Message> {
    match items.len() {
        0 => Vec::new(),
        n if condense && n > 1 => vec![condensed_message(items)],
        _ => items.iter().map(found_message).collect(),
    }
}

pub fn heartbeat_message(subscriber: &str) -> Message {
    Message {
        subject: "Heartbeat".to_string(),
        body: format!("Still running and searching for '{subscriber}'"),
    }
}

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(SINK_TIMEOUT)
        .build()
        .context("building notification http client")
}

/// `endpoint` from the config, or the provider's public API.
pub(crate) fn base_url(cfg: &NotificationSinkConfig, default: &str) -> String {
    let ep = cfg.endpoint.trim();
    if ep.is_empty() {
        default.to_string()
    } else {
        ep.trim_end_matches('/').to_string()
    }
}

/// Build the transport for one sink config. Missing credentials fail here,
/// at construction, not on first send.
pub fn build_sink(cfg: &NotificationSinkConfig) -> Result<Box<dyn Notifier>> {
    let sink: Box<dyn Notifier> = match cfg.kind {
        SinkKind::Gotify => Box::new(gotify::GotifyNotifier::from_config(cfg)?),
        SinkKind::Slack => Box::new(slack::SlackNotifier::from_config(cfg)?),
        SinkKind::Telegram => Box::new(telegram::TelegramNotifier::from_config(cfg)?),
        SinkKind::Discord => Box::new(discord::DiscordNotifier::from_config(cfg)?),
        SinkKind::Pushover => Box::new(pushover::PushoverNotifier::from_config(cfg)?),
        SinkKind::Pushbullet => Box::new(pushbullet::PushbulletNotifier::from_config(cfg)?),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn item(name: &str, store: &str, price: &str) -> FoundItem {
        FoundItem {
            name: name.into(),
            code: "7330B".into(),
            store: store.into(),
            found_at: Local.with_ymd_and_hms(2025, 3, 14, 9, 5, 7).unwrap(),
            price: price.into(),
        }
    }

    #[test]
    fn individual_messages_one_per_item() {
        let items = vec![
            item("RYE", "PORTLAND", "$59.95"),
            item("BOURBON", "BEAVERTON", "$39.95"),
        ];
        let msgs = render_found(&items, false);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].subject, "Found RYE!");
        assert_eq!(
            msgs[0].body,
            "Found RYE at PORTLAND on 2025-03-14 at 09:05:07 for $59.95"
        );
        assert_eq!(msgs[1].subject, "Found BOURBON!");
    }

    #[test]
    fn condensed_digest_lists_items_in_order() {
        let items = vec![
            item("RYE", "PORTLAND", "$59.95"),
            item("BOURBON", "BEAVERTON", "$39.95"),
            item("RYE", "SALEM", "$59.95"),
        ];
        let msgs = render_found(&items, true);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].subject, "Found 3 items!");
        assert_eq!(
            msgs[0].body,
            "Found 3 liquor items:\n\n\
             1. RYE at PORTLAND for $59.95\n\
             2. BOURBON at BEAVERTON for $39.95\n\
             3. RYE at SALEM for $59.95\n\
             \nSearch completed on 2025-03-14 at 09:05:07"
        );
    }

    #[test]
    fn single_item_is_identical_with_or_without_condense() {
        let items = vec![item("RYE", "PORTLAND", "$59.95")];
        assert_eq!(render_found(&items, true), render_found(&items, false));
    }

    #[test]
    fn empty_batch_renders_nothing() {
        assert!(render_found(&[], true).is_empty());
        assert!(render_found(&[], false).is_empty());
    }

    #[test]
    fn missing_credentials_fail_at_build() {
        let cfg = NotificationSinkConfig::new(SinkKind::Gotify).with_endpoint("http://localhost:8080");
        let err = build_sink(&cfg).err().expect("token is required");
        assert!(err.to_string().contains("token"));

        let cfg = NotificationSinkConfig::new(SinkKind::Telegram)
            .with_credential("token", "t")
            .with_credential("chat_id", "not-a-number");
        assert!(build_sink(&cfg).is_err());

        let cfg = NotificationSinkConfig::new(SinkKind::Slack).with_credential("token", "t");
        assert!(build_sink(&cfg).is_err(), "channel_id missing");
    }

    #[test]
    fn complete_configs_build_every_kind() {
        let cases = [
            NotificationSinkConfig::new(SinkKind::Gotify)
                .with_endpoint("http://localhost:8080/")
                .with_credential("token", "t"),
            NotificationSinkConfig::new(SinkKind::Slack)
                .with_credential("token", "t")
                .with_credential("channel_id", "C123"),
            NotificationSinkConfig::new(SinkKind::Telegram)
                .with_credential("token", "t")
                .with_credential("chat_id", "-100123"),
            NotificationSinkConfig::new(SinkKind::Discord)
                .with_credential("token", "t")
                .with_credential("channel_id", "42"),
            NotificationSinkConfig::new(SinkKind::Pushover)
                .with_credential("token", "t")
                .with_credential("recipient_id", "u"),
            NotificationSinkConfig::new(SinkKind::Pushbullet)
                .with_credential("token", "t")
                .with_credential("device_nickname", "phone"),
        ];
        for cfg in cases {
            let sink = build_sink(&cfg).unwrap();
            assert_eq!(sink.name(), cfg.kind.as_str());
        }
    }
}
