// src/notify/dispatcher.rs
use metrics::counter;

use super::{build_sink, heartbeat_message, render_found, Message, Notifier};
use crate::config::NotificationSinkConfig;
use crate::error::FinderError;
use crate::metrics::{NOTIFICATIONS_FAILED_TOTAL, NOTIFICATIONS_SENT_TOTAL};
use crate::search::FoundItem;

/// Per-subscriber fan-out to every configured sink.
///
/// A failing sink never prevents delivery through the others; the last
/// failure is returned so the caller can log it.
pub struct Dispatcher {
    subscriber: String,
    sinks: Vec<Box<dyn Notifier>>,
    condense: bool,
}

impl Dispatcher {
    pub fn new(subscriber: &str, sinks: Vec<Box<dyn Notifier>>, condense: bool) -> Self {
        Self {
            subscriber: subscriber.to_string(),
            sinks,
            condense,
        }
    }

    /// Builds every sink and takes the condense policy from the first config.
    pub fn from_configs(
        subscriber: &str,
        configs: &[NotificationSinkConfig],
    ) -> Result<Self, FinderError> {
        let condense = condense_policy(subscriber, configs);
        let sinks = configs
            .iter()
            .map(build_sink)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| FinderError::config(format!("subscriber '{subscriber}': {e:#}")))?;
        Ok(Self::new(subscriber, sinks, condense))
    }

    pub fn condense(&self) -> bool {
        self.condense
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// One pass' batch: a digest when condensing, one message per item otherwise.
    pub async fn notify_found_items(&self, items: Vec<FoundItem>) -> Result<(), FinderError> {
        let mut last_err = None;
        for msg in render_found(&items, self.condense) {
            tracing::info!(subscriber = %self.subscriber, subject = %msg.subject, "{}", msg.body);
            if let Err(e) = self.broadcast(&msg).await {
                last_err = Some(e);
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    pub async fn notify_heartbeat(&self) -> Result<(), FinderError> {
        let msg = heartbeat_message(&self.subscriber);
        tracing::info!(subscriber = %self.subscriber, "{}", msg.body);
        self.broadcast(&msg).await
    }

    async fn broadcast(&self, msg: &Message) -> Result<(), FinderError> {
        let mut last_err = None;
        for sink in &self.sinks {
            match sink.send(&msg.subject, &msg.body).await {
                Ok(()) => {
                    counter!(NOTIFICATIONS_SENT_TOTAL, "sink" => sink.name()).increment(1);
                }
                Err(e) => {
                    tracing::error!(
                        subscriber = %self.subscriber,
                        sink = sink.name(),
                        error = ?e,
                        "failed to send notification"
                    );
                    counter!(NOTIFICATIONS_FAILED_TOTAL, "sink" => sink.name())
                        .increment(1);
                    last_err = Some(FinderError::Dispatch {
                        sink: sink.name(),
                        source: e,
                    });
                }
            }
        }
        last_err.map_or(Ok(()), Err)
    }
}

/// All sinks of one subscriber are meant to agree on condensing.
/// When they don't, the first one wins and we say so.
fn condense_policy(subscriber: &str, configs: &[NotificationSinkConfig]) -> bool {
    let Some(first) = configs.first() else {
        return false;
    };
    if configs.iter().any(|c| c.condense != first.condense) {
        tracing::warn!(
            subscriber,
            condense = first.condense,
            "notification sinks disagree on condense; using the first sink's setting"
        );
    }
    first.condense
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SinkKind;

    #[test]
    fn condense_comes_from_first_sink() {
        let gotify = |condense| {
            NotificationSinkConfig::new(SinkKind::Gotify)
                .with_endpoint("http://localhost:8080")
                .with_credential("token", "t")
                .condensed(condense)
        };
        assert!(!condense_policy("a", &[]));
        assert!(condense_policy("a", &[gotify(true), gotify(false)]));
        assert!(!condense_policy("a", &[gotify(false), gotify(true)]));

        let d = Dispatcher::from_configs("a", &[gotify(true)]).unwrap();
        assert!(d.condense());
        assert_eq!(d.sink_count(), 1);
    }

    #[test]
    fn bad_sink_config_is_a_config_error() {
        let cfg = NotificationSinkConfig::new(SinkKind::Pushover).with_credential("token", "t");
        let err = Dispatcher::from_configs("carol", &[cfg]).err().expect("recipient_id missing");
        assert!(matches!(err, FinderError::Config(_)));
        assert!(err.to_string().contains("carol"));
    }
}
