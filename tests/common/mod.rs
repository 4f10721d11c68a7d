// tests/common/mod.rs
// Scripted search provider and recording sinks shared by the integration tests.
#![allow(dead_code)]

pub mod mock_http;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use find_liquor::{
    Dispatcher, FoundItem, Notifier, RunnerLimits, SearchProvider, SubscriberConfig,
    SubscriberRunner,
};

pub fn item(name: &str, store: &str) -> FoundItem {
    FoundItem {
        name: name.into(),
        code: "7330B".into(),
        store: store.into(),
        found_at: Local.with_ymd_and_hms(2025, 3, 14, 9, 30, 0).unwrap(),
        price: "$59.95".into(),
    }
}

/// Answers per term from a script; unknown terms find nothing.
#[derive(Default)]
pub struct ScriptedProvider {
    found: HashMap<String, Vec<FoundItem>>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    cancel_on: Option<(String, CancellationToken)>,
    delay: Duration,
    pub calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn found(mut self, term: &str, items: Vec<FoundItem>) -> Self {
        self.found.insert(term.to_string(), items);
        self
    }

    pub fn failing(mut self, term: &str) -> Self {
        self.failing.insert(term.to_string());
        self
    }

    /// The search for `term` never returns.
    pub fn hanging(mut self, term: &str) -> Self {
        self.hanging.insert(term.to_string());
        self
    }

    /// Fires `token` while `term` is being searched.
    pub fn cancel_during(mut self, term: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((term.to_string(), token));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    async fn search(&self, term: &str, _location: &str, _radius: u32) -> anyhow::Result<Vec<FoundItem>> {
        self.calls.lock().push(term.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some((t, token)) = &self.cancel_on {
            if t == term {
                token.cancel();
            }
        }
        if self.hanging.contains(term) {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(term) {
            anyhow::bail!("search page unavailable");
        }
        Ok(self.found.get(term).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

pub type Outbox = Arc<Mutex<Vec<(String, String)>>>;

/// Records every (subject, body); optionally rejects everything.
pub struct RecordingSink {
    sent: Outbox,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> (Self, Outbox) {
        let sent = Outbox::default();
        (
            Self {
                sent: Arc::clone(&sent),
                fail: false,
            },
            sent,
        )
    }

    pub fn failing() -> Self {
        Self {
            sent: Outbox::default(),
            fail: true,
        }
    }
}

#[async_trait]
impl Notifier for RecordingSink {
    async fn send(&self, subject: &str, body: &str) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("sink rejected the message");
        }
        self.sent.lock().push((subject.to_string(), body.to_string()));
        Ok(())
    }

    fn name(&self) -> &'static str {
        if self.fail {
            "failing"
        } else {
            "recording"
        }
    }
}

pub fn subjects(outbox: &Outbox) -> Vec<String> {
    outbox.lock().iter().map(|(s, _)| s.clone()).collect()
}

/// Runner with one recording sink and no pacing delay.
pub fn runner(
    sub: SubscriberConfig,
    provider: Arc<ScriptedProvider>,
    condense: bool,
    interval: Duration,
) -> (SubscriberRunner, Outbox) {
    let (sink, outbox) = RecordingSink::new();
    let dispatcher = Dispatcher::new(&sub.name, vec![Box::new(sink)], condense);
    let runner = SubscriberRunner::new(sub, interval, provider, dispatcher)
        .unwrap()
        .with_limits(RunnerLimits {
            term_timeout: Duration::from_secs(120),
            max_pacing_delay: Duration::ZERO,
        });
    (runner, outbox)
}
