// src/scheduler/orchestrator.rs
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::subscriber::{PassOutcome, SubscriberRunner};
use crate::config::AppConfig;
use crate::error::FinderError;
use crate::notify::Dispatcher;
use crate::search::providers::olcc::OlccSearcher;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

type RunnerResult = (String, Result<(), FinderError>);

/// Owns one runner per subscriber and supervises them as a group.
pub struct Orchestrator {
    runners: Vec<Arc<SubscriberRunner>>,
    stop: CancellationToken,
    shutdown_timeout: Duration,
}

impl Orchestrator {
    /// Rejects an empty set and duplicate subscriber names.
    pub fn new(runners: Vec<SubscriberRunner>) -> Result<Self, FinderError> {
        if runners.is_empty() {
            return Err(FinderError::config(
                "at least one subscriber must be configured",
            ));
        }
        let mut seen = HashSet::new();
        for runner in &runners {
            if !seen.insert(runner.name().to_string()) {
                return Err(FinderError::config(format!(
                    "subscriber '{}' is configured more than once",
                    runner.name()
                )));
            }
        }
        Ok(Self {
            runners: runners.into_iter().map(Arc::new).collect(),
            stop: CancellationToken::new(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        })
    }

    /// Validated config -> one OLCC-backed runner per subscriber.
    pub fn from_config(cfg: &AppConfig) -> Result<Self, FinderError> {
        cfg.validate()?;
        let settings = cfg.settings();
        let mut runners = Vec::with_capacity(cfg.subscribers.len());
        for sub in &cfg.subscribers {
            let provider = OlccSearcher::new(&settings.user_agent).map_err(|e| {
                FinderError::config(format!("subscriber '{}': {e:#}", sub.name))
            })?;
            let dispatcher = Dispatcher::from_configs(&sub.name, &sub.notifications)?;
            info!(
                subscriber = %sub.name,
                items = sub.terms.len(),
                sinks = dispatcher.sink_count(),
                condense = dispatcher.condense(),
                "subscriber configured"
            );
            runners.push(SubscriberRunner::new(
                sub.clone(),
                settings.interval,
                Arc::new(provider),
                dispatcher,
            )?);
        }
        Self::new(runners)
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Starts every runner and blocks until `stop()` or `cancel`.
    ///
    /// Returns `Ok` after `stop()`, `Cancelled` after upstream cancellation
    /// and `ShutdownTimeout` when a runner does not settle within the bound.
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), FinderError> {
        info!(subscribers = self.runners.len(), "starting search orchestrator");

        let run_token = cancel.child_token();
        let mut set: JoinSet<RunnerResult> = JoinSet::new();
        for runner in &self.runners {
            let runner = Arc::clone(runner);
            let token = run_token.clone();
            set.spawn(async move {
                let result = runner.start(token).await;
                (runner.name().to_string(), result)
            });
        }

        let cause = tokio::select! {
            _ = self.stop.cancelled() => {
                info!("stop requested, shutting down subscriber runners");
                None
            }
            _ = cancel.cancelled() => {
                info!("cancelled, shutting down subscriber runners");
                Some(FinderError::Cancelled)
            }
        };

        for runner in &self.runners {
            runner.stop();
        }
        run_token.cancel();
        self.wait_all_with_grace(&mut set).await?;

        info!("all subscriber runners stopped");
        cause.map_or(Ok(()), Err)
    }

    /// Idempotent; `start` does the waiting.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// One pass for every subscriber, concurrently. Returns the last failure.
    pub async fn run_once(&self, cancel: CancellationToken) -> Result<(), FinderError> {
        let mut last_err = None;
        for (name, result) in self.run_once_detailed(cancel).await? {
            if let Err(e) = result {
                last_err = Some(FinderError::for_subscriber(&name, e));
            }
        }
        last_err.map_or(Ok(()), Err)
    }

    /// Per-subscriber results in completion order.
    pub async fn run_once_detailed(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<(String, Result<PassOutcome, FinderError>)>, FinderError> {
        info!(subscribers = self.runners.len(), "running one search pass for all subscribers");

        let mut set = JoinSet::new();
        for runner in &self.runners {
            let runner = Arc::clone(runner);
            let token = cancel.clone();
            set.spawn(async move {
                let result = runner.run_once(token).await;
                (runner.name().to_string(), result)
            });
        }

        let mut results = Vec::with_capacity(self.runners.len());
        loop {
            let joined = tokio::select! {
                joined = set.join_next() => joined,
                _ = cancel.cancelled() => {
                    // Passes notice the token themselves; let in-flight calls finish.
                    set.detach_all();
                    return Err(FinderError::Cancelled);
                }
            };
            let Some(joined) = joined else { break };
            match joined {
                Ok((name, Ok(outcome))) => {
                    info!(
                        subscriber = %name,
                        found = outcome.items_found,
                        failed_terms = outcome.terms_failed,
                        "subscriber pass finished"
                    );
                    results.push((name, Ok(outcome)));
                }
                Ok((name, Err(e))) => {
                    error!(subscriber = %name, error = %e, "subscriber pass failed");
                    results.push((name, Err(e)));
                }
                Err(e) => error!(error = %e, "subscriber pass task panicked"),
            }
        }
        Ok(results)
    }

    pub fn subscriber_count(&self) -> usize {
        self.runners.len()
    }

    pub fn has_subscriber(&self, name: &str) -> bool {
        self.runners.iter().any(|r| r.name() == name)
    }

    pub fn subscriber_names(&self) -> Vec<String> {
        self.runners.iter().map(|r| r.name().to_string()).collect()
    }

    async fn wait_all_with_grace(
        &self,
        set: &mut JoinSet<RunnerResult>,
    ) -> Result<(), FinderError> {
        let mut pending: BTreeSet<String> = self.subscriber_names().into_iter().collect();
        let done = async {
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((name, result)) => {
                        if let Err(e) = &result {
                            if !e.is_cancelled() {
                                warn!(subscriber = %name, error = %e, "subscriber runner exited with error");
                            }
                        }
                        pending.remove(&name);
                    }
                    Err(e) => error!(error = %e, "subscriber runner task panicked"),
                }
            }
        };

        match time::timeout(self.shutdown_timeout, done).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let pending: Vec<String> = pending.into_iter().collect();
                warn!(
                    timeout = ?self.shutdown_timeout,
                    pending = ?pending,
                    "subscriber runners did not stop in time"
                );
                Err(FinderError::ShutdownTimeout {
                    timeout: self.shutdown_timeout,
                    pending,
                })
            }
        }
    }
}
