// src/scheduler/subscriber.rs
use anyhow::anyhow;
use metrics::{counter, gauge};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::SubscriberConfig;
use crate::error::FinderError;
use crate::metrics::{
    ensure_described, ITEMS_FOUND_TOTAL, LAST_PASS_TS, PASSES_TOTAL, SEARCH_FAILURES_TOTAL,
    TICKS_SKIPPED_TOTAL,
};
use crate::notify::Dispatcher;
use crate::search::{FoundItem, SearchProvider};

pub const DEFAULT_TERM_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_PACING_DELAY: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug)]
pub struct RunnerLimits {
    /// Ceiling for one term's search call.
    pub term_timeout: Duration,
    /// Upper bound of the random wait between two terms.
    pub max_pacing_delay: Duration,
}

impl Default for RunnerLimits {
    fn default() -> Self {
        Self {
            term_timeout: DEFAULT_TERM_TIMEOUT,
            max_pacing_delay: DEFAULT_MAX_PACING_DELAY,
        }
    }
}

/// What one completed pass did. `dispatch_error` is informational only.
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub terms_ok: usize,
    pub terms_failed: usize,
    pub items_found: usize,
    pub dispatch_error: Option<FinderError>,
}

/// Everything a pass needs; shared with the spawned pass tasks.
struct PassContext {
    subscriber: SubscriberConfig,
    provider: Arc<dyn SearchProvider>,
    dispatcher: Dispatcher,
    interval: Duration,
}

/// Drives one subscriber's recurring search passes.
///
/// At most one pass is in flight: a single-permit gate admits passes and a
/// tick that finds it taken is skipped, not queued.
pub struct SubscriberRunner {
    ctx: Arc<PassContext>,
    limits: RunnerLimits,
    gate: Arc<Semaphore>,
    stop: CancellationToken,
}

impl SubscriberRunner {
    pub fn new(
        subscriber: SubscriberConfig,
        interval: Duration,
        provider: Arc<dyn SearchProvider>,
        dispatcher: Dispatcher,
    ) -> Result<Self, FinderError> {
        if subscriber.name.trim().is_empty() {
            return Err(FinderError::config("subscriber must have a name"));
        }
        check_search_params(&subscriber)?;
        if interval.is_zero() {
            return Err(FinderError::config(format!(
                "subscriber '{}': polling interval must be positive",
                subscriber.name
            )));
        }
        ensure_described();
        Ok(Self {
            ctx: Arc::new(PassContext {
                subscriber,
                provider,
                dispatcher,
                interval,
            }),
            limits: RunnerLimits::default(),
            gate: Arc::new(Semaphore::new(1)),
            stop: CancellationToken::new(),
        })
    }

    pub fn with_limits(mut self, limits: RunnerLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn name(&self) -> &str {
        &self.ctx.subscriber.name
    }

    /// Idempotent and non-blocking; `start` returns once the in-flight pass settles.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Runs a pass right away, then one per interval tick, until `stop()`
    /// (-> `Ok`) or `cancel` fires (-> `Err(Cancelled)`).
    pub async fn start(&self, cancel: CancellationToken) -> Result<(), FinderError> {
        info!(subscriber = %self.name(), interval = ?self.ctx.interval, "starting search runner");

        let pass_token = cancel.child_token();
        // First tick completes immediately: that is the initial pass.
        let mut ticker = time::interval(self.ctx.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let result = loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    info!(subscriber = %self.name(), "stopping search runner");
                    break Ok(());
                }
                _ = cancel.cancelled() => {
                    info!(subscriber = %self.name(), "search runner cancelled");
                    break Err(FinderError::Cancelled);
                }
                _ = ticker.tick() => self.admit_pass(&pass_token),
            }
        };

        // In-flight pass bails out at its next safe point; owning the
        // permit means it has.
        pass_token.cancel();
        let _ = self.gate.acquire().await;
        result
    }

    /// One pass, outside the timer. Waits for a scheduled pass to finish first.
    /// `stop()` ends it at the next safe point, same as a scheduled pass.
    pub async fn run_once(&self, cancel: CancellationToken) -> Result<PassOutcome, FinderError> {
        let _permit = tokio::select! {
            permit = self.gate.acquire() => permit.map_err(|_| FinderError::Cancelled)?,
            _ = cancel.cancelled() => return Err(FinderError::Cancelled),
            _ = self.stop.cancelled() => return Err(FinderError::Cancelled),
        };
        self.ctx.run_search(&cancel, &self.stop, self.limits).await
    }

    fn admit_pass(&self, token: &CancellationToken) {
        let Ok(permit) = Arc::clone(&self.gate).try_acquire_owned() else {
            warn!(subscriber = %self.name(), "previous search still running, skipping tick");
            counter!(TICKS_SKIPPED_TOTAL, "subscriber" => self.name().to_string()).increment(1);
            return;
        };

        let ctx = Arc::clone(&self.ctx);
        let token = token.clone();
        let stop = self.stop.clone();
        let limits = self.limits;
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = ctx.run_search(&token, &stop, limits).await {
                if e.is_cancelled() {
                    info!(subscriber = %ctx.subscriber.name, "search pass cancelled");
                } else {
                    error!(subscriber = %ctx.subscriber.name, error = %e, "search failed");
                }
            }
        });
    }
}

impl PassContext {
    /// One pass: every term in order, one dispatch for the whole batch,
    /// then a heartbeat. Only bad preconditions and cancellation are errors.
    /// `cancel` and `stop` are both honoured at every safe point.
    async fn run_search(
        &self,
        cancel: &CancellationToken,
        stop: &CancellationToken,
        limits: RunnerLimits,
    ) -> Result<PassOutcome, FinderError> {
        let sub = &self.subscriber;
        check_search_params(sub)?;
        let halted = || cancel.is_cancelled() || stop.is_cancelled();
        if halted() {
            return Err(FinderError::Cancelled);
        }

        info!(
            subscriber = %sub.name,
            items = sub.terms.len(),
            radius = sub.radius,
            location = %sub.location,
            "starting search pass"
        );

        let mut outcome = PassOutcome::default();
        let mut batch: Vec<FoundItem> = Vec::new();
        let last = sub.terms.len() - 1;

        for (i, term) in sub.terms.iter().enumerate() {
            debug!(subscriber = %sub.name, term = %term, "searching");
            let searched = time::timeout(
                limits.term_timeout,
                self.provider.search(term, &sub.location, sub.radius),
            )
            .await;

            let failure = match searched {
                Ok(Ok(items)) => {
                    info!(subscriber = %sub.name, term = %term, found = items.len(), "search finished");
                    outcome.terms_ok += 1;
                    batch.extend(items);
                    None
                }
                Ok(Err(source)) => Some(source),
                Err(_) => Some(anyhow!("timed out after {:?}", limits.term_timeout)),
            };
            if let Some(source) = failure {
                let err = FinderError::Search {
                    term: term.clone(),
                    source,
                };
                error!(subscriber = %sub.name, provider = self.provider.name(), error = %err, "search term failed");
                counter!(SEARCH_FAILURES_TOTAL, "subscriber" => sub.name.clone()).increment(1);
                outcome.terms_failed += 1;
            }

            if halted() {
                return Err(FinderError::Cancelled);
            }

            if i < last {
                let wait = pacing_delay(limits.max_pacing_delay);
                debug!(subscriber = %sub.name, wait = ?wait, "waiting before next search");
                tokio::select! {
                    _ = time::sleep(wait) => {}
                    _ = cancel.cancelled() => return Err(FinderError::Cancelled),
                    _ = stop.cancelled() => return Err(FinderError::Cancelled),
                }
            }
        }

        outcome.items_found = batch.len();
        counter!(ITEMS_FOUND_TOTAL, "subscriber" => sub.name.clone()).increment(batch.len() as u64);

        if !batch.is_empty() {
            if let Err(e) = self.dispatcher.notify_found_items(batch).await {
                warn!(subscriber = %sub.name, error = %e, "failed to send notifications");
                outcome.dispatch_error = Some(e);
            }
        }

        if let Err(e) = self.dispatcher.notify_heartbeat().await {
            warn!(subscriber = %sub.name, error = %e, "failed to send heartbeat notification");
            outcome.dispatch_error = Some(e);
        }

        counter!(PASSES_TOTAL, "subscriber" => sub.name.clone()).increment(1);
        gauge!(LAST_PASS_TS, "subscriber" => sub.name.clone())
            .set(chrono::Utc::now().timestamp() as f64);
        info!(
            subscriber = %sub.name,
            found = outcome.items_found,
            failed_terms = outcome.terms_failed,
            next_in = ?self.interval,
            "search completed"
        );
        Ok(outcome)
    }
}

/// Terms, location and radius a search cannot run without.
fn check_search_params(sub: &SubscriberConfig) -> Result<(), FinderError> {
    if sub.terms.is_empty() {
        return Err(FinderError::config(format!(
            "subscriber '{}' has no items to search for",
            sub.name
        )));
    }
    if sub.location.trim().is_empty() {
        return Err(FinderError::config(format!(
            "subscriber '{}' has no zipcode configured",
            sub.name
        )));
    }
    if sub.radius == 0 {
        return Err(FinderError::config(format!(
            "subscriber '{}' must have a positive distance",
            sub.name
        )));
    }
    Ok(())
}

/// Uniform in `[0, max]`, millisecond resolution.
fn pacing_delay(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::rng().random_range(0..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacing_delay_stays_in_bounds() {
        assert_eq!(pacing_delay(Duration::ZERO), Duration::ZERO);
        let max = Duration::from_secs(30);
        for _ in 0..200 {
            assert!(pacing_delay(max) <= max);
        }
    }
}
