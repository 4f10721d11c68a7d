// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod config;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod scheduler;
pub mod search;

pub use crate::config::{AppConfig, GlobalSettings, NotificationSinkConfig, SinkKind, SubscriberConfig};
pub use crate::error::FinderError;
pub use crate::notify::{Dispatcher, Notifier};
pub use crate::scheduler::{Orchestrator, PassOutcome, RunnerLimits, SubscriberRunner};
pub use crate::search::{FoundItem, SearchProvider};
