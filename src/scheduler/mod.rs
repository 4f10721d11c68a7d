// src/scheduler/mod.rs
//! Recurring search passes: one runner per subscriber, supervised by the orchestrator.

pub mod orchestrator;
pub mod subscriber;

pub use orchestrator::{Orchestrator, DEFAULT_SHUTDOWN_TIMEOUT};
pub use subscriber::{PassOutcome, RunnerLimits, SubscriberRunner};
