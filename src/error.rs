// src/error.rs
//! Error taxonomy shared by the scheduler, the dispatcher and the orchestrator.
//!
//! Collaborators (search providers, notification transports, config I/O) speak
//! `anyhow`; their failures are wrapped here only when they cross into the core.

use std::time::Duration;
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FinderError {
    /// Invalid or incomplete configuration. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A single search term failed; the pass goes on with the next term.
    #[error("search for '{term}' failed: {source}")]
    Search {
        term: String,
        #[source]
        source: anyhow::Error,
    },

    /// A sink rejected a notification. Other sinks are still attempted.
    #[error("notification via {sink} failed: {source}")]
    Dispatch {
        sink: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Subscriber runners did not acknowledge a stop within the bound.
    #[error("timed out after {timeout:?} waiting for subscriber runners to stop; pending: {pending:?}")]
    ShutdownTimeout {
        timeout: Duration,
        pending: Vec<String>,
    },

    /// Upstream cancellation. Orderly stop.
    #[error("cancelled")]
    Cancelled,

    /// Error raised by one subscriber, as seen from the orchestrator.
    #[error("subscriber '{subscriber}': {source}")]
    Subscriber {
        subscriber: String,
        #[source]
        source: Box<FinderError>,
    },
}

impl FinderError {
    pub fn config(msg: impl Into<String>) -> Self {
        FinderError::Config(msg.into())
    }

    pub fn for_subscriber(subscriber: &str, err: FinderError) -> Self {
        FinderError::Subscriber {
            subscriber: subscriber.to_string(),
            source: Box::new(err),
        }
    }

    /// Short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FinderError::Config(_) => "config",
            FinderError::Search { .. } => "search_term",
            FinderError::Dispatch { .. } => "dispatch",
            FinderError::ShutdownTimeout { .. } => "shutdown_timeout",
            FinderError::Cancelled => "cancelled",
            FinderError::Subscriber { source, .. } => source.as_label(),
        }
    }

    /// True for cancellation, also when wrapped by a subscriber.
    pub fn is_cancelled(&self) -> bool {
        match self {
            FinderError::Cancelled => true,
            FinderError::Subscriber { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}
