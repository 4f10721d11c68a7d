// src/search/types.rs
use anyhow::Result;
use chrono::{DateTime, Local};

/// One in-stock hit reported by a search provider. Lives for a single pass.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct FoundItem {
    pub name: String,
    pub code: String,
    pub store: String,
    pub found_at: DateTime<Local>,
    pub price: String, // as displayed, e.g. "$89.95"
}

/// Catalog lookup used by the subscriber runner.
///
/// Implementations may carry session state (cookies, age-gate handshakes);
/// the runner never calls `search` concurrently on the same provider.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, term: &str, location: &str, radius: u32) -> Result<Vec<FoundItem>>;
    fn name(&self) -> &'static str;
}
