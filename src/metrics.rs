// src/metrics.rs
//! Metric names used across the scheduler and dispatcher.
//!
//! The crate only records; installing a recorder/exporter is up to the
//! embedding application. Without one every call is a no-op.

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

pub const PASSES_TOTAL: &str = "finder_passes_total";
pub const TICKS_SKIPPED_TOTAL: &str = "finder_ticks_skipped_total";
pub const SEARCH_FAILURES_TOTAL: &str = "finder_search_failures_total";
pub const ITEMS_FOUND_TOTAL: &str = "finder_items_found_total";
pub const NOTIFICATIONS_SENT_TOTAL: &str = "finder_notifications_sent_total";
pub const NOTIFICATIONS_FAILED_TOTAL: &str = "finder_notifications_failed_total";
pub const LAST_PASS_TS: &str = "finder_last_pass_ts";

/// One-time registration so series carry descriptions once a recorder exists.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(PASSES_TOTAL, "Completed search passes, per subscriber.");
        describe_counter!(
            TICKS_SKIPPED_TOTAL,
            "Ticks skipped because a pass was still in flight."
        );
        describe_counter!(
            SEARCH_FAILURES_TOTAL,
            "Search terms that failed or timed out."
        );
        describe_counter!(ITEMS_FOUND_TOTAL, "In-stock items found across all passes.");
        describe_counter!(
            NOTIFICATIONS_SENT_TOTAL,
            "Notifications accepted by a sink."
        );
        describe_counter!(
            NOTIFICATIONS_FAILED_TOTAL,
            "Notifications rejected by a sink."
        );
        describe_gauge!(LAST_PASS_TS, "Unix ts when a subscriber last completed a pass.");
    });
}
