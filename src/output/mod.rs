//! Run outcome reporting
//!
//! This module handles:
//! - Counting request outcomes and failed URLs per status class
//! - Printing the end-of-run summary
//! - Posting per-URL notifications to a webhook

pub mod notify;
pub mod stats;

pub use notify::{Notification, Notifier, WebhookNotifier};
pub use stats::{format_summary, notify_failures, print_summary, FailedUrl, RunStats, StatsSnapshot};
