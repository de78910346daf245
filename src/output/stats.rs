//! Run statistics
//!
//! [`RunStats`] is shared by every in-flight request of a run. Counters are
//! atomics; the per-class URL lists sit behind a single lock so each terminal
//! failure is appended as one unit.

use crate::crawler::{FailureClass, RequestContext};
use crate::output::notify::{Notification, Notifier};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// A URL that ran out of retries, with the file it was synthesized from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedUrl {
    pub url: String,
    pub file_path: Option<String>,
}

#[derive(Debug, Default)]
struct FailureLog {
    urls_404: Vec<FailedUrl>,
    urls_500: Vec<FailedUrl>,
    file_paths_404: Vec<String>,
    file_paths_500: Vec<String>,
}

/// Point-in-time copy of the run statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Logical requests that reached a terminal state
    pub total_processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Logical requests whose final failure was a 404 (or had no status)
    pub failed_404: u64,
    /// Logical requests whose final failure was a 500
    pub failed_500: u64,
    /// Every exhausted URL in the 404 bucket, alternatives included
    pub urls_404: Vec<FailedUrl>,
    /// Every exhausted URL in the 500 bucket, alternatives included
    pub urls_500: Vec<FailedUrl>,
    pub file_paths_404: Vec<String>,
    pub file_paths_500: Vec<String>,
}

impl StatsSnapshot {
    /// Every exhausted URL with its reported status
    pub fn failed_urls(&self) -> impl Iterator<Item = (&FailedUrl, FailureClass)> {
        self.urls_404
            .iter()
            .map(|u| (u, FailureClass::NotFound))
            .chain(self.urls_500.iter().map(|u| (u, FailureClass::ServerError)))
    }
}

/// Outcome counters for one run
#[derive(Debug, Default)]
pub struct RunStats {
    total_processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    failed_404: AtomicU64,
    failed_500: AtomicU64,
    failures: Mutex<FailureLog>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn failures(&self) -> MutexGuard<'_, FailureLog> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Records a logical request that succeeded
    pub fn record_success(&self) {
        self.total_processed.fetch_add(1, Ordering::SeqCst);
        self.succeeded.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a logical request that failed terminally
    ///
    /// Counters move once per context. Every URL the context exhausted is
    /// appended to the list of its own status class.
    pub fn record_failure(&self, ctx: &RequestContext) {
        self.total_processed.fetch_add(1, Ordering::SeqCst);
        self.failed.fetch_add(1, Ordering::SeqCst);

        let class = ctx.failure_class();
        match class {
            FailureClass::NotFound => self.failed_404.fetch_add(1, Ordering::SeqCst),
            FailureClass::ServerError => self.failed_500.fetch_add(1, Ordering::SeqCst),
        };

        let mut log = self.failures();
        for exhausted in ctx.exhausted() {
            let entry = FailedUrl {
                url: exhausted.url.clone(),
                file_path: ctx.file_path.clone(),
            };
            match exhausted.class {
                FailureClass::NotFound => log.urls_404.push(entry),
                FailureClass::ServerError => log.urls_500.push(entry),
            }
        }

        if let Some(file_path) = &ctx.file_path {
            match class {
                FailureClass::NotFound => log.file_paths_404.push(file_path.clone()),
                FailureClass::ServerError => log.file_paths_500.push(file_path.clone()),
            }
        }

        debug!(url = %ctx.original_url, status = %class, "Request failed terminally");
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let log = self.failures();
        StatsSnapshot {
            total_processed: self.total_processed.load(Ordering::SeqCst),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            failed_404: self.failed_404.load(Ordering::SeqCst),
            failed_500: self.failed_500.load(Ordering::SeqCst),
            urls_404: log.urls_404.clone(),
            urls_500: log.urls_500.clone(),
            file_paths_404: log.file_paths_404.clone(),
            file_paths_500: log.file_paths_500.clone(),
        }
    }
}

/// Formats the end-of-run summary
pub fn format_summary(stats: &StatsSnapshot) -> String {
    let mut out = String::new();

    out.push_str("=== DocSearch Run Summary ===\n\n");
    out.push_str(&format!("Total processed: {}\n", stats.total_processed));
    out.push_str(&format!("Succeeded: {}\n", stats.succeeded));
    out.push_str(&format!("Failed: {}\n", stats.failed));

    for (label, count, urls, file_paths) in [
        ("404", stats.failed_404, &stats.urls_404, &stats.file_paths_404),
        ("500", stats.failed_500, &stats.urls_500, &stats.file_paths_500),
    ] {
        if count == 0 && urls.is_empty() {
            continue;
        }
        out.push_str(&format!("\nFailed with {} ({}):\n", label, count));
        for failed in urls {
            out.push_str(&format!("  - {}\n", failed.url));
        }
        if !file_paths.is_empty() {
            out.push_str("  Files:\n");
            for path in file_paths {
                out.push_str(&format!("    - {}\n", path));
            }
        }
    }

    out
}

/// Prints the end-of-run summary to stdout
pub fn print_summary(stats: &StatsSnapshot) {
    println!("{}", format_summary(stats));
}

/// Sends one notification per exhausted URL
///
/// # Returns
///
/// The number of notifications delivered
pub async fn notify_failures(stats: &StatsSnapshot, notifier: &dyn Notifier) -> usize {
    let mut delivered = 0;
    for (failed, class) in stats.failed_urls() {
        let notification = Notification::now(
            failed.file_path.as_deref(),
            &failed.url,
            &class.status_code().to_string(),
        );
        if notifier.notify(&notification).await {
            delivered += 1;
        }
    }
    delivered
}
