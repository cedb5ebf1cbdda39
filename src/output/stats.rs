//! Run summary statistics
//!
//! The controller feeds every emitted result into a [`RunSummary`] and adds
//! the frontier's skip counters at the end of the run.

use crate::crawler::{CrawlResult, FetchError, TaskError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// Counts reported at the end of a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,

    /// True when the run stopped on cancellation rather than running dry
    pub cancelled: bool,

    /// SHA-256 of the configuration the run used
    pub config_hash: Option<String>,

    pub completed: usize,
    pub failed: usize,

    // Skip breakdown
    pub duplicates: usize,
    pub depth_exceeded: usize,
    pub disallowed: usize,

    /// Fetch attempts across all emitted results
    pub total_attempts: u64,

    /// Outbound links across all successful results
    pub total_links: u64,

    /// Failure label -> count
    pub errors: BTreeMap<String, usize>,

    /// Host -> number of results
    pub hosts: BTreeMap<String, usize>,

    /// Depth -> number of results
    pub depths: BTreeMap<u32, usize>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            elapsed: Duration::ZERO,
            cancelled: false,
            config_hash: None,
            completed: 0,
            failed: 0,
            duplicates: 0,
            depth_exceeded: 0,
            disallowed: 0,
            total_attempts: 0,
            total_links: 0,
            errors: BTreeMap::new(),
            hosts: BTreeMap::new(),
            depths: BTreeMap::new(),
        }
    }

    /// Counts one emitted result
    pub fn record(&mut self, result: &CrawlResult) {
        self.total_attempts += u64::from(result.attempts);
        *self.depths.entry(result.depth).or_default() += 1;

        if let Some(host) = url::Url::parse(&result.url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_string()))
        {
            *self.hosts.entry(host).or_default() += 1;
        }

        match &result.error {
            None => {
                self.completed += 1;
                self.total_links += result.links.len() as u64;
            }
            Some(error) => {
                self.failed += 1;
                *self.errors.entry(error_label(error)).or_default() += 1;
            }
        }
    }

    /// Tasks that ended in a skip state
    pub fn skipped(&self) -> usize {
        self.duplicates + self.depth_exceeded + self.disallowed
    }

    /// Tasks that produced a result
    pub fn total_results(&self) -> usize {
        self.completed + self.failed
    }

    /// Returns the success rate as a percentage of emitted results
    pub fn success_rate(&self) -> f64 {
        let total = self.total_results();
        if total == 0 {
            return 0.0;
        }
        (self.completed as f64 / total as f64) * 100.0
    }

    pub fn status(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else {
            "completed"
        }
    }

    /// Stamps the finish time
    pub fn finish(&mut self, elapsed: Duration, cancelled: bool) {
        self.finished_at = Some(Utc::now());
        self.elapsed = elapsed;
        self.cancelled = cancelled;
    }
}

/// Short grouping key for a task failure
pub fn error_label(error: &TaskError) -> String {
    match error {
        TaskError::Network(FetchError::HttpStatus(code)) => format!("http {}", code),
        TaskError::Network(FetchError::Timeout) => "timeout".to_string(),
        TaskError::Network(FetchError::ConnectionFailed(_)) => "connection failed".to_string(),
        TaskError::Network(FetchError::TooManyRedirects) => "too many redirects".to_string(),
        TaskError::Network(FetchError::Request(_)) => "request error".to_string(),
        TaskError::Network(FetchError::Cancelled) => "cancelled".to_string(),
        TaskError::Extract(_) => "extract error".to_string(),
    }
}

/// Prints the summary to stderr
///
/// Stdout may be carrying result output, so the summary never goes there.
pub fn print_summary(summary: &RunSummary) {
    eprintln!("=== Crawl Summary ===\n");

    eprintln!("Status: {}", summary.status());
    eprintln!("Elapsed: {:.2}s", summary.elapsed.as_secs_f64());
    if let Some(hash) = &summary.config_hash {
        eprintln!("Config hash: {}", hash);
    }
    eprintln!();

    eprintln!("Tasks:");
    eprintln!("  Completed: {}", summary.completed);
    eprintln!("  Failed: {}", summary.failed);
    eprintln!(
        "  Skipped: {} (duplicate {}, depth {}, robots.txt {})",
        summary.skipped(),
        summary.duplicates,
        summary.depth_exceeded,
        summary.disallowed
    );
    eprintln!();

    if !summary.errors.is_empty() {
        eprintln!("Error Summary:");
        let mut error_counts: Vec<_> = summary.errors.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (label, count) in error_counts {
            eprintln!("  {}: {}", label, count);
        }
        eprintln!();
    }

    eprintln!(
        "Success Rate: {:.1}% ({} / {} results)",
        summary.success_rate(),
        summary.completed,
        summary.total_results()
    );
}
