use std::time::Duration;
use tokio::time::Instant;

/// Tracks the state of a host during crawling
///
/// This structure maintains per-host information needed for rate limiting
/// and request counting. It uses tokio's clock so paused-time tests see the
/// same instants the scheduler does.
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Number of fetches committed against this host in the current run
    pub request_count: u64,

    /// Timestamp of the last committed fetch to this host
    pub last_request_time: Option<Instant>,

    /// Crawl-delay announced by the host's robots.txt
    pub crawl_delay: Option<Duration>,
}

impl HostState {
    /// Creates a new HostState with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective spacing between two fetches to this host
    ///
    /// This is the larger of the configured rate limit and the robots.txt
    /// crawl delay (if any).
    pub fn effective_delay(&self, rate_limit: Duration) -> Duration {
        match self.crawl_delay {
            Some(delay) => rate_limit.max(delay),
            None => rate_limit,
        }
    }

    /// Calculates the time until the next fetch can be made
    ///
    /// Returns `Duration::ZERO` if a fetch may start right now.
    pub fn time_until_next_request(&self, rate_limit: Duration, now: Instant) -> Duration {
        match self.last_request_time {
            Some(last) => {
                let ready_at = last + self.effective_delay(rate_limit);
                ready_at.saturating_duration_since(now)
            }
            None => Duration::ZERO,
        }
    }

    /// Checks if a fetch can be made to this host at `now`
    pub fn can_request(&self, rate_limit: Duration, now: Instant) -> bool {
        self.time_until_next_request(rate_limit, now).is_zero()
    }

    /// Records that a fetch was made to this host
    ///
    /// Updates the request count and last request time.
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }
}
