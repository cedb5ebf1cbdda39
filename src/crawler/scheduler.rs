//! Fetch scheduler enforcing per-host politeness
//!
//! This module handles:
//! - Admission decisions: how long a fetch to a host must wait
//! - Recording committed fetches per host
//! - Serialising admission per host without serialising across hosts
//! - Integrating robots.txt crawl delays

use crate::state::HostState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Permission to fetch from a host right now
///
/// While a permit is alive no other caller can be admitted for the same
/// host. Dropping the permit without [`HostPermit::commit`] leaves the host's
/// state untouched, so a fetch that never started does not delay the next
/// one.
#[derive(Debug)]
pub struct HostPermit {
    host: String,
    guard: OwnedMutexGuard<HostState>,
}

impl HostPermit {
    /// The host this permit was issued for
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Records the fetch as issued now and releases the host
    pub fn commit(mut self) -> Instant {
        let now = Instant::now();
        self.guard.record_request(now);
        tracing::trace!(
            "Committed fetch #{} to {}",
            self.guard.request_count,
            self.host
        );
        now
    }
}

/// Scheduler deciding when each host may be fetched
///
/// Each host has its own async mutex, so admission checks for one host are
/// atomic with respect to each other while different hosts never contend.
#[derive(Debug)]
pub struct FetchScheduler {
    /// Configured minimum spacing between fetches to one host
    rate_limit: Duration,

    /// Per-host state, created on first use
    hosts: Mutex<HashMap<String, Arc<Mutex<HostState>>>>,
}

impl FetchScheduler {
    /// Creates a new scheduler with the given per-host spacing
    pub fn new(rate_limit: Duration) -> Self {
        Self {
            rate_limit,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    /// The configured per-host spacing
    pub fn rate_limit(&self) -> Duration {
        self.rate_limit
    }

    async fn host_slot(&self, host: &str) -> Arc<Mutex<HostState>> {
        let mut hosts = self.hosts.lock().await;
        hosts.entry(host.to_string()).or_default().clone()
    }

    /// Returns how long a caller must wait before fetching from `host`
    ///
    /// This is a pure query: nothing is recorded until [`record`] (or
    /// [`HostPermit::commit`]) is called.
    ///
    /// [`record`]: FetchScheduler::record
    pub async fn admit(&self, host: &str) -> Duration {
        let slot = self.host_slot(host).await;
        let state = slot.lock().await;
        state.time_until_next_request(self.rate_limit, Instant::now())
    }

    /// Records a committed fetch to `host` at `at`
    pub async fn record(&self, host: &str, at: Instant) {
        let slot = self.host_slot(host).await;
        let mut state = slot.lock().await;
        state.record_request(at);
    }

    /// Waits until `host` may be fetched and returns a permit for it
    ///
    /// Callers for the same host queue on the host's lock, so each one sees
    /// the previous caller's committed timestamp. Returns `None` if `cancel`
    /// has fired, whether before the call or while waiting; a cancelled
    /// caller never gets a permit.
    pub async fn acquire(&self, host: &str, cancel: &CancellationToken) -> Option<HostPermit> {
        if cancel.is_cancelled() {
            return None;
        }

        let slot = self.host_slot(host).await;

        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            guard = slot.lock_owned() => guard,
        };

        let wait = guard.time_until_next_request(self.rate_limit, Instant::now());
        if !wait.is_zero() {
            tracing::trace!("Host {} not ready, waiting {:?}", host, wait);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        if cancel.is_cancelled() {
            return None;
        }

        Some(HostPermit {
            host: host.to_string(),
            guard,
        })
    }

    /// Sets the robots.txt crawl delay for a host
    ///
    /// The effective spacing for the host becomes the larger of the crawl
    /// delay and the configured rate limit.
    pub async fn set_crawl_delay(&self, host: &str, delay: Option<Duration>) {
        let slot = self.host_slot(host).await;
        let mut state = slot.lock().await;
        state.crawl_delay = delay;
    }

    /// Number of committed fetches to `host` so far
    pub async fn request_count(&self, host: &str) -> u64 {
        let slot = self.hosts.lock().await.get(host).cloned();
        match slot {
            Some(slot) => slot.lock().await.request_count,
            None => 0,
        }
    }

    /// Number of hosts the scheduler has seen
    pub async fn host_count(&self) -> usize {
        self.hosts.lock().await.len()
    }
}
