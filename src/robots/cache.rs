//! Per-run robots.txt cache
//!
//! Each host's robots.txt is resolved once per run. Concurrent workers asking
//! for the same host wait on the same in-progress fetch instead of issuing
//! their own.

use crate::robots::ParsedRobots;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type Slot = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Robots.txt rules keyed by host
#[derive(Debug, Default)]
pub struct RobotsCache {
    hosts: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rules for `host`, running `fetch` only on first use
    pub async fn get_or_fetch<F, Fut>(&self, host: &str, fetch: F) -> Arc<ParsedRobots>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ParsedRobots>,
    {
        let slot = {
            let mut hosts = self.hosts.lock().await;
            hosts.entry(host.to_string()).or_default().clone()
        };

        slot.get_or_init(|| async move { Arc::new(fetch().await) })
            .await
            .clone()
    }

    /// Returns the cached rules for `host` without fetching
    pub async fn get(&self, host: &str) -> Option<Arc<ParsedRobots>> {
        let hosts = self.hosts.lock().await;
        hosts.get(host).and_then(|slot| slot.get().cloned())
    }

    /// Number of hosts with resolved rules
    pub async fn len(&self) -> usize {
        let hosts = self.hosts.lock().await;
        hosts.values().filter(|slot| slot.initialized()).count()
    }
}
