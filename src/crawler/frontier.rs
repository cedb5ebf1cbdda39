//! Crawl frontier: pending queue, visited set and depth bound
//!
//! The frontier is a plain owned value. The controller keeps it behind one
//! async mutex, which makes the visited check-and-mark atomic across workers.
//!
//! Tasks keep the URL exactly as resolved from the page; the normalised form
//! is only the visited-set key.

use crate::config::{CrawlConfig, QueuePolicy};
use crate::crawler::task::CrawlTask;
use crate::state::{SkipReason, TaskState};
use crate::url::{is_crawlable_scheme, normalize_parsed};
use crate::Result;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::fmt;
use url::Url;

/// Visited-set key for `url`: its normalised form
///
/// URLs that differ only in ways normalisation removes (fragment, trailing
/// slash, tracking parameters, query order) share a key and are fetched once.
pub fn visit_key(url: &Url) -> String {
    match normalize_parsed(url.clone()) {
        Ok(normalized) => normalized.into(),
        Err(_) => url.as_str().to_string(),
    }
}

/// Order in which pending tasks leave the frontier
pub trait DequeuePolicy: Send + fmt::Debug {
    fn push(&mut self, task: CrawlTask);

    fn pop(&mut self) -> Option<CrawlTask>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// First in, first out: breadth-first crawling
#[derive(Debug, Default)]
pub struct FifoPolicy {
    queue: VecDeque<CrawlTask>,
}

impl DequeuePolicy for FifoPolicy {
    fn push(&mut self, task: CrawlTask) {
        self.queue.push_back(task);
    }

    fn pop(&mut self) -> Option<CrawlTask> {
        self.queue.pop_front()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Last in, first out: depth-first crawling
#[derive(Debug, Default)]
pub struct LifoPolicy {
    stack: Vec<CrawlTask>,
}

impl DequeuePolicy for LifoPolicy {
    fn push(&mut self, task: CrawlTask) {
        self.stack.push(task);
    }

    fn pop(&mut self) -> Option<CrawlTask> {
        self.stack.pop()
    }

    fn len(&self) -> usize {
        self.stack.len()
    }
}

#[derive(Debug)]
struct DepthEntry {
    seq: u64,
    task: CrawlTask,
}

impl PartialEq for DepthEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DepthEntry {}

impl PartialOrd for DepthEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DepthEntry {
    // BinaryHeap is a max-heap; reversed so the shallowest, oldest entry wins
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .task
            .depth()
            .cmp(&self.task.depth())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Lowest depth first, insertion order within a depth
#[derive(Debug, Default)]
pub struct ShallowestFirstPolicy {
    heap: BinaryHeap<DepthEntry>,
    next_seq: u64,
}

impl DequeuePolicy for ShallowestFirstPolicy {
    fn push(&mut self, task: CrawlTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(DepthEntry { seq, task });
    }

    fn pop(&mut self) -> Option<CrawlTask> {
        self.heap.pop().map(|entry| entry.task)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Builds the dequeue policy selected in configuration
pub fn policy_for(policy: QueuePolicy) -> Box<dyn DequeuePolicy> {
    match policy {
        QueuePolicy::Fifo => Box::<FifoPolicy>::default(),
        QueuePolicy::Lifo => Box::<LifoPolicy>::default(),
        QueuePolicy::ShallowestFirst => Box::<ShallowestFirstPolicy>::default(),
    }
}

/// What happened to a task offered to [`CrawlFrontier::enqueue`]
///
/// Rejections are not errors: they are logged and counted, never reported
/// as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Enqueued,

    /// URL was already visited
    Duplicate,

    /// Task is deeper than `max_depth`
    DepthExceeded,

    /// Link following is disabled and the task is not a seed
    NotFollowed,
}

impl EnqueueOutcome {
    pub fn is_enqueued(&self) -> bool {
        matches!(self, Self::Enqueued)
    }
}

/// Counters kept by the frontier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrontierStats {
    pub enqueued: usize,
    pub dequeued: usize,
    pub duplicates: usize,
    pub depth_exceeded: usize,
    pub not_followed: usize,
}

impl FrontierStats {
    /// Tasks rejected with a skip reason
    pub fn skipped(&self) -> usize {
        self.duplicates + self.depth_exceeded
    }
}

/// Discovered-but-unvisited tasks, the visited set and depth tracking
pub struct CrawlFrontier {
    max_depth: Option<u32>,
    follow_links: bool,
    visited: HashSet<String>,
    queue: Box<dyn DequeuePolicy>,
    in_flight: usize,
    stats: FrontierStats,
}

impl fmt::Debug for CrawlFrontier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrawlFrontier")
            .field("max_depth", &self.max_depth)
            .field("follow_links", &self.follow_links)
            .field("visited", &self.visited.len())
            .field("pending", &self.queue.len())
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl CrawlFrontier {
    pub fn new(max_depth: Option<u32>, follow_links: bool, queue: Box<dyn DequeuePolicy>) -> Self {
        Self {
            max_depth,
            follow_links,
            visited: HashSet::new(),
            queue,
            in_flight: 0,
            stats: FrontierStats::default(),
        }
    }

    pub fn from_config(config: &CrawlConfig) -> Self {
        Self::new(
            config.max_depth,
            config.follow_links,
            policy_for(config.queue_policy),
        )
    }

    /// Marks `url` visited; returns false if it already was
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(visit_key(url))
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(&visit_key(url))
    }

    /// Claims the post-redirect URL of a fetched task
    ///
    /// Returns false, counting a duplicate, when another task already owns
    /// that page.
    pub fn claim_redirect(&mut self, url: &Url) -> bool {
        if self.mark_visited(url) {
            return true;
        }
        tracing::debug!("Redirect target {} already visited", url);
        self.stats.duplicates += 1;
        false
    }

    /// Offers a task to the frontier
    ///
    /// Checks run in order: link following, depth bound, then the visited
    /// set. Only a task that passes all three is marked visited and queued.
    /// Fails only if `task` is not in the `Discovered` state.
    pub fn enqueue(&mut self, mut task: CrawlTask) -> Result<EnqueueOutcome> {
        if !self.follow_links && !task.is_seed() {
            self.stats.not_followed += 1;
            return Ok(EnqueueOutcome::NotFollowed);
        }

        if self.max_depth.is_some_and(|max| task.depth() > max) {
            task.advance(TaskState::Skipped(SkipReason::DepthExceeded))?;
            tracing::debug!("Skipping {} (depth {} exceeds limit)", task.url(), task.depth());
            self.stats.depth_exceeded += 1;
            return Ok(EnqueueOutcome::DepthExceeded);
        }

        if !self.mark_visited(task.url()) {
            task.advance(TaskState::Skipped(SkipReason::Duplicate))?;
            tracing::debug!("Skipping {} (already visited)", task.url());
            self.stats.duplicates += 1;
            return Ok(EnqueueOutcome::Duplicate);
        }

        task.advance(TaskState::Enqueued)?;
        self.queue.push(task);
        self.stats.enqueued += 1;
        Ok(EnqueueOutcome::Enqueued)
    }

    /// Enqueues absolute `links` found on `parent`'s page as children
    ///
    /// Returns the number of links actually enqueued. Links that do not parse
    /// as http(s) URLs are dropped.
    pub fn enqueue_links(&mut self, parent: &CrawlTask, links: &[String]) -> Result<usize> {
        if !self.follow_links {
            self.stats.not_followed += links.len();
            return Ok(0);
        }

        let mut added = 0;
        for link in links {
            let mut url = match Url::parse(link) {
                Ok(url) if is_crawlable_scheme(&url) && url.has_host() => url,
                _ => {
                    tracing::debug!("Dropping link {}", link);
                    continue;
                }
            };
            url.set_fragment(None);

            if self.enqueue(parent.child(url))?.is_enqueued() {
                added += 1;
            }
        }

        Ok(added)
    }

    /// Takes the next task according to the dequeue policy
    ///
    /// The task counts as in flight until [`finish`](Self::finish) is called.
    pub fn dequeue(&mut self) -> Option<CrawlTask> {
        let mut task = self.queue.pop()?;
        // queued tasks are always Enqueued
        task.advance(TaskState::Dequeued).ok()?;
        self.in_flight += 1;
        self.stats.dequeued += 1;
        Some(task)
    }

    /// Releases the in-flight slot of a dequeued task
    pub fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// True when nothing is pending and nothing is in flight
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn stats(&self) -> FrontierStats {
        self.stats
    }
}
