//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Per-host admission scheduling
//! - HTTP fetching with retry logic
//! - HTML field and link extraction
//! - The crawl frontier and its dequeue policies
//! - Overall crawl coordination

mod controller;
mod extractor;
mod fetcher;
mod frontier;
mod retry;
mod scheduler;
mod task;

pub use controller::{run_crawl, CrawlController};
pub use extractor::{default_rules, ExtractError, ExtractedPage, FieldRule, HtmlExtractor, SelectorRule};
pub use fetcher::{build_http_client, FetchError, FetchReport, FetchedPage, HttpFetcher};
pub use frontier::{
    policy_for, CrawlFrontier, DequeuePolicy, EnqueueOutcome, FifoPolicy, FrontierStats,
    LifoPolicy, ShallowestFirstPolicy,
};
pub use retry::{retry_with_backoff, RetryPolicy};
pub use scheduler::{FetchScheduler, HostPermit};
pub use task::{CrawlResult, CrawlTask, TaskError};
