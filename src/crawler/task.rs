//! Crawl tasks and the results produced for them

use crate::crawler::extractor::ExtractError;
use crate::crawler::fetcher::FetchError;
use crate::state::TaskState;
use crate::CrawlError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// A URL scheduled for crawling
///
/// Seeds are built with [`CrawlTask::seed`]; every other task comes from
/// [`CrawlTask::child`], which is the only way to get a depth above zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    url: Url,
    depth: u32,
    origin: Option<Url>,
    state: TaskState,
}

impl CrawlTask {
    /// Creates a depth-0 task with no referring page
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            origin: None,
            state: TaskState::Discovered,
        }
    }

    /// Creates a task for a link found on this task's page
    ///
    /// The child is one hop deeper and records this task's URL as its origin.
    pub fn child(&self, url: Url) -> Self {
        Self {
            url,
            depth: self.depth + 1,
            origin: Some(self.url.clone()),
            state: TaskState::Discovered,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// URL of the page this task was discovered on (`None` for seeds)
    pub fn origin(&self) -> Option<&Url> {
        self.origin.as_ref()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_seed(&self) -> bool {
        self.origin.is_none()
    }

    /// Moves the task to `next`, rejecting transitions outside the lifecycle
    pub fn advance(&mut self, next: TaskState) -> Result<(), CrawlError> {
        if !self.state.can_transition_to(next) {
            return Err(CrawlError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Per-task failure recorded in a [`CrawlResult`]
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "stage", content = "error", rename_all = "snake_case")]
pub enum TaskError {
    #[error("network error: {0}")]
    Network(FetchError),

    #[error("extract error: {0}")]
    Extract(ExtractError),
}

/// Outcome of one fetch + extract cycle
///
/// Produced by exactly one worker and handed to the output sink by value.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    /// The URL that was fetched (normalized)
    pub url: String,

    /// Final URL after redirects, when it differs from `url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,

    /// Link hops from the seed
    pub depth: u32,

    /// Page the URL was discovered on
    pub origin: Option<String>,

    /// HTTP status of the last attempt, if a response arrived
    pub status: Option<u16>,

    /// Extracted structured fields
    pub fields: BTreeMap<String, String>,

    /// Outbound links, absolute and de-duplicated, in document order
    pub links: Vec<String>,

    /// When the fetch finished
    pub fetched_at: DateTime<Utc>,

    /// Number of fetch attempts made
    pub attempts: u32,

    /// Failure, if any
    pub error: Option<TaskError>,
}

impl CrawlResult {
    /// Creates an empty result for `task`, stamped now
    pub fn for_task(task: &CrawlTask) -> Self {
        Self {
            url: task.url().to_string(),
            final_url: None,
            depth: task.depth(),
            origin: task.origin().map(|u| u.to_string()),
            status: None,
            fields: BTreeMap::new(),
            links: Vec::new(),
            fetched_at: Utc::now(),
            attempts: 0,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
