//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and redirect limit
//! - Per-request timeouts
//! - Scheduler admission before every attempt
//! - Retry of transient failures
//! - Error classification

use crate::config::CrawlConfig;
use crate::crawler::retry::{retry_with_backoff, RetryPolicy};
use crate::crawler::scheduler::FetchScheduler;
use crate::robots::{robots_url, ParsedRobots};
use crate::url::host_key;
use reqwest::{redirect::Policy, Client, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Why a fetch failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("request failed: {0}")]
    Request(String),

    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Returns true for failures that may succeed on another attempt
    ///
    /// | Condition | Retried |
    /// |-----------|---------|
    /// | Timeout | yes |
    /// | Connection failure | yes |
    /// | HTTP 5xx | yes |
    /// | HTTP 4xx | no |
    /// | Redirect limit | no |
    /// | Other request errors | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) => true,
            Self::HttpStatus(code) => (500..600).contains(code),
            Self::TooManyRedirects | Self::Request(_) | Self::Cancelled => false,
        }
    }

    /// Classifies a reqwest error
    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_redirect() {
            Self::TooManyRedirects
        } else if error.is_connect() {
            Self::ConnectionFailed(error.to_string())
        } else {
            Self::Request(error.to_string())
        }
    }
}

/// A successfully fetched response
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub final_url: Url,

    /// HTTP status code
    pub status: u16,

    /// Content-Type header value
    pub content_type: Option<String>,

    /// Page body content
    pub body: String,
}

impl FetchedPage {
    /// Returns true if the body should be handed to the HTML extractor
    ///
    /// A missing Content-Type is treated as HTML.
    pub fn is_html(&self) -> bool {
        match &self.content_type {
            Some(content_type) => {
                let content_type = content_type.to_ascii_lowercase();
                content_type.contains("text/html") || content_type.contains("application/xhtml")
            }
            None => true,
        }
    }
}

/// Outcome of [`HttpFetcher::fetch`] together with the attempts it took
#[derive(Debug)]
pub struct FetchReport {
    pub outcome: Result<FetchedPage, FetchError>,
    pub attempts: u32,
}

/// Builds an HTTP client with proper configuration
///
/// The timeout is applied per request (see [`HttpFetcher`]); the client only
/// carries a connect timeout bounded by it.
pub fn build_http_client(config: &CrawlConfig) -> Result<Client, reqwest::Error> {
    let connect_timeout = config.timeout_duration().min(Duration::from_secs(10));

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(connect_timeout)
        .redirect(Policy::limited(config.max_redirects))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches URLs under the scheduler's per-host admission
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    scheduler: Arc<FetchScheduler>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl HttpFetcher {
    /// Creates a fetcher from the run configuration
    pub fn new(config: &CrawlConfig, scheduler: Arc<FetchScheduler>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            scheduler,
            retry: RetryPolicy::new(config.max_attempts, config.retry_backoff_duration()),
            timeout: config.timeout_duration(),
        })
    }

    pub fn scheduler(&self) -> &Arc<FetchScheduler> {
        &self.scheduler
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetches a URL with retry
    ///
    /// Every attempt waits for scheduler admission for the URL's host and
    /// commits it right before the request goes out. Transient failures are
    /// retried per [`FetchError::is_retryable`].
    pub async fn fetch(&self, url: &Url, cancel: &CancellationToken) -> FetchReport {
        let Some(host) = host_key(url) else {
            return FetchReport {
                outcome: Err(FetchError::Request(format!("URL has no host: {}", url))),
                attempts: 0,
            };
        };

        let (outcome, attempts) = retry_with_backoff(&self.retry, cancel, |attempt| {
            let host = host.as_str();
            async move {
                tracing::debug!("Fetching {} (attempt {})", url, attempt);
                self.fetch_once(url, host, cancel).await
            }
        })
        .await;

        FetchReport { outcome, attempts }
    }

    /// Fetches and parses the robots.txt governing `url`
    ///
    /// One attempt, admitted like any other request. A missing or unreadable
    /// robots.txt allows everything.
    pub async fn fetch_robots(&self, url: &Url, cancel: &CancellationToken) -> ParsedRobots {
        let (Some(robots), Some(host)) = (robots_url(url), host_key(url)) else {
            return ParsedRobots::allow_all();
        };

        match self.fetch_once(&robots, &host, cancel).await {
            Ok(page) => {
                tracing::debug!("Fetched {} ({} bytes)", robots, page.body.len());
                ParsedRobots::from_content(&page.body)
            }
            Err(e) => {
                tracing::debug!("No usable robots.txt at {}: {}", robots, e);
                ParsedRobots::allow_all()
            }
        }
    }

    /// Performs a single admitted request
    async fn fetch_once(
        &self,
        url: &Url,
        host: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedPage, FetchError> {
        let permit = self
            .scheduler
            .acquire(host, cancel)
            .await
            .ok_or(FetchError::Cancelled)?;
        permit.commit();

        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        read_response(response).await
    }
}

/// Turns a response into a page, mapping non-success statuses to errors
async fn read_response(response: Response) -> Result<FetchedPage, FetchError> {
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus(status.as_u16()));
    }

    let final_url = response.url().clone();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let body = response.text().await.map_err(FetchError::from_reqwest)?;

    Ok(FetchedPage {
        final_url,
        status: status.as_u16(),
        content_type,
        body,
    })
}
