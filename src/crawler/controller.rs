//! Crawl controller - main crawl orchestration logic
//!
//! This module runs one crawl to completion or cancellation:
//! - Seeding the frontier
//! - Running a bounded pool of workers that fetch, extract and requeue links
//! - Checking robots.txt per host
//! - Streaming results to the output sink
//! - Building the run summary

use crate::config::{hash_config, validate, CrawlConfig};
use crate::crawler::extractor::HtmlExtractor;
use crate::crawler::fetcher::{FetchError, HttpFetcher};
use crate::crawler::frontier::{visit_key, CrawlFrontier};
use crate::crawler::scheduler::FetchScheduler;
use crate::crawler::task::{CrawlResult, CrawlTask, TaskError};
use crate::output::{open_sink, write_markdown_summary, OutputSink, RunSummary};
use crate::robots::RobotsCache;
use crate::state::{SkipReason, TaskState};
use crate::url::{host_key, is_crawlable_scheme};
use crate::{ConfigError, CrawlError, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Results between progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// Drives a crawl run
///
/// # Example
///
/// ```no_run
/// use fuelog_crawler::crawler::CrawlController;
/// use fuelog_crawler::output::MemorySink;
/// use fuelog_crawler::CrawlConfig;
///
/// # async fn demo() -> fuelog_crawler::Result<()> {
/// let controller = CrawlController::new(CrawlConfig::default())?;
/// let mut sink = MemorySink::new();
/// let summary = controller.run(&["https://example.com/"], &mut sink).await?;
/// println!("{} completed, {} failed", summary.completed, summary.failed);
/// # Ok(())
/// # }
/// ```
pub struct CrawlController {
    config: Arc<CrawlConfig>,
    config_hash: String,
    scheduler: Arc<FetchScheduler>,
    fetcher: HttpFetcher,
    extractor: Arc<HtmlExtractor>,
    cancel: CancellationToken,
}

impl CrawlController {
    /// Creates a controller for `config`
    ///
    /// Fails with a configuration error before anything is fetched if the
    /// configuration is invalid.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        validate(&config)?;

        let config_hash = hash_config(&config)?;
        let scheduler = Arc::new(FetchScheduler::new(config.rate_limit_duration()));
        let fetcher = HttpFetcher::new(&config, scheduler.clone())?;

        Ok(Self {
            config: Arc::new(config),
            config_hash,
            scheduler,
            fetcher,
            extractor: Arc::new(HtmlExtractor::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Replaces the default field extraction rules
    pub fn with_extractor(mut self, extractor: HtmlExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Uses an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn scheduler(&self) -> &Arc<FetchScheduler> {
        &self.scheduler
    }

    /// Crawls from `seeds` until the frontier runs dry or the run is cancelled
    ///
    /// Every fetched task produces exactly one result in `sink`. Per-task
    /// failures are recorded in the results; only invalid seeds, sink
    /// failures and worker crashes fail the run.
    pub async fn run<S: AsRef<str>>(
        &self,
        seeds: &[S],
        sink: &mut dyn OutputSink,
    ) -> Result<RunSummary> {
        let seeds = parse_seeds(seeds)?;
        let start_time = Instant::now();
        let mut summary = RunSummary::new();
        summary.config_hash = Some(self.config_hash.clone());

        tracing::info!(
            "Starting crawl of {} seed(s) with {} worker(s), config {}",
            seeds.len(),
            self.config.workers,
            &self.config_hash[..12]
        );

        let mut frontier = CrawlFrontier::from_config(&self.config);
        for url in seeds {
            frontier.enqueue(CrawlTask::seed(url))?;
        }

        let ctx = Arc::new(WorkerContext {
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            extractor: self.extractor.clone(),
            robots: RobotsCache::new(),
            frontier: Mutex::new(frontier),
            wake: Notify::new(),
            cancel: self.cancel.clone(),
            disallowed: AtomicUsize::new(0),
        });

        let (tx, mut rx) = mpsc::channel(self.config.workers * 2);
        let mut workers = JoinSet::new();
        for id in 0..self.config.workers {
            workers.spawn(worker(id, ctx.clone(), tx.clone()));
        }
        drop(tx);

        let mut sink_error = None;
        let mut worker_error = None;
        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(result) = received else {
                        break;
                    };
                    summary.record(&result);

                    if let Err(e) = sink.write(result) {
                        tracing::error!("Output sink failed, stopping crawl: {}", e);
                        self.cancel.cancel();
                        sink_error = Some(e);
                        break;
                    }

                    let emitted = summary.total_results();
                    if emitted % PROGRESS_INTERVAL == 0 {
                        let pending = ctx.frontier.lock().await.pending();
                        let rate = emitted as f64 / start_time.elapsed().as_secs_f64();
                        tracing::info!(
                            "Progress: {} results ({} failed), {} pending, {:.2} pages/sec",
                            emitted,
                            summary.failed,
                            pending,
                            rate
                        );
                    }
                }

                // a crashed worker may leave a task in flight forever, so stop at once
                Some(joined) = workers.join_next(), if !workers.is_empty() => {
                    if let Err(e) = worker_outcome(joined) {
                        tracing::error!("Worker failed, stopping crawl: {}", e);
                        self.cancel.cancel();
                        worker_error = Some(e);
                        break;
                    }
                }
            }
        }
        drop(rx);

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = worker_outcome(joined) {
                tracing::error!("Worker failed: {}", e);
                self.cancel.cancel();
                worker_error.get_or_insert(e);
            }
        }

        if let Some(e) = sink_error {
            return Err(e.into());
        }
        if let Some(e) = worker_error {
            return Err(e);
        }

        sink.finish()?;

        let stats = ctx.frontier.lock().await.stats();
        summary.duplicates = stats.duplicates;
        summary.depth_exceeded = stats.depth_exceeded;
        summary.disallowed = ctx.disallowed.load(Ordering::Relaxed);
        summary.finish(start_time.elapsed(), self.cancel.is_cancelled());

        tracing::info!(
            "Crawl {}: {} completed, {} failed, {} skipped in {:?}",
            summary.status(),
            summary.completed,
            summary.failed,
            summary.skipped(),
            summary.elapsed
        );

        Ok(summary)
    }
}

/// Runs a complete crawl with the configured sink
///
/// This is the main entry point for a crawl. It will:
/// 1. Validate the configuration and build the controller
/// 2. Open the output sink
/// 3. Crawl from the seeds until done or `cancel` fires
/// 4. Write the markdown summary when `summary_path` is set
pub async fn run_crawl<S: AsRef<str>>(
    config: CrawlConfig,
    seeds: &[S],
    cancel: CancellationToken,
) -> Result<RunSummary> {
    let summary_path = config.summary_path.clone();
    let controller = CrawlController::new(config)?.with_cancellation(cancel);
    let mut sink = open_sink(controller.config())?;

    let summary = controller.run(seeds, sink.as_mut()).await?;

    if let Some(path) = summary_path {
        write_markdown_summary(&summary, &path)?;
        tracing::info!("Wrote summary to {}", path.display());
    }

    Ok(summary)
}

fn worker_outcome(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    joined.map_err(|e| CrawlError::Worker(e.to_string()))?
}

fn parse_seeds<S: AsRef<str>>(seeds: &[S]) -> Result<Vec<Url>> {
    if seeds.is_empty() {
        return Err(ConfigError::Validation("at least one seed URL is required".to_string()).into());
    }

    seeds
        .iter()
        .map(|seed| {
            let seed = seed.as_ref();
            let invalid = |reason: String| {
                CrawlError::from(ConfigError::InvalidUrl(format!("{}: {}", seed, reason)))
            };

            let mut url = Url::parse(seed.trim()).map_err(|e| invalid(e.to_string()))?;
            if !is_crawlable_scheme(&url) {
                return Err(invalid(format!("unsupported scheme {}", url.scheme())));
            }
            if !url.has_host() {
                return Err(invalid("missing host".to_string()));
            }
            url.set_fragment(None);
            Ok(url)
        })
        .collect()
}

/// State shared by the workers of one run
struct WorkerContext {
    config: Arc<CrawlConfig>,
    fetcher: HttpFetcher,
    extractor: Arc<HtmlExtractor>,
    robots: RobotsCache,
    frontier: Mutex<CrawlFrontier>,

    /// Signalled whenever the frontier may have work or has gone idle
    wake: Notify,

    cancel: CancellationToken,
    disallowed: AtomicUsize,
}

/// What a worker did with one task
enum TaskOutcome {
    /// A result to emit, plus the post-redirect URL if it is a different page
    Emitted(CrawlResult, Option<Url>),

    /// Redirected onto a page another task already owns
    Redirected,

    /// Disallowed by robots.txt
    Disallowed,

    /// The run was cancelled before the task finished
    Cancelled,
}

async fn worker(
    id: usize,
    ctx: Arc<WorkerContext>,
    tx: mpsc::Sender<CrawlResult>,
) -> Result<()> {
    tracing::debug!("Worker {} started", id);

    while let Some(mut task) = ctx.next_task().await {
        let mut outcome = ctx.process(&mut task).await;

        {
            let mut frontier = ctx.frontier.lock().await;
            let lost_redirect = match &outcome {
                Ok(TaskOutcome::Emitted(_, Some(final_url))) => {
                    !frontier.claim_redirect(final_url)
                }
                _ => false,
            };
            if lost_redirect {
                tracing::debug!("Dropping {}: redirected to an already visited page", task.url());
                outcome = Ok(TaskOutcome::Redirected);
            }
            if let Ok(TaskOutcome::Emitted(result, _)) = &outcome {
                if result.is_success() && !ctx.cancel.is_cancelled() {
                    let added = frontier.enqueue_links(&task, &result.links);
                    if let Err(e) = added {
                        frontier.finish();
                        ctx.wake.notify_waiters();
                        return Err(e);
                    }
                }
            }
            frontier.finish();
        }
        ctx.wake.notify_waiters();

        if let TaskOutcome::Emitted(result, _) = outcome? {
            if tx.send(result).await.is_err() {
                break;
            }
        }
    }

    tracing::debug!("Worker {} finished", id);
    Ok(())
}

impl WorkerContext {
    /// Waits for the next task; `None` once the crawl is done or cancelled
    async fn next_task(&self) -> Option<CrawlTask> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            // created before checking so a wake between check and await is not lost
            let woken = self.wake.notified();

            {
                let mut frontier = self.frontier.lock().await;
                if let Some(task) = frontier.dequeue() {
                    return Some(task);
                }
                if frontier.is_idle() {
                    drop(frontier);
                    self.wake.notify_waiters();
                    return None;
                }
            }

            tokio::select! {
                _ = woken => {}
                _ = self.cancel.cancelled() => return None,
            }
        }
    }

    async fn process(&self, task: &mut CrawlTask) -> Result<TaskOutcome> {
        if self.config.respect_robots && !self.robots_allow(task.url()).await {
            task.advance(TaskState::Skipped(SkipReason::Disallowed))?;
            self.disallowed.fetch_add(1, Ordering::Relaxed);
            tracing::info!("URL {} disallowed by robots.txt", task.url());
            return Ok(TaskOutcome::Disallowed);
        }

        if self.cancel.is_cancelled() {
            return Ok(TaskOutcome::Cancelled);
        }

        let report = self.fetcher.fetch(task.url(), &self.cancel).await;

        let mut result = CrawlResult::for_task(task);
        result.attempts = report.attempts;
        result.fetched_at = Utc::now();
        let mut final_url = None;

        match report.outcome {
            Err(FetchError::Cancelled) => return Ok(TaskOutcome::Cancelled),

            Err(error) => {
                if let FetchError::HttpStatus(code) = error {
                    result.status = Some(code);
                }
                tracing::warn!(
                    "Failed {} after {} attempt(s): {}",
                    task.url(),
                    report.attempts,
                    error
                );
                result.error = Some(TaskError::Network(error));
                task.advance(TaskState::Failed)?;
            }

            Ok(page) => {
                result.status = Some(page.status);

                if page.final_url != *task.url() {
                    if visit_key(&page.final_url) != visit_key(task.url()) {
                        final_url = Some(page.final_url.clone());
                    }
                    result.final_url = Some(page.final_url.to_string());
                }

                if page.is_html() {
                    match self.extractor.extract(&page.body, &page.final_url) {
                        Ok(extracted) => {
                            result.fields = extracted.fields;
                            result.links = extracted.links;
                            task.advance(TaskState::Completed)?;
                        }
                        Err(error) => {
                            tracing::warn!("Failed to extract {}: {}", task.url(), error);
                            result.error = Some(TaskError::Extract(error));
                            task.advance(TaskState::Failed)?;
                        }
                    }
                } else {
                    if let Some(content_type) = page.content_type {
                        result.fields.insert("content_type".to_string(), content_type);
                    }
                    task.advance(TaskState::Completed)?;
                }

                tracing::debug!(
                    "Processed {} (status {}, {} links)",
                    task.url(),
                    page.status,
                    result.links.len()
                );
            }
        }

        Ok(TaskOutcome::Emitted(result, final_url))
    }

    /// Checks robots.txt for `url`, fetching the host's rules on first use
    async fn robots_allow(&self, url: &Url) -> bool {
        let Some(host) = host_key(url) else {
            return true;
        };

        let robots = self
            .robots
            .get_or_fetch(&host, || async {
                let robots = self.fetcher.fetch_robots(url, &self.cancel).await;
                if let Some(delay) = robots.crawl_delay(&self.config.user_agent) {
                    tracing::info!("Host {} requests a crawl delay of {:?}", host, delay);
                    self.fetcher
                        .scheduler()
                        .set_crawl_delay(&host, Some(delay))
                        .await;
                }
                robots
            })
            .await;

        robots.is_allowed(url.as_str(), &self.config.user_agent)
    }
}
