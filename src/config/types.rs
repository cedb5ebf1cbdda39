use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Returns the default user agent, `Fuelog-Crawler/<crate version>`
pub fn default_user_agent() -> String {
    format!("Fuelog-Crawler/{}", env!("CARGO_PKG_VERSION"))
}

/// Format of the per-task records written by the output sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Newline-delimited JSON, one object per result
    #[default]
    Json,
    /// CSV with a header row
    Csv,
    /// SQLite database file (requires `output_path`)
    Sqlite,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" | "jsonl" | "ndjson" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "sqlite" | "db" => Ok(Self::Sqlite),
            other => Err(format!(
                "unknown output format '{}', expected json, csv or sqlite",
                other
            )),
        }
    }
}

/// Order in which the frontier hands out pending tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// First in, first out (breadth-first)
    #[default]
    Fifo,
    /// Last in, first out (depth-first)
    Lifo,
    /// Lowest depth first, insertion order among equal depths
    ShallowestFirst,
}

impl FromStr for QueuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "fifo" | "bfs" => Ok(Self::Fifo),
            "lifo" | "dfs" => Ok(Self::Lifo),
            "shallowest_first" => Ok(Self::ShallowestFirst),
            other => Err(format!(
                "unknown queue policy '{}', expected fifo, lifo or shallowest-first",
                other
            )),
        }
    }
}

/// Crawl run configuration
///
/// Created once at startup and shared read-only (behind an `Arc`) for the
/// whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    /// Minimum seconds between two fetches to the same host
    pub rate_limit: f64,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Per-request timeout in seconds
    pub timeout: u64,

    /// Format of the result records
    pub output_format: OutputFormat,

    /// Maximum link depth from a seed (unset = unlimited)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    /// Whether extracted links are enqueued at all
    pub follow_links: bool,

    /// Number of concurrent workers
    pub workers: usize,

    /// Fetch attempts per task, including the first
    pub max_attempts: u32,

    /// Initial retry backoff in seconds (doubles per attempt)
    pub retry_backoff: f64,

    /// Maximum redirects followed per request
    pub max_redirects: usize,

    /// Whether robots.txt is fetched and honoured
    pub respect_robots: bool,

    /// Frontier dequeue order
    pub queue_policy: QueuePolicy,

    /// Where results are written (stdout when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,

    /// Where the markdown run summary is written (not written when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_path: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            rate_limit: 1.0,
            user_agent: default_user_agent(),
            timeout: 30,
            output_format: OutputFormat::Json,
            max_depth: None,
            follow_links: true,
            workers: 4,
            max_attempts: 3,
            retry_backoff: 0.5,
            max_redirects: 10,
            respect_robots: true,
            queue_policy: QueuePolicy::Fifo,
            output_path: None,
            summary_path: None,
        }
    }
}

impl CrawlConfig {
    /// Rate limit as a `Duration`
    pub fn rate_limit_duration(&self) -> Duration {
        secs_f64(self.rate_limit)
    }

    /// Request timeout as a `Duration`
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Initial retry backoff as a `Duration`
    pub fn retry_backoff_duration(&self) -> Duration {
        secs_f64(self.retry_backoff)
    }

    /// Serializes the configuration to its TOML representation
    pub fn to_toml_string(&self) -> Result<String, crate::ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

/// Converts non-negative float seconds to a `Duration`, zero for anything invalid
fn secs_f64(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}
