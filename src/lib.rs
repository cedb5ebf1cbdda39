//! Fuelog Crawler: a polite, configurable web crawler
//!
//! This crate fetches pages under a per-host rate limit with a bounded worker
//! pool, extracts structured fields and outbound links, follows links
//! breadth-first up to an optional depth, and streams one result per task to
//! an output sink.

pub mod config;
pub mod crawler;
pub mod output;
pub mod robots;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for crawler operations
///
/// Only these errors abort a run. Per-task failures are recorded in the
/// task's [`crawler::CrawlResult`] instead.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::TaskState,
        to: state::TaskState,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{CrawlConfig, OutputFormat, QueuePolicy};
pub use crawler::{run_crawl, CrawlController, CrawlResult, CrawlTask};
pub use output::RunSummary;
pub use state::{SkipReason, TaskState};
pub use url::{host_key, normalize_url};
