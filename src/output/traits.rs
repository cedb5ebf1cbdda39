//! Output sink trait and error types
//!
//! A sink receives every [`CrawlResult`] of a run, one at a time and by value,
//! in the order workers finish them.

use crate::crawler::CrawlResult;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Consumer that persists crawl results
///
/// Sinks are owned by the controller and only ever driven from one task, so
/// they need `Send` but not `Sync`.
pub trait OutputSink: Send {
    /// Persists one result, taking ownership of it
    fn write(&mut self, result: CrawlResult) -> OutputResult<()>;

    /// Flushes buffered output; called once after the last write
    fn finish(&mut self) -> OutputResult<()> {
        Ok(())
    }

    /// Number of results written so far
    fn written(&self) -> usize;
}

impl<S: OutputSink + ?Sized> OutputSink for Box<S> {
    fn write(&mut self, result: CrawlResult) -> OutputResult<()> {
        (**self).write(result)
    }

    fn finish(&mut self) -> OutputResult<()> {
        (**self).finish()
    }

    fn written(&self) -> usize {
        (**self).written()
    }
}
