//! Output module for crawl results and run summaries
//!
//! This module handles:
//! - Streaming results to the configured sink (JSON lines, CSV, SQLite)
//! - Collecting run statistics
//! - Generating markdown summaries

mod csv;
mod json;
mod markdown;
mod memory;
mod sqlite;
pub mod stats;
mod traits;

pub use self::csv::CsvSink;
pub use json::JsonLinesSink;
pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use memory::MemorySink;
pub use sqlite::SqliteSink;
pub use stats::{print_summary, RunSummary};
pub use traits::{OutputError, OutputResult, OutputSink};

use crate::config::{CrawlConfig, OutputFormat};

/// Opens the sink selected by `output_format`
///
/// JSON and CSV go to `output_path` when set and to stdout otherwise. SQLite
/// needs a file.
pub fn open_sink(config: &CrawlConfig) -> OutputResult<Box<dyn OutputSink>> {
    let path = config.output_path.as_deref();

    let sink: Box<dyn OutputSink> = match (config.output_format, path) {
        (OutputFormat::Json, Some(path)) => Box::new(JsonLinesSink::create(path)?),
        (OutputFormat::Json, None) => Box::new(JsonLinesSink::stdout()),
        (OutputFormat::Csv, Some(path)) => Box::new(CsvSink::create(path)?),
        (OutputFormat::Csv, None) => Box::new(CsvSink::stdout()),
        (OutputFormat::Sqlite, Some(path)) => Box::new(SqliteSink::open(path)?),
        (OutputFormat::Sqlite, None) => {
            return Err(OutputError::Write(
                "sqlite output requires an output path".to_string(),
            ))
        }
    };

    tracing::debug!(
        "Writing {} output to {}",
        config.output_format,
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string())
    );

    Ok(sink)
}
