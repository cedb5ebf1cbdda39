//! Newline-delimited JSON sink

use crate::crawler::CrawlResult;
use crate::output::traits::{OutputResult, OutputSink};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    writer: BufWriter<W>,
    written: usize,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            written: 0,
        }
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(self) -> OutputResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}

impl JsonLinesSink<File> {
    /// Creates (or truncates) the file at `path`
    pub fn create(path: &Path) -> OutputResult<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl JsonLinesSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> OutputSink for JsonLinesSink<W> {
    fn write(&mut self, result: CrawlResult) -> OutputResult<()> {
        serde_json::to_writer(&mut self.writer, &result)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}
