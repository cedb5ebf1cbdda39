//! CSV sink
//!
//! One header row followed by one row per result. Links are joined with `|`
//! and fields are stored as a JSON object so the column set stays fixed.

use crate::crawler::CrawlResult;
use crate::output::traits::{OutputResult, OutputSink};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const CSV_HEADER: &[&str] = &[
    "url",
    "final_url",
    "depth",
    "origin",
    "status",
    "fetched_at",
    "attempts",
    "error",
    "fields",
    "links",
];

/// Separator between links in the `links` column
pub const LINK_SEPARATOR: &str = "|";

pub struct CsvSink<W: Write + Send> {
    writer: BufWriter<W>,
    header_written: bool,
    written: usize,
}

impl<W: Write + Send> CsvSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            header_written: false,
            written: 0,
        }
    }

    pub fn into_inner(self) -> OutputResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error().into())
    }

    fn write_header(&mut self) -> OutputResult<()> {
        if !self.header_written {
            write_row(&mut self.writer, CSV_HEADER.iter().copied())?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl CsvSink<File> {
    pub fn create(path: &Path) -> OutputResult<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl CsvSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> OutputSink for CsvSink<W> {
    fn write(&mut self, result: CrawlResult) -> OutputResult<()> {
        self.write_header()?;

        let depth = result.depth.to_string();
        let status = result.status.map(|s| s.to_string()).unwrap_or_default();
        let fetched_at = result.fetched_at.to_rfc3339();
        let attempts = result.attempts.to_string();
        let error = result.error.as_ref().map(|e| e.to_string()).unwrap_or_default();
        let fields = serde_json::to_string(&result.fields)?;
        let links = result.links.join(LINK_SEPARATOR);

        write_row(
            &mut self.writer,
            [
                result.url.as_str(),
                result.final_url.as_deref().unwrap_or(""),
                depth.as_str(),
                result.origin.as_deref().unwrap_or(""),
                status.as_str(),
                fetched_at.as_str(),
                attempts.as_str(),
                error.as_str(),
                fields.as_str(),
                links.as_str(),
            ],
        )?;

        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        // a run with no results still gets a header
        self.write_header()?;
        self.writer.flush()?;
        Ok(())
    }

    fn written(&self) -> usize {
        self.written
    }
}

fn write_row<'a, W: Write>(
    writer: &mut W,
    cells: impl IntoIterator<Item = &'a str>,
) -> io::Result<()> {
    let mut first = true;
    for cell in cells {
        if !first {
            writer.write_all(b",")?;
        }
        first = false;
        writer.write_all(escape_cell(cell).as_bytes())?;
    }
    writer.write_all(b"\r\n")
}

/// Quotes a cell when it contains a delimiter, quote or line break
fn escape_cell(cell: &str) -> String {
    if cell.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
