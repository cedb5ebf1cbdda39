//! In-memory sink for library use and tests

use crate::crawler::CrawlResult;
use crate::output::traits::{OutputResult, OutputSink};

/// Collects results in arrival order
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Vec<CrawlResult>,
    finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[CrawlResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<CrawlResult> {
        self.results
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Looks up the result for `url`
    pub fn get(&self, url: &str) -> Option<&CrawlResult> {
        self.results.iter().find(|r| r.url == url)
    }
}

impl OutputSink for MemorySink {
    fn write(&mut self, result: CrawlResult) -> OutputResult<()> {
        self.results.push(result);
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.finished = true;
        Ok(())
    }

    fn written(&self) -> usize {
        self.results.len()
    }
}
