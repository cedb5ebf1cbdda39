//! Markdown summary generation
//!
//! This module renders a human-readable run summary: run metadata, task
//! counts, failures grouped by kind, and per-host and per-depth breakdowns.

use crate::output::stats::RunSummary;
use crate::output::traits::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Hosts listed before the table is cut off
const MAX_HOSTS: usize = 50;

/// Writes the markdown summary to `output_path`
pub fn write_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Fuelog Crawl Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        summary.elapsed.as_secs_f64()
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status()));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Overall statistics
    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Results**: {}\n", summary.total_results()));
    md.push_str(&format!("- **Fetch Attempts**: {}\n", summary.total_attempts));
    md.push_str(&format!("- **Links Found**: {}\n", summary.total_links));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        summary.success_rate()
    ));

    // Task outcomes
    md.push_str("## Task Outcomes\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Completed | {} |\n", summary.completed));
    md.push_str(&format!("| Failed | {} |\n", summary.failed));
    md.push_str(&format!("| Skipped: duplicate | {} |\n", summary.duplicates));
    md.push_str(&format!(
        "| Skipped: depth exceeded | {} |\n",
        summary.depth_exceeded
    ));
    md.push_str(&format!(
        "| Skipped: disallowed by robots.txt | {} |\n\n",
        summary.disallowed
    ));

    if !summary.errors.is_empty() {
        md.push_str("## Error Summary\n\n");
        md.push_str("| Error Type | Count |\n");
        md.push_str("|------------|-------|\n");

        let mut errors: Vec<_> = summary.errors.iter().collect();
        errors.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (label, count) in errors {
            md.push_str(&format!("| {} | {} |\n", label, count));
        }
        md.push('\n');
    }

    if !summary.depths.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Results |\n");
        md.push_str("|-------|---------|\n");

        for (depth, count) in &summary.depths {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if !summary.hosts.is_empty() {
        md.push_str("## Hosts\n\n");
        md.push_str("| Host | Results |\n");
        md.push_str("|------|---------|\n");

        let mut hosts: Vec<_> = summary.hosts.iter().collect();
        hosts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        for (host, count) in hosts.iter().take(MAX_HOSTS) {
            md.push_str(&format!("| {} | {} |\n", host, count));
        }
        if hosts.len() > MAX_HOSTS {
            md.push_str(&format!("\n... and {} more\n", hosts.len() - MAX_HOSTS));
        }
        md.push('\n');
    }

    md
}
