//! Fuelog crawler main entry point
//!
//! This is the command-line interface for the Fuelog crawler.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use fuelog_crawler::config::{load_config_with_hash, validate};
use fuelog_crawler::output::print_summary;
use fuelog_crawler::{run_crawl, CrawlConfig, OutputFormat, QueuePolicy};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Fuelog: a polite, configurable web crawler
///
/// Fetches pages under a per-host rate limit, extracts structured fields and
/// links, follows links up to an optional depth, and writes one record per
/// page as JSON lines, CSV or SQLite.
#[derive(Parser, Debug)]
#[command(name = "fuelog-crawler")]
#[command(version)]
#[command(about = "A polite, configurable web crawler", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl starting from one or more seed URLs
    Run(RunArgs),

    /// Print the version and the effective configuration
    Info {
        /// Path to TOML configuration file
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Seed URLs
    #[arg(value_name = "SEED", required = true)]
    seeds: Vec<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Minimum seconds between requests to the same host
    #[arg(long)]
    rate_limit: Option<f64>,

    /// User-Agent header to send
    #[arg(long)]
    user_agent: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Output format: json, csv or sqlite
    #[arg(long)]
    output_format: Option<OutputFormat>,

    /// Write results here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Write a markdown run summary here
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,

    /// Maximum link depth from the seeds
    #[arg(long)]
    max_depth: Option<u32>,

    /// Only fetch the seeds
    #[arg(long)]
    no_follow_links: bool,

    /// Number of concurrent workers
    #[arg(long)]
    workers: Option<usize>,

    /// Fetch attempts per page
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Dequeue order: fifo, lifo or shallowest-first
    #[arg(long)]
    queue_policy: Option<QueuePolicy>,

    /// Do not fetch or obey robots.txt
    #[arg(long)]
    ignore_robots: bool,
}

impl RunArgs {
    /// Applies command-line overrides on top of the file configuration
    fn apply(&self, config: &mut CrawlConfig) {
        if let Some(rate_limit) = self.rate_limit {
            config.rate_limit = rate_limit;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }
        if let Some(format) = self.output_format {
            config.output_format = format;
        }
        if let Some(output) = &self.output {
            config.output_path = Some(output.clone());
        }
        if let Some(summary) = &self.summary {
            config.summary_path = Some(summary.clone());
        }
        if let Some(max_depth) = self.max_depth {
            config.max_depth = Some(max_depth);
        }
        if self.no_follow_links {
            config.follow_links = false;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        if let Some(policy) = self.queue_policy {
            config.queue_policy = policy;
        }
        if self.ignore_robots {
            config.respect_robots = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let outcome = match cli.command {
        Command::Run(args) => handle_run(args).await,
        Command::Info { config } => handle_info(config.as_deref()),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr; stdout is reserved for result output.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("fuelog_crawler=info,warn"),
            1 => EnvFilter::new("fuelog_crawler=debug,info"),
            2 => EnvFilter::new("fuelog_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load(path: Option<&Path>) -> anyhow::Result<CrawlConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok(config)
        }
        None => Ok(CrawlConfig::default()),
    }
}

/// Handles the `info` command: prints the version and effective configuration
fn handle_info(path: Option<&Path>) -> anyhow::Result<()> {
    let config = load(path)?;

    println!("fuelog-crawler {}\n", env!("CARGO_PKG_VERSION"));
    println!("Effective configuration:\n");
    print!("{}", config.to_toml_string()?);

    Ok(())
}

/// Handles the `run` command
async fn handle_run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load(args.config.as_deref())?;
    args.apply(&mut config);
    validate(&config).context("invalid configuration")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight requests");
            on_signal.cancel();
        }
    });

    let summary = run_crawl(config, &args.seeds, cancel)
        .await
        .context("crawl failed")?;

    print_summary(&summary);
    Ok(())
}
