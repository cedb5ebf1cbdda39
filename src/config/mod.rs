//! Configuration module for the crawler
//!
//! This module handles loading, parsing, serializing and validating TOML
//! configuration files. Every key is optional; missing keys take the
//! documented defaults.
//!
//! # Example
//!
//! ```no_run
//! use fuelog_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("crawler.toml")).unwrap();
//! println!("Crawler will wait {}s between requests to a host", config.rate_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{default_user_agent, CrawlConfig, OutputFormat, QueuePolicy};

// Re-export parser functions
pub use parser::{
    compute_config_hash, hash_config, load_config, load_config_with_hash, parse_config,
};
pub use validation::validate;
