//! Robots.txt handling module
//!
//! This module provides parsing of robots.txt files and a per-run cache so
//! each host's robots.txt is fetched at most once.

mod cache;
mod parser;

pub use cache::RobotsCache;
pub use parser::{product_token, ParsedRobots};

use url::Url;

/// Builds the robots.txt URL for the host serving `url`
///
/// # Examples
///
/// ```
/// use fuelog_crawler::robots::robots_url;
/// use url::Url;
///
/// let page = Url::parse("https://example.com:8443/a/b?q=1").unwrap();
/// assert_eq!(
///     robots_url(&page).unwrap().as_str(),
///     "https://example.com:8443/robots.txt"
/// );
/// ```
pub fn robots_url(url: &Url) -> Option<Url> {
    url.join("/robots.txt").ok()
}
