//! Robots.txt parser implementation
//!
//! Allow/Disallow matching is delegated to the robotstxt crate; Crawl-delay,
//! which that crate does not expose, is parsed here.

use robotstxt::DefaultMatcher;
use std::time::Duration;

/// Returns the product token of a user agent string
///
/// robots.txt groups match on the product token only, so
/// `"Fuelog-Crawler/0.1.0 (+https://example.com)"` becomes `"Fuelog-Crawler"`.
pub fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .find(|part| !part.is_empty())
        .unwrap_or(user_agent)
}

/// Parsed robots.txt data
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content (empty string means allow all)
    content: String,
}

impl ParsedRobots {
    /// Creates a new ParsedRobots from raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    ///
    /// This is used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
        }
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// `url` may be a full URL or a path; `user_agent` is reduced to its
    /// product token before matching.
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.content.trim().is_empty() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, product_token(user_agent), url)
    }

    /// Gets the crawl delay for a specific user agent
    ///
    /// A group naming our product token wins over the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        if self.content.trim().is_empty() {
            return None;
        }

        let mut current_user_agents: Vec<String> = Vec::new();
        let mut in_rules = false;
        let mut crawl_delay_for_wildcard: Option<f64> = None;
        let mut crawl_delay_for_agent: Option<f64> = None;

        let normalized_agent = product_token(user_agent).to_lowercase();

        for line in self.content.lines() {
            // Strip trailing comments
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_lowercase();
            let value = value.trim();

            match key.as_str() {
                "user-agent" => {
                    // A User-agent line after rules starts a new group
                    if in_rules {
                        current_user_agents.clear();
                        in_rules = false;
                    }
                    current_user_agents.push(value.to_lowercase());
                }
                "crawl-delay" => {
                    in_rules = true;
                    let Ok(delay) = value.parse::<f64>() else {
                        continue;
                    };
                    if !delay.is_finite() || delay < 0.0 {
                        continue;
                    }
                    if current_user_agents.iter().any(|ua| *ua == normalized_agent) {
                        crawl_delay_for_agent = Some(delay);
                    } else if current_user_agents.iter().any(|ua| ua == "*") {
                        crawl_delay_for_wildcard = Some(delay);
                    }
                }
                _ => in_rules = true,
            }
        }

        crawl_delay_for_agent
            .or(crawl_delay_for_wildcard)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}
