//! URL handling module
//!
//! This module provides URL normalization (used as the frontier's dedup key)
//! and host-key extraction (used as the rate-limiting key).

mod domain;
mod normalize;

// Re-export main functions
pub use domain::host_key;
pub use normalize::{normalize_parsed, normalize_url};

use url::Url;

/// Returns true if the URL uses a scheme the crawler can fetch
pub fn is_crawlable_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
