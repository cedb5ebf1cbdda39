use super::is_crawlable_scheme;
use crate::UrlError;
use url::Url;

/// Tracking query parameters removed during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Normalizes a URL into the form used as the frontier's visited-set key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything but `http` and `https`
/// 3. Lowercase the host (the scheme's default port is dropped by `url`)
/// 4. Normalize path:
///    - Remove dot segments (. and ..) and empty segments
///    - Remove trailing slash (except for root /)
///    - Empty path becomes /
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters
/// 7. Sort remaining query parameters by key (stable for equal keys)
/// 8. Remove empty query string (trailing ?)
///
/// The scheme is preserved: `http://` and `https://` URLs are distinct.
///
/// # Examples
///
/// ```
/// use fuelog_crawler::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/page/#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(url)
}

/// Normalizes an already parsed URL
///
/// See [`normalize_url`] for the rules applied.
pub fn normalize_parsed(mut url: Url) -> Result<Url, UrlError> {
    if !is_crawlable_scheme(&url) {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    if host.is_empty() {
        return Err(UrlError::MissingHost);
    }
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut normalized_segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                normalized_segments.pop();
            }
            _ => normalized_segments.push(segment),
        }
    }

    if normalized_segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", normalized_segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
