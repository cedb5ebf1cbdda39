//! HTML extractor for structured fields and outbound links
//!
//! This module handles parsing fetched HTML to extract:
//! - Structured fields through pluggable [`FieldRule`]s
//! - Links to follow (from `<a>` tags)
//!
//! Parsing is lenient: html5ever recovers from broken markup, so missing
//! fields are simply absent from the result.

use crate::url::is_crawlable_scheme;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Why extraction failed
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExtractError {
    /// Nothing could be recovered from the document
    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),
}

/// Fields and links recovered from one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    pub fields: BTreeMap<String, String>,

    /// Absolute http(s) links in document order, without duplicates
    pub links: Vec<String>,
}

/// A rule producing one named field from a parsed document
pub trait FieldRule: Send + Sync + fmt::Debug {
    /// Key the value is stored under
    fn name(&self) -> &str;

    /// Returns the field value, or `None` when the page does not have it
    fn extract(&self, document: &Html) -> Option<String>;
}

/// Field rule backed by a CSS selector
///
/// Takes the first matching element and reads either its text or one of its
/// attributes.
#[derive(Debug, Clone)]
pub struct SelectorRule {
    name: String,
    selector: Selector,
    attribute: Option<String>,
}

impl SelectorRule {
    /// Rule reading the text content of the first match
    pub fn text(name: &str, css: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            name: name.to_string(),
            selector: parse_selector(css)?,
            attribute: None,
        })
    }

    /// Rule reading `attribute` of the first match
    pub fn attribute(name: &str, css: &str, attribute: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            name: name.to_string(),
            selector: parse_selector(css)?,
            attribute: Some(attribute.to_string()),
        })
    }
}

impl FieldRule for SelectorRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, document: &Html) -> Option<String> {
        let element = document.select(&self.selector).next()?;

        let value = match &self.attribute {
            Some(attribute) => element.value().attr(attribute)?.to_string(),
            None => collapse_whitespace(&element.text().collect::<String>()),
        };

        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

fn parse_selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|e| ExtractError::InvalidSelector(format!("{}: {:?}", css, e)))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rules applied by [`HtmlExtractor::new`]
///
/// | Field | Source |
/// |-------|--------|
/// | `title` | `<title>` text |
/// | `description` | `<meta name="description">` content |
/// | `h1` | first `<h1>` text |
/// | `canonical` | `<link rel="canonical">` href |
/// | `lang` | `<html lang>` |
pub fn default_rules() -> Vec<Box<dyn FieldRule>> {
    let rules = [
        SelectorRule::text("title", "title"),
        SelectorRule::attribute("description", "meta[name='description']", "content"),
        SelectorRule::text("h1", "h1"),
        SelectorRule::attribute("canonical", "link[rel='canonical']", "href"),
        SelectorRule::attribute("lang", "html", "lang"),
    ];

    rules
        .into_iter()
        .filter_map(Result::ok)
        .map(|rule| Box::new(rule) as Box<dyn FieldRule>)
        .collect()
}

/// Extracts fields and links from HTML
#[derive(Debug)]
pub struct HtmlExtractor {
    rules: Vec<Box<dyn FieldRule>>,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor {
    /// Creates an extractor with the [`default_rules`]
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Creates an extractor that only collects links
    pub fn without_rules() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a field rule
    ///
    /// Rules run in the order added. When several share a name, the last one
    /// that finds a value wins; one that finds nothing keeps the earlier value.
    pub fn with_rule(mut self, rule: impl FieldRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Parses `raw` and extracts fields and links
    ///
    /// Relative links resolve against `<base href>` when the page has one,
    /// otherwise against `base_url`. Fails with [`ExtractError::Malformed`]
    /// only when the document is blank or has no content past the implied
    /// `html`/`head`/`body` skeleton.
    pub fn extract(&self, raw: &str, base_url: &Url) -> Result<ExtractedPage, ExtractError> {
        if raw.trim().is_empty() {
            return Err(ExtractError::Malformed("empty document".to_string()));
        }

        let document = Html::parse_document(raw);
        if !has_content(&document) {
            return Err(ExtractError::Malformed(
                "no content could be recovered".to_string(),
            ));
        }

        let mut fields = BTreeMap::new();
        for rule in &self.rules {
            if let Some(value) = rule.extract(&document) {
                fields.insert(rule.name().to_string(), value);
            }
        }

        let base = document_base(&document, base_url);
        let links = extract_links(&document, &base);

        Ok(ExtractedPage { fields, links })
    }
}

/// Returns true if the parsed tree holds any text or any element the parser
/// did not synthesise
fn has_content(document: &Html) -> bool {
    let root = document.root_element();

    if root.text().any(|t| !t.trim().is_empty()) {
        return true;
    }

    root.descendants()
        .filter_map(ElementRef::wrap)
        .any(|e| !matches!(e.value().name(), "html" | "head" | "body"))
}

/// Resolves the document's `<base href>`, falling back to `base_url`
fn document_base(document: &Html, base_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return base_url.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|e| e.value().attr("href"))
        .and_then(|href| base_url.join(href.trim()).ok())
        .filter(is_crawlable_scheme)
        .unwrap_or_else(|| base_url.clone())
}

/// Extracts all followable links in document order
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
/// - Anything that does not resolve to http(s)
///
/// `rel="nofollow"` links are followed.
fn extract_links(document: &Html, base: &Url) -> Vec<String> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Ok(a_selector) = Selector::parse("a[href]") else {
        return links;
    };

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        if let Some(absolute_url) = resolve_link(href, base) {
            if seen.insert(absolute_url.clone()) {
                links.push(absolute_url);
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL without its fragment
fn resolve_link(href: &str, base: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base.join(href).ok()?;
    if !is_crawlable_scheme(&absolute_url) {
        return None;
    }
    absolute_url.set_fragment(None);

    Some(absolute_url.to_string())
}
