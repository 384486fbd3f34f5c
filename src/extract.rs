//! Best-effort field extraction from article pages.
//!
//! Each field has an ordered list of [`Rule`]s, a CSS selector paired with a
//! pure extractor function. Rules are tried in order and the first one that
//! yields a non-empty value wins; if none does, the field is absent. The rule
//! lists come from configuration, so the whole thing can be exercised against
//! static HTML without any fetching.
//!
//! Two policies worth knowing:
//! - **Body**: all paragraphs matched by the winning rule, in document order,
//!   are wrapped in `<p>` and concatenated. A body containing a boilerplate
//!   marker disqualifies the whole page.
//! - **Image**: only the first candidate image is considered. If its source is
//!   disqualified (icon, QR code, tracking pixel, ...) the article simply has
//!   no image; there is no fallback to a later one.

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::config::Settings;
use crate::error::{ConfigError, ExtractError};
use crate::models::PartialRecord;

/// Pulls a value out of a document using a selector.
pub type ExtractFn<T> = fn(&Html, &Selector) -> Option<T>;

/// A selector and the extractor applied to its matches.
pub struct Rule<T> {
    source: String,
    selector: Selector,
    extract: ExtractFn<T>,
}

impl<T> Rule<T> {
    pub fn new(source: &str, extract: ExtractFn<T>) -> Result<Self, ConfigError> {
        let selector = Selector::parse(source)
            .map_err(|_| ConfigError::InvalidSelector(source.to_string()))?;
        Ok(Rule {
            source: source.to_string(),
            selector,
            extract,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn apply(&self, document: &Html) -> Option<T> {
        (self.extract)(document, &self.selector)
    }
}

impl<T> std::fmt::Debug for Rule<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Rule").field(&self.source).finish()
    }
}

/// Apply `rules` in order; the first `Some` wins.
pub fn first_match<'r, T>(rules: &'r [Rule<T>], document: &Html) -> Option<(&'r str, T)> {
    rules
        .iter()
        .find_map(|rule| rule.apply(document).map(|v| (rule.source(), v)))
}

fn build_rules<T>(
    sources: &[String],
    extract: ExtractFn<T>,
) -> Result<Vec<Rule<T>>, ConfigError> {
    sources.iter().map(|s| Rule::new(s, extract)).collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first matching element that has any.
pub fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|text| !text.is_empty())
}

/// Trimmed text of every matching element, skipping empty ones.
pub fn paragraphs(document: &Html, selector: &Selector) -> Option<Vec<String>> {
    let found: Vec<String> = document
        .select(selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect();
    (!found.is_empty()).then_some(found)
}

/// Source of the first matching element that has one.
pub fn first_image_src(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).find_map(|el| {
        let attrs = el.value();
        attrs
            .attr("src")
            .or_else(|| attrs.attr("data-src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(str::to_string)
    })
}

/// Rule-driven extractor for article pages.
#[derive(Debug)]
pub struct FieldExtractor {
    title: Vec<Rule<String>>,
    body: Vec<Rule<Vec<String>>>,
    date: Vec<Rule<String>>,
    image: Vec<Rule<String>>,
    boilerplate: Vec<String>,
    image_reject: Regex,
}

impl FieldExtractor {
    /// Compile the configured selector lists.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] for an unparseable selector or reject pattern.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let selectors = &settings.selectors;
        let image_reject = Regex::new(&settings.image_reject_pattern).map_err(|source| {
            ConfigError::InvalidPattern {
                pattern: settings.image_reject_pattern.clone(),
                source,
            }
        })?;
        Ok(FieldExtractor {
            title: build_rules(&selectors.title, first_text)?,
            body: build_rules(&selectors.body, paragraphs)?,
            date: build_rules(&selectors.date, first_text)?,
            image: build_rules(&selectors.image, first_image_src)?,
            boilerplate: settings.boilerplate_markers.clone(),
            image_reject,
        })
    }

    /// Extract every field the rules can find. Never fails.
    pub fn extract(&self, document: &Html, page_url: &Url) -> PartialRecord {
        let title = first_match(&self.title, document).map(|(rule, v)| {
            debug!(rule, "Title matched");
            v
        });
        let paragraphs = first_match(&self.body, document)
            .map(|(rule, v)| {
                debug!(rule, count = v.len(), "Body matched");
                v
            })
            .unwrap_or_default();
        let raw_date = first_match(&self.date, document).map(|(_, v)| v);
        let image_url = first_match(&self.image, document)
            .and_then(|(_, src)| self.qualify_image(&src, page_url));

        PartialRecord {
            title,
            paragraphs,
            raw_date,
            image_url,
        }
    }

    /// Parse `html` and extract from it.
    pub fn extract_html(&self, html: &str, page_url: &Url) -> PartialRecord {
        let document = Html::parse_document(html);
        self.extract(&document, page_url)
    }

    /// Decide whether the extracted fields describe a real article.
    ///
    /// # Errors
    ///
    /// No title, no body, or a body containing a boilerplate marker.
    pub fn check(&self, partial: &PartialRecord) -> Result<(), ExtractError> {
        if partial.title.is_none() {
            return Err(ExtractError::MissingTitle);
        }
        let content = partial.content().ok_or(ExtractError::MissingBody)?;
        if let Some(marker) = self.boilerplate_marker(&content) {
            return Err(ExtractError::Boilerplate(marker.to_string()));
        }
        Ok(())
    }

    fn boilerplate_marker(&self, content: &str) -> Option<&str> {
        self.boilerplate
            .iter()
            .map(String::as_str)
            .find(|marker| !marker.is_empty() && content.contains(marker))
    }

    /// Resolve the first image candidate, or drop it if disqualified.
    fn qualify_image(&self, src: &str, page_url: &Url) -> Option<String> {
        let resolved = page_url.join(src).ok()?;
        if !matches!(resolved.scheme(), "http" | "https") {
            debug!(%src, "Image source is not http(s); no image");
            return None;
        }
        if self.image_reject.is_match(resolved.as_str()) {
            debug!(%src, "First image is disqualified; no image");
            return None;
        }
        Some(resolved.to_string())
    }
}
