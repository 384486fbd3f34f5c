//! Listing sources: where candidate article links come from.
//!
//! Each source is one listing URL plus a paging policy and a page format.
//!
//! | Kind | Paging | Typical format |
//! |------|--------|----------------|
//! | [`SourceKind::FrontPage`] | page 1 only | HTML ([`html`]) |
//! | [`SourceKind::RollingIndex`] | `{page}` = 1, 2, ... up to the page cap | roll-feed JSON ([`roll_feed`]) |
//!
//! Both formats reduce a page to a list of [`Anchor`]s (visible text plus an
//! absolute URL). Keyword pre-filtering and de-duplication happen in the
//! orchestrator, not here.

use scraper::Selector;
use url::Url;

use crate::config::{ListingFormat, SourceConfig, SourceKind};
use crate::error::ConfigError;

pub mod html;
pub mod roll_feed;

const PAGE_PLACEHOLDER: &str = "{page}";

/// A link found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Visible text (or feed title).
    pub text: String,
    /// Absolute URL.
    pub url: String,
}

/// A compiled listing source.
#[derive(Debug)]
pub struct ListingSource {
    pub name: String,
    pub kind: SourceKind,
    format: ListingFormat,
    url: String,
    link_selectors: Vec<Selector>,
}

impl ListingSource {
    /// Compile a configured source.
    ///
    /// # Errors
    ///
    /// Bad selectors, or a rolling index whose URL has no `{page}` slot.
    pub fn from_config(config: &SourceConfig) -> Result<Self, ConfigError> {
        if config.kind == SourceKind::RollingIndex && !config.url.contains(PAGE_PLACEHOLDER) {
            return Err(ConfigError::InvalidSource {
                name: config.name.clone(),
                reason: format!("rolling index URL must contain {PAGE_PLACEHOLDER}"),
            });
        }

        let sources: Vec<&str> = if config.link_selectors.is_empty() {
            vec!["a[href]"]
        } else {
            config.link_selectors.iter().map(String::as_str).collect()
        };
        let link_selectors = sources
            .into_iter()
            .map(|s| Selector::parse(s).map_err(|_| ConfigError::InvalidSelector(s.to_string())))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ListingSource {
            name: config.name.clone(),
            kind: config.kind,
            format: config.format,
            url: config.url.clone(),
            link_selectors,
        })
    }

    /// URL of listing page `page` (1-based).
    pub fn page_url(&self, page: usize) -> String {
        self.url.replace(PAGE_PLACEHOLDER, &page.to_string())
    }

    /// Whether the orchestrator may move on to page `page + 1`.
    pub fn pages_forward(&self) -> bool {
        self.kind == SourceKind::RollingIndex
    }

    /// Reduce a fetched listing page to anchors, in page order.
    ///
    /// # Errors
    ///
    /// A roll-feed page that is not valid JSON.
    pub fn anchors(&self, body: &str, page_url: &Url) -> Result<Vec<Anchor>, serde_json::Error> {
        match self.format {
            ListingFormat::Html => Ok(html::anchors(body, page_url, &self.link_selectors)),
            ListingFormat::RollFeed => roll_feed::anchors(body, page_url),
        }
    }
}

/// Resolve `href` against the page, keeping only http(s) results.
pub(crate) fn resolve_link(page_url: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let mut resolved = page_url.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(kind: SourceKind, url: &str) -> SourceConfig {
        SourceConfig {
            name: "test".into(),
            kind,
            format: ListingFormat::Html,
            url: url.into(),
            link_selectors: vec![],
        }
    }

    #[test]
    fn test_page_url_substitutes_page() {
        let s = ListingSource::from_config(&source(
            SourceKind::RollingIndex,
            "https://feed.example.com/roll?page={page}&num=50",
        ))
        .unwrap();
        assert_eq!(s.page_url(3), "https://feed.example.com/roll?page=3&num=50");
        assert!(s.pages_forward());
    }

    #[test]
    fn test_front_page_does_not_page() {
        let s =
            ListingSource::from_config(&source(SourceKind::FrontPage, "https://tech.sina.com.cn/"))
                .unwrap();
        assert_eq!(s.page_url(1), "https://tech.sina.com.cn/");
        assert!(!s.pages_forward());
    }

    #[test]
    fn test_rolling_index_requires_placeholder() {
        assert!(matches!(
            ListingSource::from_config(&source(SourceKind::RollingIndex, "https://x.com/roll")),
            Err(ConfigError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_resolve_link() {
        let page = Url::parse("https://tech.sina.com.cn/").unwrap();
        assert_eq!(
            resolve_link(&page, "//finance.sina.com.cn/a.shtml").as_deref(),
            Some("https://finance.sina.com.cn/a.shtml")
        );
        assert_eq!(
            resolve_link(&page, "/i/doc.shtml#comments").as_deref(),
            Some("https://tech.sina.com.cn/i/doc.shtml")
        );
        assert_eq!(resolve_link(&page, "javascript:void(0)"), None);
        assert_eq!(resolve_link(&page, "  "), None);
    }
}
