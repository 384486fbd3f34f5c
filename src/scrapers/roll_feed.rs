//! Sina roll-feed listing pages.
//!
//! The roll feed is a paged JSON API behind the site's "rolling news" index:
//!
//! ```text
//! https://feed.mix.sina.com.cn/api/roll/get?pageid=372&lid=2431&num=50&page=1
//! ```
//!
//! Each entry of `result.data` carries a `title` and a `url`; the title plays
//! the role of an anchor's visible text.

use serde::Deserialize;
use url::Url;

use super::{Anchor, resolve_link};

#[derive(Debug, Default, Deserialize)]
struct RollResponse {
    #[serde(default)]
    result: RollResult,
}

#[derive(Debug, Default, Deserialize)]
struct RollResult {
    #[serde(default)]
    data: Vec<RollItem>,
}

#[derive(Debug, Deserialize)]
struct RollItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

/// Anchors from one roll-feed page, in feed order.
///
/// # Errors
///
/// The body is not JSON of the expected shape.
pub fn anchors(body: &str, page_url: &Url) -> Result<Vec<Anchor>, serde_json::Error> {
    let response: RollResponse = serde_json::from_str(body)?;
    Ok(response
        .result
        .data
        .into_iter()
        .filter_map(|item| {
            let text = item.title.trim().to_string();
            if text.is_empty() {
                return None;
            }
            resolve_link(page_url, &item.url).map(|url| Anchor { text, url })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://feed.mix.sina.com.cn/api/roll/get?page=1").unwrap()
    }

    #[test]
    fn test_parses_feed_entries() {
        let body = r#"{"result":{"status":{"code":0},"data":[
            {"title":"ChatGPT 新功能上线","url":"https://tech.sina.com.cn/i/2024-11-14/doc-1.shtml","ctime":"1731550000"},
            {"title":"","url":"https://tech.sina.com.cn/i/2.shtml"},
            {"title":"无链接"}
        ]}}"#;
        let found = anchors(body, &page()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "ChatGPT 新功能上线");
        assert_eq!(found[0].url, "https://tech.sina.com.cn/i/2024-11-14/doc-1.shtml");
    }

    #[test]
    fn test_empty_feed_page() {
        let body = r#"{"result":{"status":{"code":0},"data":[]}}"#;
        assert!(anchors(body, &page()).unwrap().is_empty());
        assert!(anchors("{}", &page()).unwrap().is_empty());
    }

    #[test]
    fn test_non_json_is_error() {
        assert!(anchors("<html>blocked</html>", &page()).is_err());
    }
}
