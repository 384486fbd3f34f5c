//! Anchors from an HTML listing page.
//!
//! Selectors are applied in configured order; within one selector, anchors
//! come out in document order. The same link may therefore appear more than
//! once when several selectors overlap.

use scraper::{Html, Selector};
use url::Url;

use super::{Anchor, resolve_link};

pub fn anchors(body: &str, page_url: &Url, selectors: &[Selector]) -> Vec<Anchor> {
    let document = Html::parse_document(body);
    let mut found = Vec::new();
    for selector in selectors {
        for element in document.select(selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let text = element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if text.is_empty() {
                continue;
            }
            if let Some(url) = resolve_link(page_url, href) {
                found.push(Anchor { text, url });
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchors_from_selectors() {
        let body = r#"
            <div class="tech-news">
              <a href="//tech.sina.com.cn/i/1.shtml"> OpenAI 发布新模型 </a>
              <a href="/i/2.shtml"><img src="x.jpg"></a>
              <a>no href</a>
            </div>
            <ul class="news-list"><li><a href="https://tech.sina.com.cn/i/3.shtml">手机 评测</a></li></ul>
        "#;
        let page = Url::parse("https://tech.sina.com.cn/").unwrap();
        let selectors = vec![
            Selector::parse(".tech-news a").unwrap(),
            Selector::parse(".news-list a").unwrap(),
        ];
        let found = anchors(body, &page, &selectors);
        assert_eq!(
            found,
            vec![
                Anchor {
                    text: "OpenAI 发布新模型".into(),
                    url: "https://tech.sina.com.cn/i/1.shtml".into()
                },
                Anchor {
                    text: "手机 评测".into(),
                    url: "https://tech.sina.com.cn/i/3.shtml".into()
                },
            ]
        );
    }

    #[test]
    fn test_no_matches_is_empty() {
        let page = Url::parse("https://tech.sina.com.cn/").unwrap();
        let selectors = vec![Selector::parse(".tech-news a").unwrap()];
        assert!(anchors("<p>nothing</p>", &page, &selectors).is_empty());
    }
}
