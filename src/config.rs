//! Run configuration.
//!
//! Settings are read from an optional YAML file. Every key is optional and
//! falls back to the built-in defaults below, which describe the Sina Tech
//! site and the AI topic keyword set.
//!
//! ```yaml
//! keywords: [AI, OpenAI, 大模型]
//! block_list: [招聘]
//! page_cap: 10
//! http:
//!   request_interval_ms: 2000
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::error::ConfigError;

/// Top-level settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Case-insensitive substrings; a record must contain one.
    pub keywords: Vec<String>,
    /// Case-insensitive substrings; a record containing any is rejected.
    pub block_list: Vec<String>,
    /// Body signatures that mark a page as legal/notice filler.
    pub boilerplate_markers: Vec<String>,
    pub selectors: SelectorConfig,
    /// Image sources matching this are never used as a lead image.
    pub image_reject_pattern: String,
    /// Absolute links must match this to be treated as articles.
    pub article_url_pattern: String,
    pub sources: Vec<SourceConfig>,
    /// Maximum pages walked on a rolling index.
    pub page_cap: usize,
    /// Characters kept in a record's brief.
    pub brief_chars: usize,
    pub http: HttpConfig,
}

/// Ordered CSS selector lists, most precise first.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub title: Vec<String>,
    pub body: Vec<String>,
    pub date: Vec<String>,
    pub image: Vec<String>,
}

/// How a listing source is paged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A single page; never advanced.
    FrontPage,
    /// Paged through a `{page}` placeholder in the URL.
    RollingIndex,
}

/// How a listing page is turned into anchors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingFormat {
    /// HTML anchors matched by `link_selectors`.
    #[default]
    Html,
    /// Sina roll-feed JSON (`result.data[].{title,url}`).
    RollFeed,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub format: ListingFormat,
    pub url: String,
    #[serde(default)]
    pub link_selectors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Total attempts per request, including the first.
    pub max_attempts: usize,
    pub backoff_base_ms: u64,
    /// Minimum gap between the starts of consecutive requests.
    pub request_interval_ms: u64,
    pub max_redirects: usize,
    pub user_agent: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            keywords: strings(&[
                "AI", "人工智能", "机器学习", "深度学习", "马斯克", "OpenAI", "ChatGPT", "GPT",
                "大语言模型", "LLM", "豆包", "kimi",
            ]),
            block_list: strings(&["惠普Z8", "air", "Tail", "ROG9", "浪潮NF5280M7"]),
            boilerplate_markers: strings(&[
                "<p>产品答疑|网站律师|SINA English</p>",
                "<p>Copyright © 1996-",
                "<p>All Rights Reserved 新浪公司 版权所有</p>",
            ]),
            selectors: SelectorConfig::default(),
            image_reject_pattern:
                r"(?i)(\.gif($|\?)|icon|qrcode|qr_code|erweima|pixel|spacer|1x1)".to_string(),
            article_url_pattern: r"^https?://[^/]*sina\.com\.cn/.*\.s?html$".to_string(),
            sources: vec![
                SourceConfig {
                    name: "sina-tech-front".to_string(),
                    kind: SourceKind::FrontPage,
                    format: ListingFormat::Html,
                    url: "https://tech.sina.com.cn/".to_string(),
                    link_selectors: strings(&[
                        ".tech-news a",
                        ".feed-card-item h2 a",
                        ".news-list a",
                        ".main-list a",
                        "article a",
                        ".seo_data_list a",
                    ]),
                },
                SourceConfig {
                    name: "sina-tech-roll".to_string(),
                    kind: SourceKind::RollingIndex,
                    format: ListingFormat::RollFeed,
                    url: "https://feed.mix.sina.com.cn/api/roll/get?pageid=372&lid=2431&num=50&page={page}"
                        .to_string(),
                    link_selectors: Vec::new(),
                },
            ],
            page_cap: 20,
            brief_chars: 100,
            http: HttpConfig::default(),
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        SelectorConfig {
            title: strings(&[
                "h1.main-title",
                r#"h1[class*="article-title"]"#,
                r#"h1[class*="main_title"]"#,
                "div.article-header h1",
            ]),
            body: strings(&[
                "div.article p",
                r#"div[id="article"] p"#,
                r#"div[class*="article-content"] p"#,
            ]),
            date: strings(&[
                "span.date",
                "div.date-source span.date",
                r#"div[class*="article-info"] span.date"#,
                r#"div[class*="article-info"] span[class*="time"]"#,
            ]),
            image: strings(&[
                "div.img_wrapper img",
                r#"div[class*="article-content"] img"#,
                "div.article img",
            ]),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout_secs: 10,
            max_attempts: 3,
            backoff_base_ms: 1000,
            request_interval_ms: 1000,
            max_redirects: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or the defaults when no path is given.
    ///
    /// # Errors
    ///
    /// A named file that cannot be read or parsed is a [`ConfigError`].
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Settings, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using built-in defaults");
            return Ok(Settings::default());
        };
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: PathBuf::from(path),
            source,
        })?;
        let settings = Settings::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from(path),
            source,
        })?;
        info!(
            keywords = settings.keywords.len(),
            block_list = settings.block_list.len(),
            sources = settings.sources.len(),
            "Loaded configuration"
        );
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Settings, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(text)
    }
}
