//! Data models for collected articles.
//!
//! This module defines the two shapes an article takes on its way through the
//! pipeline:
//! - [`PartialRecord`]: whatever the field extractor could pull out of a page,
//!   every field possibly absent
//! - [`ArticleRecord`]: a complete, normalized record as persisted in the corpus
//!
//! The on-disk field names (`_id`, `createTime`, `imageUrl`, ...) are kept in
//! camelCase so existing corpus files and downstream consumers keep working.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

/// Fields pulled out of a single article page.
///
/// Nothing here is validated yet; the extractor leaves a field as `None` (or
/// `paragraphs` empty) when none of its rules matched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    /// First non-empty title match.
    pub title: Option<String>,
    /// Body paragraph texts, in document order, already trimmed.
    pub paragraphs: Vec<String>,
    /// Publish date exactly as it appears on the page.
    pub raw_date: Option<String>,
    /// Absolute URL of the lead image, if the first candidate qualified.
    pub image_url: Option<String>,
}

impl PartialRecord {
    /// Paragraph-wrapped body, or `None` when no paragraphs were found.
    pub fn content(&self) -> Option<String> {
        if self.paragraphs.is_empty() {
            return None;
        }
        Some(
            self.paragraphs
                .iter()
                .map(|p| format!("<p>{p}</p>"))
                .collect::<String>(),
        )
    }
}

/// A collected article as stored in the corpus.
///
/// `has_image` is derived and is recomputed by [`ArticleRecord::normalized`];
/// `is_recommend` is an editorial flag the crawler never sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    /// Stable hash of `url`.
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    /// Plain-text excerpt of the body.
    #[serde(default)]
    pub brief: String,
    /// Paragraph-wrapped body (`<p>..</p><p>..</p>`).
    pub content: String,
    /// Publish date in `YYYY-MM-DD` form.
    pub create_time: String,
    pub url: String,
    /// Stored as `""` when absent.
    #[serde(
        default,
        serialize_with = "serialize_optional_url",
        deserialize_with = "deserialize_optional_url"
    )]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_loose_flag")]
    pub is_recommend: bool,
    #[serde(default, deserialize_with = "deserialize_loose_flag")]
    pub has_image: bool,
}

impl ArticleRecord {
    /// Build a record for `url`, deriving `id` and `has_image`.
    pub fn new(
        url: &str,
        title: String,
        content: String,
        brief: String,
        create_time: NaiveDate,
        image_url: Option<String>,
    ) -> Self {
        ArticleRecord {
            id: record_id(url),
            title,
            brief,
            content,
            create_time: create_time.format("%Y-%m-%d").to_string(),
            url: url.to_string(),
            image_url,
            is_recommend: false,
            has_image: false,
        }
        .normalized()
    }

    /// Check that every field required for persistence is non-empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("title", &self.title),
            ("content", &self.content),
            ("createTime", &self.create_time),
            ("url", &self.url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError(name));
            }
        }
        Ok(())
    }

    /// Re-derive the fields that must agree with each other.
    ///
    /// A blank image URL collapses to `None` and `has_image` is recomputed from
    /// it, so `has_image == image_url.is_some()` always holds afterwards.
    pub fn normalized(mut self) -> Self {
        self.image_url = self
            .image_url
            .take()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        self.has_image = self.image_url.is_some();
        if self.id.is_empty() && !self.url.is_empty() {
            self.id = record_id(&self.url);
        }
        self
    }

    /// Title and body joined, as searched by the relevance filter.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// Deterministic record id: the first 16 bytes of SHA-256(url), hex encoded.
pub fn record_id(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Plain-text excerpt of at most `max_chars` characters.
///
/// `...` is appended only when the text was actually cut.
pub fn brief_from_paragraphs(paragraphs: &[String], max_chars: usize) -> String {
    let text = paragraphs.concat();
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut brief: String = text.chars().take(max_chars).collect();
    brief.push_str("...");
    brief
}

fn serialize_optional_url<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.as_deref().unwrap_or(""))
}

fn deserialize_optional_url<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|u| !u.trim().is_empty()))
}

/// Boolean as it may appear in files written by other tools.
#[derive(Deserialize)]
#[serde(untagged)]
enum LooseFlag {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Accept `true`, `1`, `"true"`, `"1"`, `"yes"` (and `null` as false).
fn deserialize_loose_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let flag = match Option::<LooseFlag>::deserialize(deserializer)? {
        None => false,
        Some(LooseFlag::Bool(b)) => b,
        Some(LooseFlag::Int(i)) => i != 0,
        Some(LooseFlag::Float(f)) => f != 0.0,
        Some(LooseFlag::Text(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "y" | "t"
        ),
    };
    Ok(flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArticleRecord {
        ArticleRecord::new(
            "https://tech.sina.com.cn/i/2024-03-05/doc-1.shtml",
            "OpenAI 发布新模型".to_string(),
            "<p>第一段</p>".to_string(),
            "第一段".to_string(),
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            Some("https://n.sinaimg.cn/a.jpg".to_string()),
        )
    }

    #[test]
    fn test_record_id_is_stable() {
        let a = record_id("https://example.com/a");
        assert_eq!(a, record_id("https://example.com/a"));
        assert_ne!(a, record_id("https://example.com/b"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_new_record_derives_fields() {
        let r = sample();
        assert_eq!(r.create_time, "2024-03-05");
        assert_eq!(r.id, record_id(&r.url));
        assert!(r.has_image);
        assert!(!r.is_recommend);
        assert!(r.validate().is_ok());
    }

    #[test]
    fn test_blank_image_means_no_image() {
        let mut r = sample();
        r.image_url = Some("   ".into());
        r.has_image = true;
        let r = r.normalized();
        assert_eq!(r.image_url, None);
        assert!(!r.has_image);
    }

    #[test]
    fn test_validate_reports_first_missing_field() {
        let mut r = sample();
        r.content = String::new();
        assert_eq!(r.validate(), Err(ValidationError("content")));
        r.title = "  ".into();
        assert_eq!(r.validate(), Err(ValidationError("title")));
    }

    #[test]
    fn test_serialization_uses_corpus_field_names() {
        let mut r = sample();
        r.image_url = None;
        let r = r.normalized();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["_id"], r.id.as_str());
        assert_eq!(json["createTime"], "2024-03-05");
        assert_eq!(json["imageUrl"], "");
        assert_eq!(json["hasImage"], false);
        assert_eq!(json["isRecommend"], false);
    }

    #[test]
    fn test_deserialize_coerces_loose_flags() {
        let json = r#"{
            "_id": "x",
            "title": "t",
            "brief": "b",
            "content": "<p>c</p>",
            "createTime": "2024-03-05",
            "url": "https://example.com/a.shtml",
            "imageUrl": "",
            "isRecommend": "True",
            "hasImage": 1
        }"#;
        let r: ArticleRecord = serde_json::from_str(json).unwrap();
        assert!(r.is_recommend);
        assert!(r.has_image);
        assert_eq!(r.image_url, None);

        let r = r.normalized();
        assert!(!r.has_image);
    }

    #[test]
    fn test_deserialize_tolerates_missing_flags() {
        let json = r#"{
            "_id": "x",
            "title": "t",
            "content": "<p>c</p>",
            "createTime": "2024-03-05",
            "url": "https://example.com/a.shtml",
            "isRecommend": null
        }"#;
        let r: ArticleRecord = serde_json::from_str(json).unwrap();
        assert!(!r.is_recommend);
        assert!(!r.has_image);
        assert_eq!(r.brief, "");
    }

    #[test]
    fn test_brief_truncates_on_char_boundary() {
        let paragraphs = vec!["人工智能".repeat(30)];
        let brief = brief_from_paragraphs(&paragraphs, 100);
        assert_eq!(brief.chars().count(), 103);
        assert!(brief.ends_with("..."));

        let short = brief_from_paragraphs(&["短文".to_string()], 100);
        assert_eq!(short, "短文");
    }

    #[test]
    fn test_partial_content_wraps_paragraphs() {
        let partial = PartialRecord {
            paragraphs: vec!["a".into(), "b".into()],
            ..Default::default()
        };
        assert_eq!(partial.content().as_deref(), Some("<p>a</p><p>b</p>"));
        assert_eq!(PartialRecord::default().content(), None);
    }
}
