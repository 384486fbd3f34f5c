//! Relevance filtering.
//!
//! A record is kept only if, in this order:
//! 1. every required field is present,
//! 2. its create date is exactly the target date,
//! 3. its title+body contains no block-list term,
//! 4. its title+body contains at least one keyword.
//!
//! All matching is case-insensitive substring matching. The block list wins
//! over keywords.

use chrono::{Datelike, NaiveDate};
use std::fmt;

use crate::dates;
use crate::error::ValidationError;
use crate::models::ArticleRecord;

/// Why a record was not kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Invalid(ValidationError),
    UndatedRecord(String),
    WrongDate { found: NaiveDate, target: NaiveDate },
    Blocked(String),
    NoKeyword,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Invalid(e) => write!(f, "{e}"),
            Rejection::UndatedRecord(raw) => write!(f, "create time {raw:?} is not a date"),
            Rejection::WrongDate { found, target } => {
                write!(f, "published {found}, target is {target}")
            }
            Rejection::Blocked(term) => write!(f, "contains blocked term {term:?}"),
            Rejection::NoKeyword => write!(f, "contains no keyword"),
        }
    }
}

/// Keyword and block-list matcher.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    keywords: Vec<String>,
    block_list: Vec<String>,
}

fn fold_all(terms: &[String]) -> Vec<String> {
    terms
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

impl RelevanceFilter {
    pub fn new(keywords: &[String], block_list: &[String]) -> Self {
        RelevanceFilter {
            keywords: fold_all(keywords),
            block_list: fold_all(block_list),
        }
    }

    /// First keyword contained in `text`, if any.
    pub fn matching_keyword(&self, text: &str) -> Option<&str> {
        let folded = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| folded.contains(k.as_str()))
            .map(String::as_str)
    }

    /// First block-list term contained in `text`, if any.
    pub fn blocked_term(&self, text: &str) -> Option<&str> {
        let folded = text.to_lowercase();
        self.block_list
            .iter()
            .find(|t| folded.contains(t.as_str()))
            .map(String::as_str)
    }

    /// Run every check, short-circuiting on the first failure.
    ///
    /// `Ok(())` means the record is relevant; the error names the first
    /// check that failed.
    pub fn check(&self, record: &ArticleRecord, target: NaiveDate) -> Result<(), Rejection> {
        record.validate().map_err(Rejection::Invalid)?;

        let found = dates::normalize(&record.create_time, target.year())
            .map_err(|_| Rejection::UndatedRecord(record.create_time.clone()))?;
        if found != target {
            return Err(Rejection::WrongDate { found, target });
        }

        let text = record.combined_text();
        if let Some(term) = self.blocked_term(&text) {
            return Err(Rejection::Blocked(term.to_string()));
        }
        if self.matching_keyword(&text).is_none() {
            return Err(Rejection::NoKeyword);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn filter() -> RelevanceFilter {
        RelevanceFilter::new(
            &["OpenAI".to_string(), "人工智能".to_string()],
            &["招聘".to_string(), "ROG9".to_string()],
        )
    }

    fn record(title: &str, body: &str, day: NaiveDate) -> ArticleRecord {
        ArticleRecord::new(
            "https://tech.sina.com.cn/a.shtml",
            title.to_string(),
            format!("<p>{body}</p>"),
            body.to_string(),
            day,
            None,
        )
    }

    #[test]
    fn test_accepts_keyword_on_target_date() {
        let day = date(2024, 11, 14);
        let r = record("openai 发布新模型", "正文", day);
        assert_eq!(filter().check(&r, day), Ok(()));
        assert!(filter().check(&r, day).is_ok());
    }

    #[test]
    fn test_keyword_in_body_counts() {
        let day = date(2024, 11, 14);
        let r = record("新品发布", "关于人工智能的报道", day);
        assert!(filter().check(&r, day).is_ok());
    }

    #[test]
    fn test_block_list_wins_over_keyword() {
        let day = date(2024, 11, 14);
        let r = record("OpenAI 招聘工程师", "正文", day);
        assert_eq!(
            filter().check(&r, day),
            Err(Rejection::Blocked("招聘".to_string()))
        );
        let r = record("OpenAI", "rog9 评测", day);
        assert!(!filter().check(&r, day).is_ok());
    }

    #[test]
    fn test_date_must_match_exactly() {
        let r = record("OpenAI", "正文", date(2024, 11, 13));
        assert_eq!(
            filter().check(&r, date(2024, 11, 14)),
            Err(Rejection::WrongDate {
                found: date(2024, 11, 13),
                target: date(2024, 11, 14)
            })
        );
    }

    #[test]
    fn test_no_keyword_is_rejected() {
        let day = date(2024, 11, 14);
        let r = record("手机评测", "正文", day);
        assert_eq!(filter().check(&r, day), Err(Rejection::NoKeyword));
    }

    #[test]
    fn test_invalid_record_is_rejected_first() {
        let day = date(2024, 11, 14);
        let mut r = record("OpenAI", "正文", day);
        r.title.clear();
        assert_eq!(
            filter().check(&r, day),
            Err(Rejection::Invalid(ValidationError("title")))
        );
    }

    #[test]
    fn test_garbage_create_time_returns_false() {
        let day = date(2024, 11, 14);
        let mut r = record("OpenAI", "正文", day);
        r.create_time = "not a date".into();
        assert!(matches!(filter().check(&r, day), Err(Rejection::UndatedRecord(_))));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let f = RelevanceFilter::new(&["ChatGPT".to_string()], &["Tail".to_string()]);
        assert_eq!(f.matching_keyword("新版CHATGPT上线"), Some("chatgpt"));
        assert_eq!(f.blocked_term("TAIL lights"), Some("tail"));
        assert_eq!(f.matching_keyword("nothing here"), None);
    }

    #[test]
    fn test_blank_terms_are_ignored() {
        let f = RelevanceFilter::new(&["  ".to_string()], &["".to_string()]);
        assert_eq!(f.matching_keyword("anything"), None);
        assert_eq!(f.blocked_term("anything"), None);
    }
}
