//! Error taxonomy for the crawl pipeline.
//!
//! Per-article and per-page failures are values, not panics: each pipeline
//! stage returns one of these types and the orchestrator decides whether the
//! failure is fatal. Only [`ConfigError`] and the write side of
//! [`PersistenceError`] ever end a run.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of the outbound fetch capability.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request timed out on every permitted attempt.
    #[error("request to {url} timed out after {attempts} attempt(s)")]
    Timeout { url: String, attempts: usize },

    /// The redirect chain exceeded the configured limit. Never retried.
    #[error("too many redirects for {url}")]
    TooManyRedirects { url: String },

    /// The body is larger than the caller allowed. Never retried.
    #[error("{url} is {size} bytes, over the {limit} byte limit")]
    BodyTooLarge { url: String, size: u64, limit: u64 },

    /// Any other transport or HTTP-status failure.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            FetchError::TooManyRedirects { .. } | FetchError::BodyTooLarge { .. }
        )
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url, .. }
            | FetchError::TooManyRedirects { url }
            | FetchError::BodyTooLarge { url, .. }
            | FetchError::Request { url, .. } => url,
        }
    }
}

/// A document could not be turned into an article.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no title matched any title rule")]
    MissingTitle,

    #[error("no body paragraphs matched any body rule")]
    MissingBody,

    #[error("no publish date matched any date rule")]
    MissingDate,

    #[error("body matches boilerplate marker {0:?}")]
    Boilerplate(String),
}

/// A record is missing a field required for persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("record is missing required field `{0}`")]
pub struct ValidationError(pub &'static str);

/// A raw date string matched none of the known patterns.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognised date format: {0:?}")]
pub struct DateFormatError(pub String);

/// Corpus or export file I/O failure.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode records: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Setup problems that make a run impossible.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid target date {0:?} (expected YYYY-MM-DD)")]
    InvalidTargetDate(String),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid listing source {name:?}: {reason}")]
    InvalidSource { name: String, reason: String },

    #[error("invalid CSS selector {0:?}")]
    InvalidSelector(String),

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A listing page could not be turned into links.
#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid listing URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("listing page is not a valid feed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why a single candidate article did not make it into the batch.
#[derive(Debug, Error)]
pub enum ArticleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("invalid article URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Date(#[from] DateFormatError),
}

/// A lead image could not be stored locally.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image URL {0:?} is not http(s)")]
    UnsupportedUrl(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("{url} is not an image (content-type {content_type:?})")]
    NotAnImage { url: String, content_type: String },

    #[error("{url} is {size} bytes, over the {limit} byte limit")]
    TooLarge { url: String, size: u64, limit: u64 },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
