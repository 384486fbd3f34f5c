//! Command-line interface definitions for the AI news crawler.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! The output directory can also be provided via an environment variable.

use chrono::NaiveDate;
use clap::Parser;

use crate::dates;
use crate::error::ConfigError;

/// Command-line arguments for the AI news crawler.
///
/// # Examples
///
/// ```sh
/// # Crawl today's articles into ./data/<today>.json
/// ai_news_crawler
///
/// # A specific day, with a JSON-lines export and lead images
/// ai_news_crawler --date 2024-11-14 --export-lines --download-images
///
/// # Custom keyword list and selectors
/// ai_news_crawler -c ./config.yaml -o /srv/news
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Target publish date (YYYY-MM-DD); defaults to today
    #[arg(short, long)]
    pub date: Option<String>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory holding the per-date corpus files
    #[arg(short, long, env = "AI_NEWS_OUTPUT_DIR", default_value = "data")]
    pub output_dir: String,

    /// Also write <output-dir>/res/<date>.jsonl after the corpus
    #[arg(long)]
    pub export_lines: bool,

    /// Download each accepted article's lead image
    #[arg(long)]
    pub download_images: bool,

    /// Directory for downloaded images
    #[arg(long, default_value = "images")]
    pub image_dir: String,
}

/// Resolve the `--date` argument, falling back to `today`.
///
/// # Errors
///
/// [`ConfigError::InvalidTargetDate`] when the value is not `YYYY-MM-DD`.
pub fn parse_target_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, ConfigError> {
    match raw {
        None => Ok(today),
        Some(s) => dates::parse_canonical(s.trim())
            .ok_or_else(|| ConfigError::InvalidTargetDate(s.to_string())),
    }
}
