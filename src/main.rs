//! # AI News Crawler
//!
//! Collects artificial-intelligence news from the Sina Tech portal into a
//! per-date JSON corpus.
//!
//! ## Features
//!
//! - Discovers article links from the front page and the paged roll feed
//! - Extracts title, body, publish date and lead image with ranked CSS rules
//! - Keeps only articles published on the target date that mention a keyword
//!   and no block-listed term
//! - Merges the batch into the existing corpus, newest write wins per URL
//! - Optionally exports JSON lines and downloads lead images
//!
//! ## Usage
//!
//! ```sh
//! ai_news_crawler --date 2024-11-14 -o ./data
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Loading**: Read settings and the existing corpus for the target date
//! 2. **Crawling**: Walk listing sources, fetch and extract candidate articles
//! 3. **Filtering**: Date, block-list and keyword checks per record
//! 4. **Output**: Merge and rewrite the corpus, then the optional extras

use chrono::{Datelike, Local};
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod crawl;
mod dates;
mod error;
mod extract;
mod fetch;
mod filter;
mod images;
mod merge;
mod models;
mod outputs;
mod scrapers;
mod utils;

use cli::{Cli, parse_target_date};
use config::Settings;
use crawl::Crawler;
use fetch::build_fetcher;
use merge::merge;
use outputs::{json, lines};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("ai_news_crawler starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.date, ?args.config, %args.output_dir, "Parsed CLI arguments");

    // ---- Settings & target date ----
    let settings = Settings::load(args.config.as_deref().map(Path::new)).inspect_err(|e| {
        error!(error = %e, "Failed to load configuration");
    })?;

    let today = Local::now().date_naive();
    let target_date = parse_target_date(args.date.as_deref(), today).inspect_err(|e| {
        error!(error = %e, "Invalid target date");
    })?;
    let processing_year = today.year();
    info!(%target_date, processing_year, "Target date resolved");

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Existing corpus ----
    let corpus_path = json::corpus_path(&args.output_dir, target_date);
    let existing = json::load_corpus(&corpus_path).await;
    info!(path = %corpus_path.display(), count = existing.len(), "Loaded existing corpus");

    // ---- Crawl ----
    let fetcher = build_fetcher(&settings.http)?;
    let crawler = Crawler::new(fetcher, &settings).inspect_err(|e| {
        error!(error = %e, "Invalid crawler configuration");
    })?;
    let report = crawler.run(&existing, target_date, processing_year).await;
    info!(
        accepted = report.stats.accepted,
        rejected = report.stats.rejected,
        failed_articles = report.stats.failed_articles,
        failed_pages = report.stats.failed_pages,
        "Crawl complete"
    );

    // ---- Merge & persist ----
    let batch = report.records;
    let merged = merge(existing, batch.clone());
    if let Err(e) = json::write_corpus(&corpus_path, &merged).await {
        error!(path = %corpus_path.display(), error = %e, "Failed to write corpus");
        return Err(e.into());
    }
    info!(
        path = %corpus_path.display(),
        batch = batch.len(),
        total = merged.len(),
        "Wrote corpus"
    );

    // ---- Optional extras ----
    if args.export_lines {
        let export_path = lines::export_path(&args.output_dir, target_date);
        if let Err(e) = lines::write_lines(&export_path, &merged).await {
            warn!(path = %export_path.display(), error = %e, "Failed to write JSON-lines export");
        }
    }

    if args.download_images {
        let image_dir = Path::new(&args.image_dir);
        let saved = images::download_all(crawler.fetcher(), &batch, target_date, image_dir).await;
        info!(saved, dir = %args.image_dir, "Image download complete");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
