//! Crawl orchestration.
//!
//! One run walks every configured listing source, turns keyword-matching
//! links into articles, and collects the ones that pass the relevance filter.
//! The walk is an explicit state machine:
//!
//! ```text
//!             ┌──────────────────────────────────────────────┐
//!             v                                              │
//! DiscoveringLinks ──links──> Extracting ──record──> Filtering
//!       │    ^                    │  ^                   │
//!  none │    │ next page/source   │  └───────────────────┘
//!  /err v    │                    │ no links left
//!       AdvancingPage <───────────┘
//!             │ no sources left
//!             v
//!            Done
//! ```
//!
//! Fetches happen one at a time. A failed listing page ends paging for its
//! source; a failed article is skipped. Neither ends the run.

use chrono::NaiveDate;
use itertools::Itertools;
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::Settings;
use crate::dates;
use crate::error::{ArticleError, ConfigError, ExtractError, ListingError};
use crate::extract::FieldExtractor;
use crate::fetch::Fetch;
use crate::filter::RelevanceFilter;
use crate::models::{ArticleRecord, brief_from_paragraphs};
use crate::scrapers::{Anchor, ListingSource};
use crate::utils::truncate_for_log;

/// Orchestrator states.
#[derive(Debug)]
enum CrawlState {
    DiscoveringLinks {
        source: usize,
        page: usize,
    },
    Extracting {
        source: usize,
        page: usize,
        links: VecDeque<Anchor>,
    },
    Filtering {
        source: usize,
        page: usize,
        links: VecDeque<Anchor>,
        record: ArticleRecord,
    },
    AdvancingPage {
        source: usize,
        page: usize,
        had_candidates: bool,
    },
    Done,
}

/// Counters for one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages: usize,
    pub failed_pages: usize,
    pub candidates: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed_articles: usize,
}

/// Result of a run: the accepted batch, ready to be merged.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub records: Vec<ArticleRecord>,
    pub stats: CrawlStats,
}

/// State owned by a single run.
struct RunContext {
    target_date: NaiveDate,
    processing_year: i32,
    seen: HashSet<String>,
    report: CrawlReport,
}

impl RunContext {
    fn mark_seen(&mut self, url: &str) {
        self.seen.insert(url.to_string());
    }

    fn accept(&mut self, record: ArticleRecord) {
        self.report.stats.accepted += 1;
        self.report.records.push(record);
    }
}

/// Walks listing sources and builds a batch of relevant articles.
#[derive(Debug)]
pub struct Crawler<F> {
    fetcher: F,
    extractor: FieldExtractor,
    filter: RelevanceFilter,
    sources: Vec<ListingSource>,
    article_pattern: Regex,
    page_cap: usize,
    brief_chars: usize,
}

impl<F: Fetch> Crawler<F> {
    /// Compile everything a run needs from `settings`.
    ///
    /// # Errors
    ///
    /// Any invalid selector, pattern or source definition.
    pub fn new(fetcher: F, settings: &Settings) -> Result<Self, ConfigError> {
        let article_pattern =
            Regex::new(&settings.article_url_pattern).map_err(|source| ConfigError::InvalidPattern {
                pattern: settings.article_url_pattern.clone(),
                source,
            })?;
        let sources = settings
            .sources
            .iter()
            .map(ListingSource::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Crawler {
            fetcher,
            extractor: FieldExtractor::from_settings(settings)?,
            filter: RelevanceFilter::new(&settings.keywords, &settings.block_list),
            sources,
            article_pattern,
            page_cap: settings.page_cap.max(1),
            brief_chars: settings.brief_chars,
        })
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Run one crawl for `target_date`.
    ///
    /// Links already present in `corpus` are never fetched. `processing_year`
    /// is stamped onto publish dates that carry no year.
    #[instrument(level = "info", skip_all, fields(%target_date))]
    pub async fn run(
        &self,
        corpus: &[ArticleRecord],
        target_date: NaiveDate,
        processing_year: i32,
    ) -> CrawlReport {
        let mut run = RunContext {
            target_date,
            processing_year,
            seen: corpus.iter().map(|r| r.url.clone()).collect(),
            report: CrawlReport::default(),
        };

        let mut state = CrawlState::DiscoveringLinks { source: 0, page: 1 };
        loop {
            state = match state {
                CrawlState::DiscoveringLinks { source, .. } if source >= self.sources.len() => {
                    debug!("All sources exhausted");
                    CrawlState::Done
                }

                CrawlState::DiscoveringLinks { source, page } => {
                    let listing = &self.sources[source];
                    run.report.stats.pages += 1;
                    match self.discover(listing, page, &run.seen).await {
                        Ok(links) if links.is_empty() => {
                            info!(source = %listing.name, page, "No candidate links on page");
                            CrawlState::AdvancingPage {
                                source,
                                page,
                                had_candidates: false,
                            }
                        }
                        Ok(links) => {
                            info!(
                                source = %listing.name,
                                page,
                                count = links.len(),
                                "Found candidate links"
                            );
                            run.report.stats.candidates += links.len();
                            CrawlState::Extracting {
                                source,
                                page,
                                links: links.into(),
                            }
                        }
                        Err(e) => {
                            warn!(
                                source = %listing.name,
                                page,
                                error = %e,
                                "Listing page failed; leaving source"
                            );
                            run.report.stats.failed_pages += 1;
                            CrawlState::AdvancingPage {
                                source,
                                page,
                                had_candidates: false,
                            }
                        }
                    }
                }

                CrawlState::Extracting {
                    source,
                    page,
                    mut links,
                } => match links.pop_front() {
                    None => CrawlState::AdvancingPage {
                        source,
                        page,
                        had_candidates: true,
                    },
                    Some(link) => match self.next_record(&link, &mut run).await {
                        Some(record) => CrawlState::Filtering {
                            source,
                            page,
                            links,
                            record,
                        },
                        None => CrawlState::Extracting {
                            source,
                            page,
                            links,
                        },
                    },
                },

                CrawlState::Filtering {
                    source,
                    page,
                    links,
                    record,
                } => {
                    match self.filter.check(&record, run.target_date) {
                        Ok(()) => {
                            info!(
                                url = %record.url,
                                title = %truncate_for_log(&record.title, 80),
                                "Accepted article"
                            );
                            run.accept(record);
                        }
                        Err(rejection) => {
                            info!(url = %record.url, reason = %rejection, "Article not relevant");
                            run.report.stats.rejected += 1;
                        }
                    }
                    CrawlState::Extracting {
                        source,
                        page,
                        links,
                    }
                }

                CrawlState::AdvancingPage {
                    source,
                    page,
                    had_candidates,
                } => {
                    let listing = &self.sources[source];
                    if listing.pages_forward() && had_candidates && page < self.page_cap {
                        CrawlState::DiscoveringLinks {
                            source,
                            page: page + 1,
                        }
                    } else {
                        if listing.pages_forward() && page >= self.page_cap {
                            info!(source = %listing.name, page, "Reached page cap");
                        }
                        CrawlState::DiscoveringLinks {
                            source: source + 1,
                            page: 1,
                        }
                    }
                }

                CrawlState::Done => break,
            };
        }

        info!(stats = ?run.report.stats, "Crawl finished");
        run.report
    }

    /// Turn one candidate link into a record, or log why it could not be.
    ///
    /// Once the article page has been fetched the link counts as seen, so a
    /// link listed again later in the run is not fetched twice. A failed
    /// fetch leaves it eligible.
    async fn next_record(&self, link: &Anchor, run: &mut RunContext) -> Option<ArticleRecord> {
        match self.process_article(link, run.processing_year).await {
            Ok(record) => {
                run.mark_seen(&link.url);
                Some(record)
            }
            Err(ArticleError::Fetch(e)) => {
                warn!(url = %link.url, error = %e, "Article fetch failed");
                run.report.stats.failed_articles += 1;
                None
            }
            Err(e) => {
                info!(url = %link.url, reason = %e, "Discarded article");
                run.mark_seen(&link.url);
                run.report.stats.failed_articles += 1;
                None
            }
        }
    }

    /// Fetch a listing page and keep the candidate links on it.
    ///
    /// A candidate's text contains a keyword, its URL looks like an article,
    /// and it has not been seen in the corpus or earlier in this run.
    async fn discover(
        &self,
        listing: &ListingSource,
        page: usize,
        seen: &HashSet<String>,
    ) -> Result<Vec<Anchor>, ListingError> {
        let page_url = listing.page_url(page);
        let base = Url::parse(&page_url)?;
        let response = self.fetcher.fetch(&page_url).await?;
        let anchors = listing.anchors(&response.text(), &base)?;

        Ok(anchors
            .into_iter()
            .filter(|a| self.article_pattern.is_match(&a.url))
            .filter(|a| !seen.contains(&a.url))
            .filter(|a| match self.filter.matching_keyword(&a.text) {
                Some(keyword) => {
                    debug!(text = %a.text, keyword, "Keyword in link text");
                    true
                }
                None => false,
            })
            .unique_by(|a| a.url.clone())
            .collect())
    }

    /// Fetch one article and turn it into a complete record.
    async fn process_article(
        &self,
        link: &Anchor,
        processing_year: i32,
    ) -> Result<ArticleRecord, ArticleError> {
        let page_url = Url::parse(&link.url)?;
        let response = self.fetcher.fetch(&link.url).await?;
        let partial = self.extractor.extract_html(&response.text(), &page_url);
        self.extractor.check(&partial)?;

        let content = partial.content().ok_or(ExtractError::MissingBody)?;
        let brief = brief_from_paragraphs(&partial.paragraphs, self.brief_chars);
        let raw_date = partial.raw_date.as_deref().ok_or(ExtractError::MissingDate)?;
        let create_time = dates::normalize(raw_date, processing_year)?;
        let title = partial.title.ok_or(ExtractError::MissingTitle)?;

        let record = ArticleRecord::new(
            &link.url,
            title,
            content,
            brief,
            create_time,
            partial.image_url,
        );
        record.validate()?;
        Ok(record)
    }
}
