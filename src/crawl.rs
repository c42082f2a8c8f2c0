//! The pagination loop: walk the archive, read each matching issue, collect sponsors.
//!
//! # Flow
//!
//! ```text
//! listing page ──> matching article cards ──> for each: open, read, extract, return
//!      ^                                                          │
//!      └──────────────── next-page link (if any) <────────────────┘
//! ```
//!
//! # Failure Policy
//!
//! - A failure inside one article (timeout, browser error, missing content)
//!   is logged and counted; the loop moves on to the next article.
//! - Failing to return to the listing after an article is counted too. The
//!   cards and the next-page link were read when the listing first loaded,
//!   so nothing is lost.
//! - A failure loading a listing page stops pagination. Sponsors gathered so
//!   far are kept and the reason is recorded in [`CrawlReport::aborted`].

use crate::api::AskAsync;
use crate::error::Result;
use crate::models::{ArticleRef, CrawlReport};
use crate::scrapers::{ArchiveScraper, PageDriver};
use crate::sponsors::{ExtractionOutcome, SponsorExtractor};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Knobs for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub start_url: String,
    /// Keep only cards whose date contains this text. `None` keeps all.
    pub year_filter: Option<String>,
    /// Stop after this many listing pages.
    pub max_pages: Option<usize>,
    /// Extra pause between articles, for sites that rate limit.
    pub article_delay: Duration,
}

/// Drives an [`ArchiveScraper`] and a [`SponsorExtractor`] over the archive.
pub struct PaginationLoop<D, C> {
    scraper: ArchiveScraper<D>,
    extractor: SponsorExtractor<C>,
    options: CrawlOptions,
}

/// Keep the cards the crawl should visit, in listing order.
pub fn select_articles(articles: Vec<ArticleRef>, year: Option<&str>) -> Vec<ArticleRef> {
    articles
        .into_iter()
        .filter(|a| a.matches_year(year))
        .collect()
}

impl<D, C> PaginationLoop<D, C>
where
    D: PageDriver,
    C: AskAsync<Response = String>,
{
    pub fn new(
        scraper: ArchiveScraper<D>,
        extractor: SponsorExtractor<C>,
        options: CrawlOptions,
    ) -> Self {
        Self {
            scraper,
            extractor,
            options,
        }
    }

    /// Crawl until the archive runs out of pages.
    ///
    /// Only errors that invalidate the whole run are returned; everything
    /// page-scoped ends up in the report instead.
    #[instrument(level = "info", skip_all, fields(start_url = %self.options.start_url))]
    pub async fn run(&mut self) -> Result<CrawlReport> {
        let t0 = Instant::now();
        let mut report = CrawlReport::default();
        let mut visited: HashSet<String> = HashSet::new();
        let mut url = self.options.start_url.clone();

        loop {
            if let Some(max) = self.options.max_pages {
                if report.pages_visited >= max {
                    info!(max_pages = max, "Reached page limit");
                    break;
                }
            }
            visited.insert(url.clone());
            info!(%url, page = report.pages_visited + 1, "Navigating to listing page");

            let listing = match self.scraper.open_listing(&url).await {
                Ok(listing) => listing,
                Err(e) if e.is_page_scoped() => {
                    error!(%url, error = %e, "Listing page failed; stopping pagination");
                    report.aborted = Some(e.to_string());
                    break;
                }
                Err(e) => return Err(e),
            };
            report.pages_visited += 1;

            let total_cards = listing.articles.len();
            let articles = select_articles(listing.articles, self.options.year_filter.as_deref());
            info!(
                cards = total_cards,
                matching = articles.len(),
                year = ?self.options.year_filter,
                next = ?listing.next_page,
                "Scraped listing page"
            );

            for (i, article) in articles.iter().enumerate() {
                if i > 0 && !self.options.article_delay.is_zero() {
                    sleep(self.options.article_delay).await;
                }
                self.process_article(article, &mut report).await?;

                if let Err(e) = self.scraper.return_to(&url).await {
                    if !e.is_page_scoped() {
                        return Err(e);
                    }
                    warn!(%url, error = %e, "Could not return to listing page; continuing");
                    report.listing_returns_failed += 1;
                }
            }

            info!(
                sponsors = report.sponsors.len(),
                articles = report.articles_processed,
                "Sponsor list so far"
            );

            match listing.next_page {
                Some(next) if visited.contains(&next) => {
                    warn!(%next, "Next-page link points at a visited page; stopping");
                    break;
                }
                Some(next) => url = next,
                None => {
                    info!(%url, "No next-page link; last listing page reached");
                    break;
                }
            }
        }

        info!(
            pages = report.pages_visited,
            articles = report.articles_processed,
            failed = report.articles_failed,
            returns_failed = report.listing_returns_failed,
            parse_mismatches = report.parse_mismatches,
            completion_failures = report.completion_failures,
            sponsors = report.sponsors.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Crawl finished"
        );
        Ok(report)
    }

    /// Read one article and append its sponsors. Page-scoped failures are
    /// absorbed into the report.
    async fn process_article(
        &mut self,
        article: &ArticleRef,
        report: &mut CrawlReport,
    ) -> Result<()> {
        let content = match self.scraper.open_article(&article.link).await {
            Ok(content) => content,
            Err(e) if e.is_page_scoped() => {
                warn!(
                    link = %article.link,
                    date = %article.date,
                    error = %e,
                    "Article failed; skipping"
                );
                report.articles_failed += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let extraction = self.extractor.extract(&content.links, &content.text).await;
        match extraction.outcome {
            ExtractionOutcome::Parsed => {}
            ExtractionOutcome::ParseMismatch => report.parse_mismatches += 1,
            ExtractionOutcome::ServiceFailed => report.completion_failures += 1,
        }
        info!(
            link = %article.link,
            found = extraction.sponsors.len(),
            "Processed article"
        );
        report.sponsors.extend(extraction.sponsors);
        report.articles_processed += 1;
        Ok(())
    }

    /// Hand the browser back for shutdown.
    pub async fn close(self) -> Result<()> {
        self.scraper.close().await
    }
}
