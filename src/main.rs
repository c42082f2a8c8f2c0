//! # Newsletter Sponsors
//!
//! Crawls a newsletter archive (Milk Road's daily archive by default) in a
//! headless browser, asks an LLM which companies sponsored each issue, and
//! writes the sponsors to JSON.
//!
//! ## Usage
//!
//! ```sh
//! OPENAI_API_KEY=sk-... newsletter_sponsors scrape
//! newsletter_sponsors dedupe -i sponsors.json -o sponsors_unique.json
//! ```
//!
//! ## Architecture
//!
//! The `scrape` command is a sequential pipeline:
//! 1. **Listing**: Load an archive page and pick the article cards for the year
//! 2. **Reading**: Open each article, collect the body's links and text
//! 3. **Extraction**: Ask the completion service for sponsors, parse the reply
//! 4. **Pagination**: Follow the next-page link until there is none
//! 5. **Output**: Write `sponsors.json`, then the deduplicated `sponsors_unique.json`

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod crawl;
mod dedupe;
mod error;
mod models;
mod outputs;
mod scrapers;
mod sponsors;
mod utils;

use api::{CompletionSettings, OpenAiCompletion, RetryAsk};
use cli::{Cli, Command, DedupeArgs, ScrapeArgs};
use crawl::{CrawlOptions, PaginationLoop};
use outputs::json;
use scrapers::ArchiveScraper;
use scrapers::chromium::{ChromiumPage, LaunchOptions};
use scrapers::site::SiteProfile;
use sponsors::{NewsletterIdentity, SponsorExtractor};
use utils::ensure_writable_parent;

#[tokio::main]
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
    info!("newsletter_sponsors starting up");

    let args = Cli::parse();

    let result = match args.command {
        Command::Scrape(scrape_args) => run_scrape(scrape_args).await,
        Command::Dedupe(dedupe_args) => run_dedupe(dedupe_args).await,
    };
    if let Err(e) = &result {
        error!(error = %e, "Run failed");
    }
    result?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_scrape(args: ScrapeArgs) -> Result<(), Box<dyn Error>> {
    debug!(?args.output, ?args.unique_output, ?args.site_config, "Parsed scrape arguments");

    // Early check: a bad output path should fail before the crawl, not after it
    ensure_writable_parent(&args.output).await?;
    if !args.no_dedupe {
        ensure_writable_parent(&args.unique_output).await?;
    }

    let profile = match &args.site_config {
        Some(path) => SiteProfile::load(path).await?,
        None => SiteProfile::default(),
    };

    let identity = NewsletterIdentity {
        name: profile.newsletter_name.clone(),
        domain: profile.newsletter_domain.clone(),
        excluded_hosts: profile.excluded_hosts.clone(),
    };
    let client = OpenAiCompletion::new(CompletionSettings {
        api_key: args.api_key.clone(),
        api_base: args.api_base.clone(),
        model: args.model.clone(),
        timeout: Duration::from_secs(args.llm_timeout_secs),
    })?;
    info!(model = %args.model, api_base = %args.api_base, "Completion client ready");
    let extractor = SponsorExtractor::new(
        RetryAsk::new(client, args.llm_retries, Duration::from_secs(1)),
        identity,
        args.max_article_chars,
    );

    let options = CrawlOptions {
        start_url: args
            .start_url
            .clone()
            .unwrap_or_else(|| profile.start_url.clone()),
        year_filter: args.year_filter(),
        max_pages: args.max_pages,
        article_delay: Duration::from_millis(args.article_delay_ms),
    };

    let page = ChromiumPage::launch(LaunchOptions {
        headful: args.headful,
        navigation_timeout: Duration::from_secs(args.navigation_timeout_secs),
        window_size: (1366, 900),
    })
    .await?;

    let mut crawl = PaginationLoop::new(ArchiveScraper::new(page, profile), extractor, options);
    let outcome = crawl.run().await;
    if let Err(e) = crawl.close().await {
        warn!(error = %e, "Browser shutdown failed");
    }
    let report = outcome?;

    if let Some(reason) = &report.aborted {
        warn!(%reason, "Crawl stopped early; writing partial results");
    }
    info!(
        pages = report.pages_visited,
        articles = report.articles_processed,
        failed = report.articles_failed,
        returns_failed = report.listing_returns_failed,
        parse_mismatches = report.parse_mismatches,
        completion_failures = report.completion_failures,
        "Crawl summary"
    );

    json::write_sponsors(&report.sponsors, &args.output).await?;
    info!(path = %args.output.display(), count = report.sponsors.len(), "Wrote sponsors");

    if !args.no_dedupe {
        let (read, unique) = dedupe::dedupe_file(&args.output, &args.unique_output).await?;
        info!(path = %args.unique_output.display(), read, unique, "Wrote unique sponsors");
    }
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_dedupe(args: DedupeArgs) -> Result<(), Box<dyn Error>> {
    ensure_writable_parent(&args.output).await?;
    let (read, unique) = dedupe::dedupe_file(&args.input, &args.output).await?;
    info!(path = %args.output.display(), read, unique, "Wrote unique sponsors");
    Ok(())
}
