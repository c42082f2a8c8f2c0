//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Credentials and endpoint settings can also come from environment variables.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the sponsor scraper.
///
/// # Examples
///
/// ```sh
/// # Crawl the 2022 archive and write sponsors.json + sponsors_unique.json
/// OPENAI_API_KEY=sk-... newsletter_sponsors scrape
///
/// # Start from a later page, every year, against a local model
/// newsletter_sponsors scrape --start-url 'https://milkroad.com/daily/?sf_paged=10' \
///     --any-year --api-base http://localhost:11434/v1 --model qwen2.5
///
/// # Deduplicate an existing file
/// newsletter_sponsors dedupe -i sponsors.json -o sponsors_unique.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the archive and extract sponsors
    Scrape(ScrapeArgs),
    /// Remove exact duplicate records from a sponsors file
    Dedupe(DedupeArgs),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// First listing page (defaults to the site profile's start URL)
    #[arg(long)]
    pub start_url: Option<String>,

    /// Only visit articles whose date contains this text
    #[arg(long, default_value = "2022", conflicts_with = "any_year")]
    pub year: String,

    /// Visit articles from every year
    #[arg(long)]
    pub any_year: bool,

    /// Deadline for each page load, readiness wait included. The browser
    /// caps the load request itself at 30 s.
    #[arg(long, default_value_t = 100)]
    pub navigation_timeout_secs: u64,

    /// Stop after this many listing pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Pause between articles, in milliseconds
    #[arg(long, default_value_t = 0)]
    pub article_delay_ms: u64,

    /// Where to write every sponsor found
    #[arg(short, long, default_value = "sponsors.json")]
    pub output: PathBuf,

    /// Where to write the deduplicated list
    #[arg(short, long, default_value = "sponsors_unique.json")]
    pub unique_output: PathBuf,

    /// Skip the deduplication stage
    #[arg(long)]
    pub no_dedupe: bool,

    /// YAML file overriding the site profile (selectors, origin, newsletter identity)
    #[arg(long)]
    pub site_config: Option<PathBuf>,

    /// API key for the completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_API_BASE", default_value = "https://api.openai.com/v1")]
    pub api_base: String,

    /// Model name
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// Retries for a failed completion call (0 disables retrying)
    #[arg(long, default_value_t = 3)]
    pub llm_retries: usize,

    /// Timeout for a single completion call
    #[arg(long, default_value_t = 120)]
    pub llm_timeout_secs: u64,

    /// Article text beyond this many characters is not sent to the model
    #[arg(long, default_value_t = 12_000)]
    pub max_article_chars: usize,

    /// Show the browser window
    #[arg(long)]
    pub headful: bool,
}

impl ScrapeArgs {
    /// The year filter in effect, if any.
    pub fn year_filter(&self) -> Option<String> {
        if self.any_year || self.year.trim().is_empty() {
            None
        } else {
            Some(self.year.trim().to_string())
        }
    }
}

#[derive(Args, Debug)]
pub struct DedupeArgs {
    /// Sponsors file to read
    #[arg(short, long, default_value = "sponsors.json")]
    pub input: PathBuf,

    /// Deduplicated file to write
    #[arg(short, long, default_value = "sponsors_unique.json")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_defaults() {
        let cli = Cli::parse_from(["newsletter_sponsors", "scrape", "--api-key", "sk-test"]);
        let Command::Scrape(args) = cli.command else {
            panic!("expected scrape");
        };
        assert_eq!(args.api_key, "sk-test");
        assert_eq!(args.year_filter().as_deref(), Some("2022"));
        assert_eq!(args.navigation_timeout_secs, 100);
        assert_eq!(args.output, PathBuf::from("sponsors.json"));
        assert_eq!(args.unique_output, PathBuf::from("sponsors_unique.json"));
        assert_eq!(args.llm_retries, 3);
        assert!(!args.no_dedupe);
    }

    #[test]
    fn test_scrape_any_year() {
        let cli = Cli::parse_from([
            "newsletter_sponsors",
            "scrape",
            "--api-key",
            "sk-test",
            "--any-year",
            "--start-url",
            "https://milkroad.com/daily/?sf_paged=10",
        ]);
        let Command::Scrape(args) = cli.command else {
            panic!("expected scrape");
        };
        assert_eq!(args.year_filter(), None);
        assert_eq!(args.start_url.as_deref(), Some("https://milkroad.com/daily/?sf_paged=10"));
    }

    #[test]
    fn test_year_and_any_year_conflict() {
        let result = Cli::try_parse_from([
            "newsletter_sponsors",
            "scrape",
            "--api-key",
            "sk-test",
            "--year",
            "2023",
            "--any-year",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_dedupe_short_flags() {
        let cli = Cli::parse_from([
            "newsletter_sponsors",
            "dedupe",
            "-i",
            "/tmp/in.json",
            "-o",
            "/tmp/out.json",
        ]);
        let Command::Dedupe(args) = cli.command else {
            panic!("expected dedupe");
        };
        assert_eq!(args.input, PathBuf::from("/tmp/in.json"));
        assert_eq!(args.output, PathBuf::from("/tmp/out.json"));
    }
}
