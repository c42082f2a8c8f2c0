//! Browser-backed scraping of the newsletter archive.
//!
//! Scraping is split in two halves:
//!
//! 1. **Driving**: a [`PageDriver`] navigates, waits for the page to become
//!    ready, dismisses the subscribe overlay and hands back an HTML snapshot.
//!    [`chromium::ChromiumPage`] is the real implementation.
//! 2. **Reading**: [`site::SiteProfile`] runs CSS selectors over that snapshot
//!    to find article cards, article links and text, and the next-page link.
//!
//! [`ArchiveScraper`] combines the two into the operations the crawl loop
//! needs.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chromium`] | Headless Chromium over CDP (`chromiumoxide`) |
//! | [`site`] | Selectors and HTML parsing for the archive site |

pub mod chromium;
pub mod site;

use crate::error::Result;
use crate::models::ArticleRef;
use site::{ArticleContent, SiteProfile};
use tracing::{debug, instrument};

/// The browser capability the crawl depends on.
///
/// One page, driven sequentially.
pub trait PageDriver {
    /// Load `url` and wait until `ready_selector` is present.
    ///
    /// Both steps share one deadline; exceeding it is a
    /// [`crate::error::ScrapeError::NavigationTimeout`].
    async fn navigate(&mut self, url: &str, ready_selector: &str) -> Result<()>;

    /// Click the first of `close_selectors` present on the page.
    ///
    /// Returns whether anything was clicked. No overlay is not an error.
    async fn dismiss_overlay(&mut self, close_selectors: &[String]) -> Result<bool>;

    /// Serialized DOM of the current page.
    async fn html(&mut self) -> Result<String>;

    /// Release the page and the browser.
    async fn close(self) -> Result<()>;
}

/// One listing page as read right after it loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Every article card, unfiltered.
    pub articles: Vec<ArticleRef>,
    /// Resolved "next page" link, if the page has one.
    pub next_page: Option<String>,
}

/// Reads the archive through a [`PageDriver`] using a [`SiteProfile`].
pub struct ArchiveScraper<D> {
    driver: D,
    profile: SiteProfile,
}

impl<D: PageDriver> ArchiveScraper<D> {
    pub fn new(driver: D, profile: SiteProfile) -> Self {
        Self { driver, profile }
    }

    /// Navigate, wait for `ready_selector` and clear the overlay.
    async fn visit(&mut self, url: &str, ready_selector: &str) -> Result<()> {
        self.driver.navigate(url, ready_selector).await?;
        if self
            .driver
            .dismiss_overlay(&self.profile.overlay_close_selectors)
            .await?
        {
            debug!(%url, "Dismissed overlay");
        }
        Ok(())
    }

    /// Open a listing page and read its cards and next-page link from one
    /// snapshot.
    #[instrument(level = "info", skip(self))]
    pub async fn open_listing(&mut self, url: &str) -> Result<Listing> {
        let ready = self.profile.listing_ready_selector.clone();
        self.visit(url, &ready).await?;
        let html = self.driver.html().await?;
        Ok(Listing {
            articles: self.profile.listing_articles(&html, url)?,
            next_page: self.profile.next_page_url(&html)?,
        })
    }

    /// Open an article and read its links and text.
    #[instrument(level = "info", skip(self))]
    pub async fn open_article(&mut self, url: &str) -> Result<ArticleContent> {
        let ready = self.profile.article_ready_selector.clone();
        self.visit(url, &ready).await?;
        let html = self.driver.html().await?;
        self.profile.article_content(&html, url)
    }

    /// Go back to a listing page after reading an article.
    #[instrument(level = "info", skip(self))]
    pub async fn return_to(&mut self, url: &str) -> Result<()> {
        let ready = self.profile.listing_ready_selector.clone();
        self.visit(url, &ready).await
    }

    pub async fn close(self) -> Result<()> {
        self.driver.close().await
    }
}
