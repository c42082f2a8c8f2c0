//! Site profile for the newsletter archive and the HTML parsing built on it.
//!
//! Every selector here runs against an HTML snapshot taken from the browser
//! after the page settled, using `scraper`. Keeping the parsing out of the
//! browser means it can be tested against fixture markup.
//!
//! # Default Profile
//!
//! | Field | Milk Road value |
//! |-------|-----------------|
//! | `article_selector` | `article` |
//! | `date_selector` | `.date` |
//! | `title_link_selector` | `.post-title a` |
//! | `content_links_selector` | `div.entry-content a[href]` |
//! | `content_text_selector` | `article` |
//! | `next_page_selector` | `a.nextpostslink` |
//! | `listing_ready_selector` | `body` |
//! | `article_ready_selector` | `article` |

use crate::error::{Result, ScrapeError};
use crate::models::ArticleRef;
use crate::utils::{collapse_whitespace, resolve_href};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Where things live on the archive site.
///
/// Any subset of fields can be overridden from a YAML file; missing fields
/// keep the Milk Road defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteProfile {
    /// Scheme and host used to resolve relative pagination links.
    pub origin: String,
    /// First listing page of the crawl.
    pub start_url: String,
    pub newsletter_name: String,
    pub newsletter_domain: String,
    /// Hosts whose links are never sponsors.
    pub excluded_hosts: Vec<String>,

    /// One element per article card on a listing page.
    pub article_selector: String,
    /// Date text, relative to the card.
    pub date_selector: String,
    /// Link to the article, relative to the card.
    pub title_link_selector: String,
    /// Links inside the article body.
    pub content_links_selector: String,
    /// Element whose text is sent to the model.
    pub content_text_selector: String,
    /// "Next page" control on a listing page.
    pub next_page_selector: String,
    /// Close buttons of the subscribe overlay, tried in order.
    pub overlay_close_selectors: Vec<String>,
    /// Element whose presence means a listing page is ready to be read.
    /// Kept loose so an empty listing does not wait out the deadline.
    pub listing_ready_selector: String,
    /// Element whose presence means an article page is ready to be read.
    pub article_ready_selector: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            origin: "https://milkroad.com".to_string(),
            start_url: "https://milkroad.com/daily/".to_string(),
            newsletter_name: "Milk Road".to_string(),
            newsletter_domain: "milkroad.com".to_string(),
            excluded_hosts: vec!["twitter.com".to_string()],
            article_selector: "article".to_string(),
            date_selector: ".date".to_string(),
            title_link_selector: ".post-title a".to_string(),
            content_links_selector: "div.entry-content a[href]".to_string(),
            content_text_selector: "article".to_string(),
            next_page_selector: "a.nextpostslink".to_string(),
            overlay_close_selectors: vec![
                "button[aria-label='Close']".to_string(),
                ".ck_modal .ck_close_link".to_string(),
                ".modal-close".to_string(),
                ".popup-close".to_string(),
            ],
            listing_ready_selector: "body".to_string(),
            article_ready_selector: "article".to_string(),
        }
    }
}

/// The parts of an article page handed to the sponsor extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContent {
    /// Absolute hrefs inside the content region, in document order.
    pub links: Vec<String>,
    /// Whitespace-collapsed text of the text region.
    pub text: String,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Config(format!("invalid selector {css:?}: {e}")))
}

fn element_text(el: ElementRef<'_>) -> String {
    collapse_whitespace(&el.text().collect::<String>())
}

impl SiteProfile {
    /// Load a profile from YAML, falling back to defaults for missing fields.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ScrapeError::FileIo {
                path: path.to_path_buf(),
                source,
            })?;
        let profile = Self::from_yaml(&raw)?;
        info!(origin = %profile.origin, "Loaded site profile");
        Ok(profile)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let profile: SiteProfile = serde_yaml::from_str(raw)
            .map_err(|e| ScrapeError::Config(format!("invalid site profile: {e}")))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Check that every selector parses and the origin is a URL.
    pub fn validate(&self) -> Result<()> {
        for css in [
            &self.article_selector,
            &self.date_selector,
            &self.title_link_selector,
            &self.content_links_selector,
            &self.content_text_selector,
            &self.next_page_selector,
            &self.listing_ready_selector,
            &self.article_ready_selector,
        ]
        .into_iter()
        .chain(self.overlay_close_selectors.iter())
        {
            selector(css)?;
        }
        url::Url::parse(&self.origin)
            .map_err(|e| ScrapeError::Config(format!("invalid origin {:?}: {e}", self.origin)))?;
        Ok(())
    }

    /// All article cards on a listing page, unfiltered.
    ///
    /// Cards without a usable link are skipped. The date is the card's date
    /// text, or empty when the card has none.
    pub fn listing_articles(&self, html: &str, page_url: &str) -> Result<Vec<ArticleRef>> {
        let document = Html::parse_document(html);
        let article_sel = selector(&self.article_selector)?;
        let date_sel = selector(&self.date_selector)?;
        let link_sel = selector(&self.title_link_selector)?;

        let articles: Vec<ArticleRef> = document
            .select(&article_sel)
            .filter_map(|card| {
                let date = card
                    .select(&date_sel)
                    .next()
                    .map(element_text)
                    .unwrap_or_default();
                let href = card.select(&link_sel).next()?.value().attr("href")?;
                let link = resolve_href(page_url, href)?;
                Some(ArticleRef { link, date })
            })
            .collect();

        debug!(count = articles.len(), %page_url, "Parsed listing cards");
        Ok(articles)
    }

    /// Links and text of an article page.
    ///
    /// Fails when the text region is missing, which usually means the page
    /// did not render as an article at all. A missing links region just
    /// yields no links.
    pub fn article_content(&self, html: &str, page_url: &str) -> Result<ArticleContent> {
        let document = Html::parse_document(html);
        let links_sel = selector(&self.content_links_selector)?;
        let text_sel = selector(&self.content_text_selector)?;

        let links: Vec<String> = document
            .select(&links_sel)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve_href(page_url, href))
            .collect();

        let text = document
            .select(&text_sel)
            .next()
            .map(element_text)
            .ok_or_else(|| {
                ScrapeError::Browser(format!(
                    "no element matches {:?} on {page_url}",
                    self.content_text_selector
                ))
            })?;

        Ok(ArticleContent { links, text })
    }

    /// Resolved URL of the "next page" control, if the page has one.
    ///
    /// Relative hrefs are resolved against [`SiteProfile::origin`].
    pub fn next_page_url(&self, html: &str) -> Result<Option<String>> {
        let document = Html::parse_document(html);
        let next_sel = selector(&self.next_page_selector)?;
        Ok(document
            .select(&next_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_href(&self.origin, href)))
    }
}
