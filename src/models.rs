//! Data models for archive articles and the sponsors extracted from them.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ArticleRef`]: An article card found on an archive listing page
//! - [`SponsorRecord`]: One sponsor mention, as persisted to `sponsors.json`
//! - [`CrawlReport`]: Totals for a finished (or aborted) crawl
//!
//! Sponsor records use camelCase field names to match the JSON files the
//! original tooling produced, hence the `#[serde(rename_all)]` attribute.

use serde::{Deserialize, Serialize};
use url::Url;

/// An article card scraped from a listing page.
///
/// Produced per listing page and consumed within the same loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    /// Absolute URL of the article.
    pub link: String,
    /// The date text exactly as shown on the card (e.g. "December 12, 2022").
    pub date: String,
}

impl ArticleRef {
    /// Whether the card passes the listing filter: a non-empty link and,
    /// when a year filter is set, a date containing it.
    pub fn matches_year(&self, year: Option<&str>) -> bool {
        if self.link.trim().is_empty() {
            return false;
        }
        match year {
            Some(y) => self.date.contains(y),
            None => true,
        }
    }
}

/// A sponsor mention extracted from one newsletter issue.
///
/// `root_domain` is always `scheme://host` of `website`. It is derived in
/// [`SponsorRecord::new`] and never taken from the completion service.
///
/// Equality and hashing cover all three fields, which is what the
/// deduplication stage relies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorRecord {
    pub company_name: String,
    /// Full link as it appeared in the issue, UTM parameters included.
    pub website: String,
    pub root_domain: String,
}

impl SponsorRecord {
    /// Build a record, deriving `root_domain` from `website`.
    ///
    /// Fails when `website` is not an absolute URL with a host.
    pub fn new(
        company_name: impl Into<String>,
        website: impl Into<String>,
    ) -> Result<Self, url::ParseError> {
        let website = website.into();
        let root_domain = root_domain(&website)?;
        Ok(Self {
            company_name: company_name.into(),
            website,
            root_domain,
        })
    }

    /// Host of the sponsor website, lowercased.
    pub fn host(&self) -> Option<String> {
        Url::parse(&self.website)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    }
}

/// Derive `scheme://host` from a URL, dropping port, path, query and fragment.
///
/// ```ignore
/// assert_eq!(
///     root_domain("https://x.example.com/path?utm_source=m").unwrap(),
///     "https://x.example.com"
/// );
/// ```
pub fn root_domain(website: &str) -> Result<String, url::ParseError> {
    let url = Url::parse(website.trim())?;
    let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
    Ok(format!("{}://{}", url.scheme(), host))
}

/// Totals for one crawl.
///
/// Returned by [`crate::crawl::PaginationLoop::run`] together with the
/// accumulated sponsors, even when pagination stopped early.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Sponsors in the order they were found, duplicates included.
    pub sponsors: Vec<SponsorRecord>,
    pub pages_visited: usize,
    pub articles_processed: usize,
    pub articles_failed: usize,
    /// Times the browser could not be brought back to the listing page
    /// after an article.
    pub listing_returns_failed: usize,
    pub parse_mismatches: usize,
    pub completion_failures: usize,
    /// Why pagination stopped early, if it did.
    pub aborted: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_domain_strips_path_and_query() {
        assert_eq!(
            root_domain("https://x.example.com/path?utm_source=m").unwrap(),
            "https://x.example.com"
        );
    }

    #[test]
    fn test_root_domain_drops_port() {
        assert_eq!(
            root_domain("http://localhost:8080/a").unwrap(),
            "http://localhost"
        );
    }

    #[test]
    fn test_root_domain_rejects_relative_and_hostless() {
        assert!(root_domain("/relative/path").is_err());
        assert!(root_domain("mailto:ads@milkroad.com").is_err());
    }

    #[test]
    fn test_sponsor_record_derives_root_domain() {
        let record =
            SponsorRecord::new("Acme", "https://acme.io/?utm_source=milkroad").unwrap();
        assert_eq!(record.company_name, "Acme");
        assert_eq!(record.website, "https://acme.io/?utm_source=milkroad");
        assert_eq!(record.root_domain, "https://acme.io");
        assert_eq!(record.host().as_deref(), Some("acme.io"));
    }

    #[test]
    fn test_sponsor_record_serializes_camel_case_in_order() {
        let record = SponsorRecord::new("Acme", "https://acme.io/").unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"companyName":"Acme","website":"https://acme.io/","rootDomain":"https://acme.io"}"#
        );
    }

    #[test]
    fn test_sponsor_record_deserialization() {
        let json = r#"{
            "companyName": "CryptoSlam",
            "website": "https://www.cryptoslam.io/?utm_source=milkroad",
            "rootDomain": "https://www.cryptoslam.io"
        }"#;
        let record: SponsorRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.company_name, "CryptoSlam");
        assert_eq!(record.root_domain, "https://www.cryptoslam.io");
    }

    #[test]
    fn test_article_year_filter() {
        let article = ArticleRef {
            link: "https://milkroad.com/daily/abc/".to_string(),
            date: "December 12, 2022".to_string(),
        };
        assert!(article.matches_year(Some("2022")));
        assert!(!article.matches_year(Some("2023")));
        assert!(article.matches_year(None));
    }

    #[test]
    fn test_article_without_link_never_matches() {
        let article = ArticleRef {
            link: "  ".to_string(),
            date: "December 12, 2022".to_string(),
        };
        assert!(!article.matches_year(Some("2022")));
        assert!(!article.matches_year(None));
    }
}
