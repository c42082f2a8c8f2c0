//! Error taxonomy for the crawl, extraction, and persistence stages.
//!
//! Which variants are fatal depends on where they surface:
//!
//! | Variant | Recovered by |
//! |---------|--------------|
//! | [`ScrapeError::NavigationTimeout`], [`ScrapeError::Browser`] | the crawl loop (per article) |
//! | [`ScrapeError::CompletionService`], [`ScrapeError::ParseMismatch`] | the sponsor extractor |
//! | [`ScrapeError::Launch`], [`ScrapeError::FileIo`], [`ScrapeError::Json`], [`ScrapeError::Config`] | nobody; these end the run |

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A page did not load (or never became ready) within the deadline.
    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },

    /// Any other failure reported by the browser automation layer.
    #[error("browser error: {0}")]
    Browser(String),

    /// The headless browser could not be started.
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// The completion service call failed (network, auth, rate limit, bad body).
    #[error("completion service error: {0}")]
    CompletionService(String),

    /// The completion reply did not contain any recognisable sponsor entries.
    #[error("completion reply did not match the sponsor format: {preview}")]
    ParseMismatch { preview: String },

    #[error("I/O error on {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid configuration: bad selector, unreadable site profile, missing key.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    /// Errors scoped to a single page; the crawl may continue past them.
    pub fn is_page_scoped(&self) -> bool {
        matches!(
            self,
            ScrapeError::NavigationTimeout { .. } | ScrapeError::Browser(_)
        )
    }
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(e: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Browser(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_timeout_message() {
        let e = ScrapeError::NavigationTimeout {
            url: "https://milkroad.com/daily/".to_string(),
            timeout: Duration::from_secs(100),
        };
        assert_eq!(
            e.to_string(),
            "navigation to https://milkroad.com/daily/ timed out after 100s"
        );
        assert!(e.is_page_scoped());
    }

    #[test]
    fn test_file_errors_are_not_page_scoped() {
        let e = ScrapeError::FileIo {
            path: PathBuf::from("sponsors.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(!e.is_page_scoped());
        assert!(e.to_string().contains("sponsors.json"));
    }
}
