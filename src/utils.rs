//! Utility functions for string handling, URL resolution, and file system checks.
//!
//! This module provides helper functions used throughout the application:
//! - String truncation for logging long LLM replies and article bodies
//! - Whitespace collapsing for text scraped out of the DOM
//! - Href resolution against a page or site origin
//! - Output path validation before a long crawl starts

use crate::error::{Result, ScrapeError};
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};
use url::Url;

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with an
/// ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let cut = floor_char_boundary(s, max);
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

/// Cut `s` to at most `max` characters without an indicator.
///
/// Used to keep prompts within a sane size.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Collapse runs of whitespace into single spaces and trim the ends.
///
/// DOM `textContent` is full of indentation and blank lines; the model does
/// not need them.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve an href the way a browser resolves `a.href`.
///
/// Absolute hrefs are returned as-is, relative ones are joined onto `base`.
/// Empty hrefs, fragments-only and non-http(s) schemes resolve to `None`.
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let resolved = match Url::parse(href) {
        Ok(abs) => abs,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(href).ok()?,
        Err(_) => return None,
    };
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}

/// Ensure the parent directory of an output file exists and is writable.
///
/// Called before the crawl starts so a bad output path fails fast instead of
/// after an hour of scraping.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_parent(path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => Path::new(".").to_path_buf(),
    };
    fs::create_dir_all(&dir).await.map_err(|source| ScrapeError::FileIo {
        path: dir.clone(),
        source,
    })?;
    // Try a small sync write using std fs (simpler error surface)
    let probe_path = dir.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(source) => Err(ScrapeError::FileIo { path: dir, source }),
    }
}
