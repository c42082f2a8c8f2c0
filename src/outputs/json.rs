//! JSON persistence for sponsor lists.
//!
//! # Files
//!
//! ```text
//! sponsors.json         # everything the crawl found, in order
//! sponsors_unique.json  # same shape, exact duplicates removed
//! ```
//!
//! Both are pretty-printed arrays of `{companyName, website, rootDomain}`.
//!
//! # Atomic Writes
//!
//! Output is written to a `.tmp` sibling and renamed into place, so an
//! interrupted run never leaves a truncated file behind.

use crate::error::{Result, ScrapeError};
use crate::models::SponsorRecord;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ScrapeError + '_ {
    move |source| ScrapeError::FileIo {
        path: path.to_path_buf(),
        source,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write sponsors as an indented JSON array.
///
/// Creates parent directories as needed.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = sponsors.len()))]
pub async fn write_sponsors(sponsors: &[SponsorRecord], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(sponsors).map_err(|source| ScrapeError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await.map_err(io_err(dir))?;
    }

    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, json).await {
        error!(path = %tmp.display(), error = %e, "Failed to write temporary file");
        return Err(io_err(&tmp)(e));
    }
    fs::rename(&tmp, path).await.map_err(io_err(path))?;
    info!("Wrote sponsors file");
    Ok(())
}

/// Read a sponsors file written by [`write_sponsors`] (or by hand, same shape).
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_sponsors(path: &Path) -> Result<Vec<SponsorRecord>> {
    let raw = fs::read_to_string(path).await.map_err(io_err(path))?;
    let sponsors: Vec<SponsorRecord> =
        serde_json::from_str(&raw).map_err(|source| ScrapeError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    info!(count = sponsors.len(), "Read sponsors file");
    Ok(sponsors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("sponsors-json-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn test_written_file_is_indented_camel_case() {
        let dir = scratch("indent");
        let path = dir.join("out").join("sponsors.json");
        let sponsors =
            vec![SponsorRecord::new("Acme", "https://acme.io/?utm_source=milkroad").unwrap()];

        write_sponsors(&sponsors, &path).await.unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("[\n  {\n    \"companyName\": \"Acme\""));
        assert!(raw.contains("\"rootDomain\": \"https://acme.io\""));
        assert!(!tmp_path(&path).exists());
        assert_eq!(read_sponsors(&path).await.unwrap(), sponsors);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_input_is_a_file_error() {
        let err = read_sponsors(&scratch("missing.json")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::FileIo { .. }));
    }

    #[tokio::test]
    async fn test_malformed_input_is_a_json_error() {
        let dir = scratch("malformed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sponsors.json");
        std::fs::write(&path, "[{\"companyName\": \"Acme\"").unwrap();

        let err = read_sponsors(&path).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Json { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_tmp_path_is_a_sibling() {
        assert_eq!(
            tmp_path(Path::new("out/sponsors.json")),
            PathBuf::from("out/sponsors.json.tmp")
        );
    }
}
