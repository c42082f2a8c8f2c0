//! Deduplication of the accumulated sponsor list.
//!
//! Two records are duplicates only when all three fields are identical. No
//! fuzzy matching on company name or domain: "Acme" and "ACME" with the same
//! link are kept as two records.

use crate::error::Result;
use crate::models::SponsorRecord;
use crate::outputs::json;
use itertools::Itertools;
use std::path::Path;
use tracing::{info, instrument};

/// Remove exact duplicates, keeping each record at its first position.
pub fn dedupe_sponsors(sponsors: Vec<SponsorRecord>) -> Vec<SponsorRecord> {
    sponsors.into_iter().unique().collect()
}

/// Read `input`, deduplicate, write `output`. Returns `(read, written)`.
#[instrument(
    level = "info",
    skip_all,
    fields(input = %input.display(), output = %output.display())
)]
pub async fn dedupe_file(input: &Path, output: &Path) -> Result<(usize, usize)> {
    let sponsors = json::read_sponsors(input).await?;
    let read = sponsors.len();
    let unique = dedupe_sponsors(sponsors);
    json::write_sponsors(&unique, output).await?;
    info!(read, unique = unique.len(), removed = read - unique.len(), "Deduplicated sponsors");
    Ok((read, unique.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sponsor(name: &str, website: &str) -> SponsorRecord {
        SponsorRecord::new(name, website).unwrap()
    }

    #[test]
    fn test_first_occurrence_order() {
        let a = sponsor("A", "https://a.io/?utm_source=milkroad");
        let b = sponsor("B", "https://b.io/?utm_source=milkroad");
        let c = sponsor("C", "https://c.io/?utm_source=milkroad");
        let input = vec![a.clone(), b.clone(), a.clone(), c.clone(), b.clone()];
        assert_eq!(dedupe_sponsors(input), vec![a, b, c]);
    }

    #[test]
    fn test_idempotent_on_unique_list() {
        let unique = vec![
            sponsor("C", "https://c.io/"),
            sponsor("A", "https://a.io/"),
            sponsor("B", "https://b.io/"),
        ];
        assert_eq!(dedupe_sponsors(unique.clone()), unique);
        assert_eq!(dedupe_sponsors(dedupe_sponsors(unique.clone())), unique);
    }

    #[test]
    fn test_differing_in_one_field_is_not_a_duplicate() {
        let input = vec![
            sponsor("Acme", "https://acme.io/?utm_source=milkroad"),
            sponsor("ACME", "https://acme.io/?utm_source=milkroad"),
            sponsor("Acme", "https://acme.io/?utm_campaign=milkroad"),
        ];
        assert_eq!(dedupe_sponsors(input).len(), 3);
    }

    #[test]
    fn test_empty_list() {
        assert!(dedupe_sponsors(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_dedupe_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("sponsors-dedupe-{}", std::process::id()));
        let input = dir.join("sponsors.json");
        let output = dir.join("sponsors_unique.json");
        let a = sponsor("A", "https://a.io/");
        let b = sponsor("B", "https://b.io/");
        json::write_sponsors(&[a.clone(), b.clone(), a.clone()], &input)
            .await
            .unwrap();

        let (read, written) = dedupe_file(&input, &output).await.unwrap();
        assert_eq!((read, written), (3, 2));
        assert_eq!(json::read_sponsors(&output).await.unwrap(), vec![a, b]);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
