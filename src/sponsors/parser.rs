//! Parser for the completion service's free-text sponsor listing.
//!
//! The model is asked for a JavaScript-ish array literal, but what comes back
//! is not guaranteed to be valid JSON (single quotes, unquoted keys, prose
//! around it). Instead of deserializing, the reply is scanned for
//! `companyName: '…', website: '…'` pairs. Both quote styles are accepted and
//! keys may be quoted, so a strict JSON reply parses too.

use crate::error::ScrapeError;
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use regex::Regex;

static SPONSOR_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"["']?companyName["']?\s*:\s*(?:'([^']*)'|"([^"]*)")\s*,\s*["']?website["']?\s*:\s*(?:'([^']*)'|"([^"]*)")"#,
    )
    .expect("sponsor pair pattern is valid")
});

/// Replies that explicitly say there is nothing to report. `[]` may sit on
/// its own line inside a Markdown code fence.
static EMPTY_ANSWER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*\[\s*\]\s*$|\bno\s+sponsors?\b|\bsponsors?:?\s*none\b")
        .expect("empty answer pattern is valid")
});

/// A `(companyName, website)` pair as written by the model.
///
/// Nothing is validated yet; the website may not even be a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSponsor {
    pub company_name: String,
    pub website: String,
}

/// Scan a completion reply for sponsor pairs.
///
/// * one or more pairs found: `Ok(pairs)`
/// * no pairs, but the reply is an explicit empty answer (`[]`, "No sponsors
///   found"): `Ok(vec![])`
/// * no pairs otherwise: [`ScrapeError::ParseMismatch`]
pub fn parse_sponsor_reply(reply: &str) -> Result<Vec<RawSponsor>, ScrapeError> {
    let pairs: Vec<RawSponsor> = SPONSOR_PAIR
        .captures_iter(reply)
        .filter_map(|caps| {
            let name = caps.get(1).or_else(|| caps.get(2))?.as_str().trim();
            let website = caps.get(3).or_else(|| caps.get(4))?.as_str().trim();
            Some(RawSponsor {
                company_name: name.to_string(),
                website: website.to_string(),
            })
        })
        .collect();

    if !pairs.is_empty() || EMPTY_ANSWER.is_match(reply) {
        return Ok(pairs);
    }
    Err(ScrapeError::ParseMismatch {
        preview: truncate_for_log(reply.trim(), 200),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_quoted_reply() {
        let reply = "[{ companyName: 'Acme', website: 'https://acme.io/?utm_source=milkroad', rootDomain: 'https://acme.io' }]";
        let pairs = parse_sponsor_reply(reply).unwrap();
        assert_eq!(
            pairs,
            vec![RawSponsor {
                company_name: "Acme".to_string(),
                website: "https://acme.io/?utm_source=milkroad".to_string(),
            }]
        );
    }

    #[test]
    fn test_multiline_reply_with_several_sponsors() {
        let reply = r#"Here are the sponsors:
[{
    companyName: 'CryptoSlam',
    website: 'https://www.cryptoslam.io/?utm_source=milkroad&utm_medium=milkroad',
    rootDomain: 'https://www.cryptoslam.io'
},
{
    companyName: 'Bitwise',
    website: 'https://bitwiseinvestments.com/?utm_campaign=milkroad',
    rootDomain: 'https://bitwiseinvestments.com'
}]"#;
        let pairs = parse_sponsor_reply(reply).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].company_name, "CryptoSlam");
        assert_eq!(pairs[1].website, "https://bitwiseinvestments.com/?utm_campaign=milkroad");
    }

    #[test]
    fn test_json_reply() {
        let reply = r#"[{"companyName": "Acme", "website": "https://acme.io/?utm_source=x", "rootDomain": "https://acme.io"}]"#;
        let pairs = parse_sponsor_reply(reply).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].company_name, "Acme");
        assert_eq!(pairs[0].website, "https://acme.io/?utm_source=x");
    }

    #[test]
    fn test_no_sponsors_found_is_empty_not_error() {
        assert!(parse_sponsor_reply("No sponsors found").unwrap().is_empty());
        assert!(parse_sponsor_reply("[]").unwrap().is_empty());
        assert!(parse_sponsor_reply(" [ ]\n").unwrap().is_empty());
        assert!(parse_sponsor_reply("```json\n[]\n```").unwrap().is_empty());
        assert!(parse_sponsor_reply("```\n[ ]\n```\n").unwrap().is_empty());
    }

    #[test]
    fn test_brackets_inside_prose_are_not_an_empty_answer() {
        assert!(parse_sponsor_reply("The list [] is shown below, sorry.").is_err());
    }

    #[test]
    fn test_unrecognised_reply_is_a_parse_mismatch() {
        let err = parse_sponsor_reply("The issue talks about Ethereum staking.").unwrap_err();
        match err {
            ScrapeError::ParseMismatch { preview } => {
                assert!(preview.starts_with("The issue talks about"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
