//! Sponsor extraction for a single newsletter issue.

use super::parser::{RawSponsor, parse_sponsor_reply};
use super::prompt::{newsletter_slug, sponsor_prompt};
use crate::api::AskAsync;
use crate::error::ScrapeError;
use crate::models::SponsorRecord;
use crate::utils::{truncate_chars, truncate_for_log};
use tracing::{debug, error, info, instrument, warn};

/// Who the newsletter is, so its self-promotion can be told apart from sponsors.
#[derive(Debug, Clone)]
pub struct NewsletterIdentity {
    /// Display name, e.g. "Milk Road".
    pub name: String,
    /// Registrable domain, e.g. "milkroad.com". Subdomains are matched too.
    pub domain: String,
    /// Hosts whose links are never sponsors (social media, mostly).
    pub excluded_hosts: Vec<String>,
}

/// How one extraction call went. The crawl loop counts these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    /// The reply parsed; zero or more sponsors survived filtering.
    Parsed,
    /// The reply had no recognisable sponsor entries.
    ParseMismatch,
    /// The completion service call failed.
    ServiceFailed,
}

#[derive(Debug)]
pub struct Extraction {
    pub sponsors: Vec<SponsorRecord>,
    pub outcome: ExtractionOutcome,
}

/// Turns an issue's links and text into sponsor records via a completion service.
///
/// Never returns an error: service failures and unparseable replies are
/// logged and reported through [`ExtractionOutcome`] with an empty list.
pub struct SponsorExtractor<C> {
    client: C,
    identity: NewsletterIdentity,
    max_text_chars: usize,
}

impl<C> SponsorExtractor<C>
where
    C: AskAsync<Response = String>,
{
    pub fn new(client: C, identity: NewsletterIdentity, max_text_chars: usize) -> Self {
        Self {
            client,
            identity,
            max_text_chars,
        }
    }

    #[instrument(level = "info", skip_all, fields(links = links.len(), text_bytes = text.len()))]
    pub async fn extract(&self, links: &[String], text: &str) -> Extraction {
        let text = truncate_chars(text, self.max_text_chars);
        let prompt = sponsor_prompt(
            &self.identity.name,
            &self.identity.domain,
            &links.join("\n"),
            text,
        );

        let reply = match self.client.ask(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "Completion service call failed; no sponsors for this issue");
                return Extraction {
                    sponsors: Vec::new(),
                    outcome: ExtractionOutcome::ServiceFailed,
                };
            }
        };
        debug!(reply = %truncate_for_log(&reply, 500), "Completion reply");

        let raw = match parse_sponsor_reply(&reply) {
            Ok(raw) => raw,
            Err(ScrapeError::ParseMismatch { preview }) => {
                warn!(%preview, "Completion reply did not match the sponsor format");
                return Extraction {
                    sponsors: Vec::new(),
                    outcome: ExtractionOutcome::ParseMismatch,
                };
            }
            Err(e) => {
                warn!(error = %e, "Completion reply could not be parsed");
                return Extraction {
                    sponsors: Vec::new(),
                    outcome: ExtractionOutcome::ParseMismatch,
                };
            }
        };

        let found = raw.len();
        let sponsors: Vec<SponsorRecord> = raw
            .into_iter()
            .filter_map(|r| self.to_record(r))
            .filter(|s| !self.is_excluded(s))
            .collect();

        info!(found, kept = sponsors.len(), "Extracted sponsors");
        Extraction {
            sponsors,
            outcome: ExtractionOutcome::Parsed,
        }
    }

    fn to_record(&self, raw: RawSponsor) -> Option<SponsorRecord> {
        match SponsorRecord::new(raw.company_name, raw.website.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(website = %raw.website, error = %e, "Dropping sponsor with unusable website");
                None
            }
        }
    }

    /// Self-references and excluded hosts never make it into the output,
    /// whatever the model decided.
    fn is_excluded(&self, record: &SponsorRecord) -> bool {
        let host = record.host().unwrap_or_default();
        let domain = self.identity.domain.to_ascii_lowercase();
        if host_matches(&host, &domain) {
            debug!(company = %record.company_name, %host, "Excluding self-reference");
            return true;
        }
        if self
            .identity
            .excluded_hosts
            .iter()
            .any(|h| host_matches(&host, &h.to_ascii_lowercase()))
        {
            debug!(company = %record.company_name, %host, "Excluding link to excluded host");
            return true;
        }
        let slug = newsletter_slug(&self.identity.name);
        !slug.is_empty() && newsletter_slug(&record.company_name) == slug
    }
}

/// `host` is `domain` itself or one of its subdomains.
fn host_matches(host: &str, domain: &str) -> bool {
    !domain.is_empty() && (host == domain || host.ends_with(&format!(".{domain}")))
}
