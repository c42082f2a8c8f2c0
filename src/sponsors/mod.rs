//! Sponsor identification through a completion service.
//!
//! # Submodules
//!
//! - [`prompt`]: The fixed instruction prompt
//! - [`parser`]: Turns the model's free-text reply into `(companyName, website)` pairs
//! - [`extractor`]: Ties the two together, derives root domains, filters self-references
//!
//! The prompt and parser are kept apart from the crawl loop so the reply
//! format can change without touching navigation code.

pub mod extractor;
pub mod parser;
pub mod prompt;

pub use extractor::{ExtractionOutcome, NewsletterIdentity, SponsorExtractor};
