//! Entry scrapers with a trait-based plugin architecture.
//!
//! This module defines the [`Scraper`] trait that every extractor implements.
//! A scraper decides with [`Scraper::validate`] whether a payload is something
//! it understands, and turns it into zero or more [`Draft`]s with
//! [`Scraper::scrape`]. The [`ScraperRegistry`] runs every scraper of a tier
//! against a payload and concatenates what they find.
//!
//! # Tiers
//!
//! | tier     | scrapers (registration order) |
//! |----------|-------------------------------|
//! | primary  | `pdf`, `bibtex`, `paperentity`, `zoterocsv`, `paperlibcsv`, `webcontent-arxiv`, `webcontent-googlescholar`, `webcontent-ieee`, `webcontent-cnki`, `webcontent-acm` |
//! | fallback | `webcontent-pdfurl`, `webcontent-embed` |
//!
//! The fallback tier only runs when the primary tier produced nothing for a
//! payload.
//!
//! # Feature Flags
//!
//! - `webcontent` - site-specific HTML scrapers (default: enabled). The two
//!   generic fallback scrapers are always compiled in.

mod bibtex;
mod csv;
mod paper_entity;
mod paperlib_csv;
mod pdf;
mod registry;
mod webcontent_embed;
mod webcontent_pdfurl;
mod zotero_csv;

#[cfg(feature = "webcontent")]
mod webcontent_acm;
#[cfg(feature = "webcontent")]
mod webcontent_arxiv;
#[cfg(feature = "webcontent")]
mod webcontent_cnki;
#[cfg(feature = "webcontent")]
mod webcontent_googlescholar;
#[cfg(feature = "webcontent")]
mod webcontent_ieee;

pub mod mock;

pub use bibtex::BibtexScraper;
pub use mock::{MockRecognizer, MockScraper};
pub use paper_entity::PaperEntityScraper;
pub use paperlib_csv::PaperlibCsvScraper;
pub use pdf::PdfScraper;
pub use registry::{PayloadKinds, ScraperDeps, ScraperKind, ScraperRegistry, Tier};
pub use webcontent_embed::EmbedScraper;
pub use webcontent_pdfurl::PdfUrlScraper;
pub use zotero_csv::ZoteroCsvScraper;

#[cfg(feature = "webcontent")]
pub use webcontent_acm::AcmScraper;
#[cfg(feature = "webcontent")]
pub use webcontent_arxiv::ArxivScraper;
#[cfg(feature = "webcontent")]
pub use webcontent_cnki::CnkiScraper;
#[cfg(feature = "webcontent")]
pub use webcontent_googlescholar::GoogleScholarScraper;
#[cfg(feature = "webcontent")]
pub use webcontent_ieee::IeeeScraper;

use crate::config::ScrapeOptions;
use crate::models::{Draft, Payload};
use async_trait::async_trait;

/// The Scraper trait defines the interface for all entry extractors.
///
/// # Implementing a New Scraper
///
/// 1. Create a struct that implements `Scraper`
/// 2. Make `validate` a cheap, side-effect free check that returns `false`
///    for any payload the scraper cannot handle
/// 3. Start `scrape` by re-checking `validate` and return an empty list when
///    it fails
/// 4. Add a variant to [`ScraperKind`] so the registry builds it
#[async_trait]
pub trait Scraper: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this scraper (used in logs, e.g., "pdf", "bibtex")
    fn id(&self) -> &str;

    /// Human-readable name of this scraper
    fn name(&self) -> &str;

    /// Payload kinds this scraper may accept
    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::all()
    }

    /// Whether this scraper applies to the payload
    fn validate(&self, payload: &Payload) -> bool;

    /// Extract drafts from the payload
    async fn scrape(
        &self,
        payload: &Payload,
        options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError>;
}

/// Errors that can occur while scraping a payload
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Payload shape does not match what the scraper expects
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Remote recognition service failed, timed out, or answered garbage
    #[error("Remote service error: {0}")]
    Remote(String),

    /// Parsing error (CSV, BibTeX, JSON, HTML, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// PDF could not be loaded or tokenized
    #[error("PDF error: {0}")]
    Pdf(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        ScrapeError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ScrapeError {
    fn from(err: serde_json::Error) -> Self {
        ScrapeError::Parse(format!("JSON: {}", err))
    }
}

impl From<lopdf::Error> for ScrapeError {
    fn from(err: lopdf::Error) -> Self {
        ScrapeError::Pdf(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: ScrapeError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, ScrapeError::Parse(ref m) if m.starts_with("JSON")));

        let err: ScrapeError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.to_string().contains("gone"));
    }
}
