//! # Entry Scrape
//!
//! Turns heterogeneous inputs (PDF files, BibTeX and CSV exports, captured
//! web pages, pre-built records) into draft bibliographic entries.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (Draft, Payload, RecognitionDocument)
//! - [`scrapers`]: Entry scrapers with a trait-based plugin architecture and
//!   the two-tier registry
//! - [`pdf`]: Local PDF tokenizer, title/identifier heuristics and the remote
//!   recognition client
//! - [`service`]: Batch runner over many payloads
//! - [`utils`]: HTTP client, resource cache, and text helpers
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use entry_scrape::{config::Config, EntryScrapeService, Payload};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let service = EntryScrapeService::new(&Config::default())?;
//! let drafts = service
//!     .scrape(vec![Payload::file("/papers/attention.pdf")])
//!     .await;
//! for draft in &drafts {
//!     println!("{}", draft.title.as_deref().unwrap_or("(untitled)"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod models;
pub mod pdf;
pub mod scrapers;
pub mod service;
pub mod utils;

// Re-export commonly used types
pub use models::{Draft, Payload};
pub use scrapers::{ScrapeError, Scraper, ScraperRegistry};
pub use service::EntryScrapeService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
