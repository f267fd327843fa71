//! Utility modules supporting the scrapers.
//!
//! - [`HttpClient`]: shared HTTP client with cookie forwarding and PDF downloads
//! - [`ResourceCache`]: memoized font/CMap resources for the PDF tokenizer
//! - [`html_to_text`]: flatten an HTML fragment to plain text
//!
//! # Downloading a PDF
//!
//! ```rust,no_run
//! use entry_scrape::utils::HttpClient;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(std::env::temp_dir())?;
//! let path = client
//!     .download_pdf("https://arxiv.org/pdf/1706.03762.pdf", None)
//!     .await?;
//! println!("saved to {}", path.display());
//! # Ok(())
//! # }
//! ```

mod http;
mod resource_cache;
mod text;

pub use http::HttpClient;
pub use resource_cache::ResourceCache;
pub use text::{collapse_whitespace, html_to_text};
