//! PDF metadata extraction.
//!
//! - [`LopdfRecognizer`] turns a file into a [`RecognitionDocument`](crate::models::RecognitionDocument)
//! - [`ZoteroRecognizer`] asks the remote recognizer about that document
//! - [`extract_layout`] recovers title, arXiv id and DOI locally

mod cmap;
mod fonts;
mod identifiers;
mod layout;
mod recognizer;
mod remote;

pub use identifiers::{extract_arxiv, extract_doi};
pub use layout::{extract_layout, is_cjk, page_fulltext, select_title, LayoutExtraction};
pub use recognizer::{DocumentRecognizer, LopdfRecognizer};
pub use remote::{wire_body, RemoteAuthor, RemoteMetadata, RemoteRecognizer, ZoteroRecognizer};
