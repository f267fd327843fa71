//! Client for the remote metadata recognizer.
//!
//! The request body mirrors the recognizer's compact wire format:
//!
//! ```text
//! { "fileName": "...", "totalPages": N,
//!   "pages": [ [width, height, [ [ [ line, line, ... ] ] ]] ] }
//! ```
//!
//! where each line is an array of words and each word a positional array
//! `[xMin, yMin, xMax, yMax, fontSize, spaceAfter, baseline, rotated,
//! underlined, bold, italic, color, font, text]`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

use crate::models::{set_if_present, Draft, Page, RecognitionDocument, Word};
use crate::scrapers::ScrapeError;
use crate::utils::HttpClient;

/// An author as returned by the recognizer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAuthor {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RemoteAuthor {
    /// "First Last"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Metadata recognized by the remote service; absent fields are unknown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<Vec<RemoteAuthor>>,
    #[serde(default)]
    pub arxiv: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
}

impl RemoteMetadata {
    /// Copy every known field onto the draft
    pub fn apply_to(&self, draft: &mut Draft) {
        if let Some(title) = &self.title {
            set_if_present(&mut draft.title, title);
        }
        if let Some(authors) = &self.authors {
            let names: Vec<String> = authors
                .iter()
                .map(RemoteAuthor::display_name)
                .filter(|n| !n.is_empty())
                .collect();
            set_if_present(&mut draft.authors, &names.join(", "));
        }
        if let Some(arxiv) = &self.arxiv {
            set_if_present(&mut draft.arxiv, arxiv);
        }
        if let Some(doi) = &self.doi {
            set_if_present(&mut draft.doi, doi);
        }
    }
}

/// A remote service that recognizes paper metadata from page geometry
#[async_trait]
pub trait RemoteRecognizer: Send + Sync + std::fmt::Debug {
    async fn recognize(&self, document: &RecognitionDocument)
        -> Result<RemoteMetadata, ScrapeError>;
}

/// Client for the Zotero recognizer service
#[derive(Debug, Clone)]
pub struct ZoteroRecognizer {
    http: HttpClient,
    endpoint: String,
    timeout: Duration,
}

impl ZoteroRecognizer {
    pub fn new(http: HttpClient, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RemoteRecognizer for ZoteroRecognizer {
    async fn recognize(
        &self,
        document: &RecognitionDocument,
    ) -> Result<RemoteMetadata, ScrapeError> {
        let body = wire_body(document);

        let response = self
            .http
            .client()
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScrapeError::Remote(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Remote(format!(
                "recognizer returned HTTP {}",
                status
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ScrapeError::Remote(e.to_string()))?;
        serde_json::from_str(&text)
            .map_err(|e| ScrapeError::Remote(format!("malformed recognizer response: {}", e)))
    }
}

/// Encode a document in the recognizer's wire format
pub fn wire_body(document: &RecognitionDocument) -> Value {
    json!({
        "fileName": document.file_name,
        "totalPages": document.total_pages,
        "pages": document.pages.iter().map(wire_page).collect::<Vec<_>>(),
    })
}

fn wire_page(page: &Page) -> Value {
    let blocks: Vec<Value> = page
        .blocks
        .iter()
        .map(|block| {
            let lines: Vec<Value> = block
                .lines
                .iter()
                .map(|line| Value::Array(line.words.iter().map(wire_word).collect()))
                .collect();
            json!([lines])
        })
        .collect();
    json!([page.width, page.height, blocks])
}

fn wire_word(word: &Word) -> Value {
    json!([
        word.x_min,
        word.y_min,
        word.x_max,
        word.y_max,
        word.font_size,
        word.space_after,
        word.baseline,
        u8::from(word.rotated),
        0,
        0,
        0,
        0,
        word.font_index,
        word.text,
    ])
}
