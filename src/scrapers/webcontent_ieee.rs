//! IEEE Xplore document pages.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::path::Path;
use std::sync::Arc;

use super::{PayloadKinds, PdfScraper, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{set_if_present, Draft, Payload};
use crate::utils::HttpClient;

const IEEE_BASE_URL: &str = "https://ieeexplore.ieee.org";

static IEEE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://ieeexplore\.ieee\.org/document").unwrap());
static FIRST_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#""firstName":"(.*?)","#).unwrap());
static LAST_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r#""lastName":"(.*?)","#).unwrap());

/// Scraper for IEEE Xplore pages, reading the metadata object the page embeds
#[derive(Debug, Clone)]
pub struct IeeeScraper {
    http: HttpClient,
    pdf: Arc<PdfScraper>,
    base_url: String,
}

/// What the page tells us before any network access
#[derive(Debug, Default)]
struct PageMetadata {
    script: String,
    has_pdf_button: bool,
}

impl IeeeScraper {
    pub fn new(http: HttpClient, pdf: Arc<PdfScraper>) -> Self {
        Self {
            http,
            pdf,
            base_url: IEEE_BASE_URL.to_string(),
        }
    }

    /// Download PDFs from another host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn page_metadata(document: &str) -> Option<PageMetadata> {
    let html = Html::parse_document(document);
    let scripts = Selector::parse("script").ok()?;
    let script = html
        .select(&scripts)
        .map(|s| s.text().collect::<String>())
        .find(|text| text.contains("xplGlobal.document.metadata"))?;

    let has_pdf_button = Selector::parse(".pdf-btn-link")
        .map(|s| html.select(&s).next().is_some())
        .unwrap_or(false);

    Some(PageMetadata {
        script,
        has_pdf_button,
    })
}

/// First `"key":"value",` in the metadata script
fn json_field(script: &str, key: &str) -> Option<String> {
    let pattern = format!(r#""{}":"(.*?)","#, regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    re.captures(script)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn metadata_to_draft(script: &str) -> Draft {
    let mut draft = Draft::new();
    for (key, slot) in [
        ("title", &mut draft.title),
        ("publicationTitle", &mut draft.publication),
        ("doi", &mut draft.doi),
        ("publicationYear", &mut draft.pub_time),
    ] {
        if let Some(value) = json_field(script, key) {
            set_if_present(slot, &value);
        }
    }

    let firsts = FIRST_NAME.captures_iter(script).filter_map(|c| c.get(1));
    let lasts = LAST_NAME.captures_iter(script).filter_map(|c| c.get(1));
    let authors: Vec<String> = firsts
        .zip(lasts)
        .map(|(first, last)| format!("{} {}", first.as_str(), last.as_str()).trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    if !authors.is_empty() {
        draft.authors = Some(authors.join(", "));
    }
    draft
}

#[async_trait]
impl Scraper for IeeeScraper {
    fn id(&self) -> &str {
        "webcontent-ieee"
    }

    fn name(&self) -> &str {
        "IEEE Xplore"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::WEBCONTENT
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload
            .as_web()
            .is_some_and(|w| w.document.is_some() && IEEE_URL.is_match(&w.url))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        let Some(web) = payload.as_web().filter(|_| self.validate(payload)) else {
            return Ok(Vec::new());
        };
        let Some(page) = page_metadata(web.document()) else {
            tracing::debug!(url = %web.url, "IEEE page carries no document metadata");
            return Ok(Vec::new());
        };

        let mut draft = metadata_to_draft(&page.script);

        if !options.download_pdf {
            draft.note = Some(format!("<md>\n[URL]({})", web.url));
            return Ok(vec![draft]);
        }

        match json_field(&page.script, "pdfPath") {
            Some(pdf_path) if page.has_pdf_button => {
                let url = format!("{}{}", self.base_url, pdf_path.replacen("iel7", "ielx7", 1));
                match self.http.download_pdf(&url, Some(&web.cookies)).await {
                    Ok(path) => {
                        let path = path.to_string_lossy().into_owned();
                        if !draft.has_title() {
                            let parsed = self.pdf.scrape_path(Path::new(&path), &path, options).await?;
                            draft.title = parsed.title;
                        }
                        draft.main_url = Some(path);
                    }
                    Err(e) => {
                        tracing::error!(url = %url, error = %e, "Failed to download PDF from IEEE");
                    }
                }
            }
            _ => tracing::debug!(url = %web.url, "No accessible IEEE PDF"),
        }

        Ok(vec![draft])
    }
}
