//! Google Scholar result entries.
//!
//! A result either links a PDF directly, which is downloaded and parsed, or
//! its metadata is taken from the BibTeX export behind the "Cite" dialog.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::Arc;

use super::bibtex::parse_bibtex;
use super::{PayloadKinds, PdfScraper, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{Draft, Payload, WebContent};
use crate::utils::HttpClient;

const GOOGLE_SCHOLAR_URL: &str = "https://scholar.google.com";

static SCHOLAR_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://scholar\.google\.").unwrap());

/// Scraper for a Google Scholar search result
#[derive(Debug, Clone)]
pub struct GoogleScholarScraper {
    http: HttpClient,
    pdf: Arc<PdfScraper>,
    base_url: String,
}

/// What a result entry links to
#[derive(Debug, Default, PartialEq, Eq)]
struct ResultLinks {
    pdf_url: Option<String>,
    data_aid: Option<String>,
}

impl GoogleScholarScraper {
    pub fn new(http: HttpClient, pdf: Arc<PdfScraper>) -> Self {
        Self {
            http,
            pdf,
            base_url: GOOGLE_SCHOLAR_URL.to_string(),
        }
    }

    /// Query another Scholar host for citations
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the entry's BibTeX through the cite dialog
    async fn cite_bibtex(&self, web: &WebContent, data_aid: &str) -> Result<Option<Draft>, ScrapeError> {
        let cite_url = format!(
            "{}/scholar?q=info:{}:scholar.google.com/&output=cite&scirp=1&hl=en",
            self.base_url, data_aid
        );
        let dialog = self.http.get_text(&cite_url, Some(&web.cookies)).await?;
        let Some(bibtex_url) = bibtex_link(&dialog) else {
            tracing::debug!(url = %web.url, "Cite dialog has no BibTeX link");
            return Ok(None);
        };

        let bibtex = self.http.get_text(&bibtex_url, Some(&web.cookies)).await?;
        Ok(parse_bibtex(&bibtex).into_iter().next())
    }
}

/// The PDF link and citation id of a result entry
fn result_links(document: &str) -> ResultLinks {
    let html = Html::parse_fragment(document);
    let mut links = ResultLinks::default();

    if let Ok(selector) = Selector::parse(".gs_or_ggsm a[href]") {
        links.pdf_url = html
            .select(&selector)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string);
    }
    if let Ok(selector) = Selector::parse("[data-aid]") {
        links.data_aid = html
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("data-aid"))
            .filter(|aid| !aid.is_empty())
            .map(str::to_string);
    }
    links
}

/// The BibTeX export link in a cite dialog
fn bibtex_link(dialog: &str) -> Option<String> {
    let html = Html::parse_document(dialog);
    let selector = Selector::parse("a.gs_citi, #gs_citi a").ok()?;
    let links: Vec<_> = html.select(&selector).collect();
    links
        .iter()
        .find(|a| a.text().collect::<String>().trim().eq_ignore_ascii_case("bibtex"))
        .or_else(|| links.first())
        .and_then(|a| a.value().attr("href"))
        .map(|href| href.replace("&amp;", "&"))
}

#[async_trait]
impl Scraper for GoogleScholarScraper {
    fn id(&self) -> &str {
        "webcontent-googlescholar"
    }

    fn name(&self) -> &str {
        "Google Scholar"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::WEBCONTENT
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload
            .as_web()
            .is_some_and(|w| w.document.is_some() && SCHOLAR_URL.is_match(&w.url))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        let Some(web) = payload.as_web().filter(|_| self.validate(payload)) else {
            return Ok(Vec::new());
        };

        let links = result_links(web.document());
        let mut main_url = None;

        if let Some(pdf_url) = &links.pdf_url {
            let parsed = match self.http.download_pdf(pdf_url, Some(&web.cookies)).await {
                Ok(path) => {
                    self.pdf
                        .scrape_path(&path, &path.to_string_lossy(), options)
                        .await
                }
                Err(e) => Err(e),
            };
            match parsed {
                Ok(draft) if draft.has_title() => return Ok(vec![draft]),
                Ok(draft) => main_url = draft.main_url,
                Err(e) => {
                    tracing::warn!(url = %pdf_url, error = %e, "Could not use Scholar PDF link");
                }
            }
        }

        let Some(data_aid) = links.data_aid else {
            return Ok(Vec::new());
        };
        match self.cite_bibtex(web, &data_aid).await? {
            Some(mut draft) => {
                if main_url.is_some() {
                    draft.main_url = main_url;
                }
                Ok(vec![draft])
            }
            None => Ok(Vec::new()),
        }
    }
}
