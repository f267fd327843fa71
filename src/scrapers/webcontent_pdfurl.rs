//! Fallback scraper treating a web URL ending in `.pdf` as a direct PDF link.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::{PayloadKinds, PdfScraper, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{Draft, Payload};
use crate::utils::HttpClient;

static PDF_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://.+\.pdf$").unwrap());

/// Downloads a linked PDF and hands it to the PDF scraper
#[derive(Debug, Clone)]
pub struct PdfUrlScraper {
    http: HttpClient,
    pdf: Arc<PdfScraper>,
}

impl PdfUrlScraper {
    pub fn new(http: HttpClient, pdf: Arc<PdfScraper>) -> Self {
        Self { http, pdf }
    }
}

#[async_trait]
impl Scraper for PdfUrlScraper {
    fn id(&self) -> &str {
        "webcontent-pdfurl"
    }

    fn name(&self) -> &str {
        "PDF URL"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::WEBCONTENT
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload.as_web().is_some_and(|w| PDF_URL.is_match(&w.url))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        let Some(web) = payload.as_web().filter(|_| self.validate(payload)) else {
            return Ok(Vec::new());
        };

        let path = self.http.download_pdf(&web.url, Some(&web.cookies)).await?;
        let draft = self
            .pdf
            .scrape_path(&path, &path.to_string_lossy(), options)
            .await?;
        Ok(vec![draft])
    }
}
