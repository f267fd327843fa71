//! arXiv abstract and PDF pages.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::{PayloadKinds, PdfScraper, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{Draft, Payload};
use crate::utils::HttpClient;

const ARXIV_PDF_BASE: &str = "https://arxiv.org/pdf";

static ARXIV_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://([^\.]+\.)?(arxiv\.org|xxx\.lanl\.gov)/(/\w|abs/|pdf/)").unwrap()
});

/// Downloads the paper's PDF from arXiv and parses it
#[derive(Debug, Clone)]
pub struct ArxivScraper {
    http: HttpClient,
    pdf: Arc<PdfScraper>,
    pdf_base: String,
}

impl ArxivScraper {
    pub fn new(http: HttpClient, pdf: Arc<PdfScraper>) -> Self {
        Self {
            http,
            pdf,
            pdf_base: ARXIV_PDF_BASE.to_string(),
        }
    }

    /// Fetch PDFs from another host
    pub fn with_pdf_base(mut self, base: impl Into<String>) -> Self {
        self.pdf_base = base.into();
        self
    }
}

/// The paper id of an arXiv `abs/` or `pdf/` URL
fn paper_id(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let (_, rest) = path
        .split_once("/abs/")
        .or_else(|| path.split_once("/pdf/"))?;
    let id = rest.trim_end_matches('/');
    let id = id.strip_suffix(".pdf").unwrap_or(id);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[async_trait]
impl Scraper for ArxivScraper {
    fn id(&self) -> &str {
        "webcontent-arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::WEBCONTENT
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload.as_web().is_some_and(|w| ARXIV_URL.is_match(&w.url))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        let Some(web) = payload.as_web().filter(|_| self.validate(payload)) else {
            return Ok(Vec::new());
        };
        let Some(id) = paper_id(&web.url) else {
            tracing::debug!(url = %web.url, "No arXiv id in URL");
            return Ok(Vec::new());
        };

        let url = format!("{}/{}.pdf", self.pdf_base, id);
        let path = self.http.download_pdf(&url, None).await?;
        let mut draft = self
            .pdf
            .scrape_path(&path, &path.to_string_lossy(), options)
            .await?;
        draft.arxiv = Some(id);
        Ok(vec![draft])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::MockRecognizer;

    #[test]
    fn test_paper_id() {
        assert_eq!(paper_id("https://arxiv.org/abs/1706.03762").as_deref(), Some("1706.03762"));
        assert_eq!(
            paper_id("https://arxiv.org/pdf/1706.03762v5.pdf").as_deref(),
            Some("1706.03762v5")
        );
        assert_eq!(
            paper_id("https://export.arxiv.org/abs/hep-th/9901001?context=x").as_deref(),
            Some("hep-th/9901001")
        );
        assert_eq!(paper_id("https://arxiv.org/abs/"), None);
    }

    #[tokio::test]
    async fn test_scrape_downloads_pdf() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/pdf/1706.03762.pdf")
            .with_status(200)
            .with_body("%PDF-1.5")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let recognizer = MockRecognizer::new().with_line("Attention Is All You Need", 17.0);
        let pdf = Arc::new(PdfScraper::new(Arc::new(recognizer), None));
        let scraper = ArxivScraper::new(HttpClient::new(dir.path()).unwrap(), pdf)
            .with_pdf_base(format!("{}/pdf", server.url()));

        let payload = Payload::web("https://arxiv.org/abs/1706.03762", "<html></html>");
        assert!(scraper.validate(&payload));
        let drafts = scraper.scrape(&payload, &ScrapeOptions::default()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(drafts[0].arxiv.as_deref(), Some("1706.03762"));
    }

    #[tokio::test]
    async fn test_rejects_other_sites() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = Arc::new(PdfScraper::new(Arc::new(MockRecognizer::new()), None));
        let scraper = ArxivScraper::new(HttpClient::new(dir.path()).unwrap(), pdf);
        for payload in [
            Payload::web("https://arxiv.org/list/cs.CL/recent", ""),
            Payload::web("https://example.com/abs/1706.03762", ""),
            Payload::file("/tmp/1706.03762.pdf"),
        ] {
            assert!(!scraper.validate(&payload));
            assert!(scraper
                .scrape(&payload, &ScrapeOptions::default())
                .await
                .unwrap()
                .is_empty());
        }
    }
}
