//! Fallback scraper reading `citation_*` and Dublin Core meta tags.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::path::Path;
use std::sync::Arc;

use super::{PayloadKinds, PdfScraper, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{set_if_present, Draft, Payload, WebContent};
use crate::utils::HttpClient;

const ADS_BASE_URL: &str = "https://ui.adsabs.harvard.edu";

/// Meta names that carry the title; at least one must be present
const TITLE_NAMES: [&str; 2] = ["citation_title", "dc.Title"];

/// Scraper for pages that embed citation metadata in `<meta>` tags
#[derive(Debug, Clone)]
pub struct EmbedScraper {
    http: HttpClient,
    pdf: Arc<PdfScraper>,
}

/// Metadata collected from a page's meta tags
#[derive(Debug, Default)]
struct EmbeddedMeta {
    draft: Draft,
    pdf_url: Option<String>,
}

impl EmbedScraper {
    pub fn new(http: HttpClient, pdf: Arc<PdfScraper>) -> Self {
        Self { http, pdf }
    }

    /// Download the advertised PDF, keeping it only if it looks like a whole PDF
    async fn fetch_pdf(&self, web: &WebContent, url: &str) -> Option<std::path::PathBuf> {
        let url = if web.url.contains("adsabs.harvard.edu") && url.starts_with('/') {
            format!("{}{}", ADS_BASE_URL, url)
        } else {
            url.to_string()
        };

        match self.http.download_pdf(&url, Some(&web.cookies)).await {
            Ok(path) => {
                if is_complete_pdf(&path).await {
                    Some(path)
                } else {
                    tracing::debug!(url = %url, "Embedded PDF link did not return a PDF");
                    None
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Failed to download embedded PDF");
                None
            }
        }
    }
}

#[async_trait]
impl Scraper for EmbedScraper {
    fn id(&self) -> &str {
        "webcontent-embed"
    }

    fn name(&self) -> &str {
        "Embedded Metadata"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::WEBCONTENT
    }

    fn validate(&self, payload: &Payload) -> bool {
        let Some(web) = payload.as_web() else {
            return false;
        };
        if !(web.url.starts_with("http://") || web.url.starts_with("https://")) {
            return false;
        }
        meta_tags(web.document())
            .iter()
            .any(|(name, _)| TITLE_NAMES.contains(&name.as_str()))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        let Some(web) = payload.as_web().filter(|_| self.validate(payload)) else {
            return Ok(Vec::new());
        };

        let EmbeddedMeta { mut draft, pdf_url } = read_meta(web.document());

        if options.download_pdf {
            if let Some(url) = pdf_url {
                if let Some(path) = self.fetch_pdf(web, &url).await {
                    draft.main_url = Some(path.to_string_lossy().into_owned());
                    if !draft.has_title() {
                        let parsed = self
                            .pdf
                            .scrape_path(&path, &path.to_string_lossy(), options)
                            .await?;
                        draft.title = parsed.title;
                    }
                }
            }
        }

        Ok(vec![draft])
    }
}

/// All `(name, content)` pairs of the page's meta tags
fn meta_tags(document: &str) -> Vec<(String, String)> {
    let Ok(selector) = Selector::parse("meta[name]") else {
        return Vec::new();
    };
    let html = Html::parse_document(document);
    html.select(&selector)
        .filter_map(|meta| {
            let name = meta.value().attr("name")?;
            let content = meta.value().attr("content").unwrap_or("");
            Some((name.to_string(), content.to_string()))
        })
        .collect()
}

fn read_meta(document: &str) -> EmbeddedMeta {
    let mut meta = EmbeddedMeta::default();
    let mut authors = Vec::new();

    for (name, content) in meta_tags(document) {
        match name.as_str() {
            "citation_title" | "dc.Title" => set_if_present(&mut meta.draft.title, &content),
            "citation_author" | "dc.Creator" => {
                let author = content.trim();
                if !author.is_empty() {
                    authors.push(author.to_string());
                }
            }
            "citation_publication_date" | "dc.Date" => {
                let year = content.split('/').next().unwrap_or("");
                set_if_present(&mut meta.draft.pub_time, year);
            }
            "citation_doi" | "dc.Identifier" => set_if_present(&mut meta.draft.doi, &content),
            "citation_journal_title" | "citation_conference_title" => {
                set_if_present(&mut meta.draft.publication, &content)
            }
            "citation_pdf_url" if !content.trim().is_empty() => {
                meta.pdf_url = Some(content.trim().to_string())
            }
            _ => {}
        }
    }

    if !authors.is_empty() {
        meta.draft.authors = Some(authors.join(", "));
    }
    meta
}

/// Starts with the PDF magic and ends with an EOF marker
async fn is_complete_pdf(path: &Path) -> bool {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let tail = &bytes[bytes.len().saturating_sub(5)..];
            bytes.starts_with(b"%PDF-") && tail.windows(3).any(|w| w == b"EOF")
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::MockRecognizer;

    const PAGE: &str = r#"<html><head>
<meta name="citation_title" content="Attention Is All You Need">
<meta name="citation_author" content="Ashish Vaswani">
<meta name="citation_author" content=" Noam Shazeer ">
<meta name="citation_publication_date" content="2017/06/12">
<meta name="citation_doi" content="10.5555/3295222.3295349">
<meta name="citation_pdf_url" content="PDF_URL">
</head><body></body></html>"#;

    fn scraper(dir: &Path) -> EmbedScraper {
        let pdf = Arc::new(PdfScraper::new(Arc::new(MockRecognizer::new()), None));
        EmbedScraper::new(HttpClient::new(dir).unwrap(), pdf)
    }

    #[tokio::test]
    async fn test_reads_meta_without_download() {
        let dir = tempfile::tempdir().unwrap();
        let payload = Payload::web("https://papers.example.org/abs/1", PAGE);
        let scraper = scraper(dir.path());
        assert!(scraper.validate(&payload));

        let drafts = scraper.scrape(&payload, &ScrapeOptions::default()).await.unwrap();
        assert_eq!(drafts.len(), 1);
        let d = &drafts[0];
        assert_eq!(d.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(d.authors.as_deref(), Some("Ashish Vaswani, Noam Shazeer"));
        assert_eq!(d.pub_time.as_deref(), Some("2017"));
        assert_eq!(d.doi.as_deref(), Some("10.5555/3295222.3295349"));
        assert_eq!(d.main_url, None);
    }

    #[tokio::test]
    async fn test_downloads_pdf_when_asked() {
        let mut server = mockito::Server::new_async().await;
        let good = server
            .mock("GET", "/good.pdf")
            .with_status(200)
            .with_body("%PDF-1.4\n...\n%%EOF")
            .create_async()
            .await;
        let _bad = server
            .mock("GET", "/login.pdf")
            .with_status(200)
            .with_body("<html>please sign in</html>")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let scraper = scraper(dir.path());
        let options = ScrapeOptions {
            download_pdf: true,
            ..ScrapeOptions::default()
        };

        let page = PAGE.replace("PDF_URL", &format!("{}/good.pdf", server.url()));
        let drafts = scraper
            .scrape(&Payload::web("https://papers.example.org/abs/1", page), &options)
            .await
            .unwrap();
        good.assert_async().await;
        let main_url = std::path::Path::new(drafts[0].main_url.as_deref().unwrap());
        assert_eq!(main_url.parent(), Some(dir.path()));
        assert!(main_url.file_name().unwrap().to_string_lossy().starts_with("good-"));

        let page = PAGE.replace("PDF_URL", &format!("{}/login.pdf", server.url()));
        let drafts = scraper
            .scrape(&Payload::web("https://papers.example.org/abs/2", page), &options)
            .await
            .unwrap();
        assert_eq!(drafts[0].main_url, None);
        assert!(drafts[0].has_title());
    }

    #[tokio::test]
    async fn test_rejects_pages_without_title_meta() {
        let dir = tempfile::tempdir().unwrap();
        let scraper = scraper(dir.path());
        for payload in [
            Payload::web("https://example.com", "<html><head><meta name=\"author\" content=\"x\"></head></html>"),
            Payload::web("ftp://example.com", PAGE),
            Payload::file("/tmp/paper.pdf"),
        ] {
            assert!(!scraper.validate(&payload));
            assert!(scraper
                .scrape(&payload, &ScrapeOptions::default())
                .await
                .unwrap()
                .is_empty());
        }
    }

    #[test]
    fn test_dublin_core() {
        let meta = read_meta(
            r#"<meta name="dc.Title" content="A DC Paper"><meta name="dc.Creator" content="Jane Roe"><meta name="dc.Date" content="2020">"#,
        );
        assert_eq!(meta.draft.title.as_deref(), Some("A DC Paper"));
        assert_eq!(meta.draft.authors.as_deref(), Some("Jane Roe"));
        assert_eq!(meta.draft.pub_time.as_deref(), Some("2020"));
        assert_eq!(meta.pdf_url, None);
    }
}
