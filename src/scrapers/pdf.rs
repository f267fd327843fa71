//! PDF scraper: remote recognition first, then the local layout heuristic.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use super::{PayloadKinds, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{Draft, FileKind, Payload};
use crate::pdf::{extract_layout, DocumentRecognizer, RemoteRecognizer};

/// Scraper for local PDF files
#[derive(Debug, Clone)]
pub struct PdfScraper {
    recognizer: Arc<dyn DocumentRecognizer>,
    remote: Option<Arc<dyn RemoteRecognizer>>,
}

impl PdfScraper {
    pub fn new(
        recognizer: Arc<dyn DocumentRecognizer>,
        remote: Option<Arc<dyn RemoteRecognizer>>,
    ) -> Self {
        Self { recognizer, remote }
    }

    /// Build a draft from the PDF at `path`, recording `main_url` as its main file.
    ///
    /// Web scrapers call this after downloading a PDF.
    pub async fn scrape_path(
        &self,
        path: &Path,
        main_url: &str,
        options: &ScrapeOptions,
    ) -> Result<Draft, ScrapeError> {
        let document = self
            .recognizer
            .recognize(path, options.recognition_pages)
            .await?;

        let mut draft = Draft::new();

        if !options.local_pdf_parse {
            if let Some(remote) = &self.remote {
                match remote.recognize(&document).await {
                    Ok(metadata) => metadata.apply_to(&mut draft),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Remote recognition failed, using local layout"
                        );
                    }
                }
            }
        }

        if !draft.has_title() {
            let layout = extract_layout(&document);
            draft.title = layout.title;
            if draft.arxiv.is_none() {
                draft.arxiv = layout.arxiv;
            }
            if draft.doi.is_none() {
                draft.doi = layout.doi;
            }
        }

        draft.main_url = Some(main_url.to_string());
        Ok(draft)
    }
}

#[async_trait]
impl Scraper for PdfScraper {
    fn id(&self) -> &str {
        "pdf"
    }

    fn name(&self) -> &str {
        "PDF"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::FILE
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload
            .as_file()
            .is_some_and(|f| f.is_local_kind(&FileKind::Pdf))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        if !self.validate(payload) {
            return Ok(Vec::new());
        }
        let Some(file) = payload.as_file() else {
            return Ok(Vec::new());
        };

        let draft = self
            .scrape_path(&file.local_path(), &file.url, options)
            .await?;
        Ok(vec![draft])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Block, Line, Page, RecognitionDocument, Word};
    use crate::pdf::{RemoteAuthor, RemoteMetadata};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn word(text: &str, size: f32, y: f32) -> Word {
        Word {
            text: text.to_string(),
            font_size: size,
            space_after: 1,
            rotated: false,
            font_index: 0,
            x_min: 72.0,
            y_min: y - size,
            x_max: 72.0 + 5.0 * text.len() as f32,
            y_max: y,
            baseline: y,
        }
    }

    fn line(text: &str, size: f32, y: f32) -> Line {
        Line {
            words: text.split(' ').map(|w| word(w, size, y)).collect(),
        }
    }

    #[derive(Debug)]
    struct FixedRecognizer(RecognitionDocument);

    #[async_trait]
    impl DocumentRecognizer for FixedRecognizer {
        async fn recognize(
            &self,
            _path: &Path,
            _max_pages: usize,
        ) -> Result<RecognitionDocument, ScrapeError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Debug, Default)]
    struct FakeRemote {
        fail: bool,
        doi_only: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteRecognizer for FakeRemote {
        async fn recognize(
            &self,
            _document: &RecognitionDocument,
        ) -> Result<RemoteMetadata, ScrapeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScrapeError::Remote("timed out".into()));
            }
            if self.doi_only {
                return Ok(RemoteMetadata {
                    doi: Some("10.1000/remote".into()),
                    ..Default::default()
                });
            }
            Ok(RemoteMetadata {
                title: Some("Remote Title".into()),
                authors: Some(vec![RemoteAuthor {
                    first_name: "Ada".into(),
                    last_name: "Lovelace".into(),
                }]),
                arxiv: None,
                doi: Some("10.1000/remote".into()),
            })
        }
    }

    fn document() -> RecognitionDocument {
        RecognitionDocument {
            file_name: "paper.pdf".into(),
            total_pages: 1,
            pages: vec![Page {
                width: 612.0,
                height: 792.0,
                blocks: vec![Block {
                    lines: vec![
                        line("arXiv:1706.03762v5 [cs.CL] 6 Dec 2017", 8.0, 40.0),
                        line("Attention Is All You Need", 17.0, 100.0),
                        line("Ashish Vaswani Noam Shazeer", 10.0, 130.0),
                        line("doi 10.1000/xyz123.", 9.0, 160.0),
                    ],
                }],
            }],
        }
    }

    fn scraper(remote: Option<Arc<FakeRemote>>) -> PdfScraper {
        PdfScraper::new(
            Arc::new(FixedRecognizer(document())),
            remote.map(|r| r as Arc<dyn RemoteRecognizer>),
        )
    }

    fn remote_options() -> ScrapeOptions {
        ScrapeOptions {
            local_pdf_parse: false,
            ..ScrapeOptions::default()
        }
    }

    #[tokio::test]
    async fn test_local_heuristic() {
        let drafts = scraper(None)
            .scrape(&Payload::file("/tmp/paper.pdf"), &ScrapeOptions::default())
            .await
            .unwrap();

        assert_eq!(drafts.len(), 1);
        let draft = &drafts[0];
        assert_eq!(draft.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(draft.arxiv.as_deref(), Some("1706.03762v5"));
        assert_eq!(draft.doi.as_deref(), Some("10.1000/xyz123"));
        assert_eq!(draft.main_url.as_deref(), Some("/tmp/paper.pdf"));
        assert_eq!(draft.authors, None);
    }

    #[tokio::test]
    async fn test_remote_skipped_when_parsing_locally() {
        let remote = Arc::new(FakeRemote::default());
        scraper(Some(Arc::clone(&remote)))
            .scrape(&Payload::file("/tmp/paper.pdf"), &ScrapeOptions::default())
            .await
            .unwrap();
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_result_wins() {
        let remote = Arc::new(FakeRemote::default());
        let drafts = scraper(Some(Arc::clone(&remote)))
            .scrape(&Payload::file("/tmp/paper.pdf"), &remote_options())
            .await
            .unwrap();

        let draft = &drafts[0];
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(draft.title.as_deref(), Some("Remote Title"));
        assert_eq!(draft.authors.as_deref(), Some("Ada Lovelace"));
        assert_eq!(draft.doi.as_deref(), Some("10.1000/remote"));
        // title was found remotely, so the local pass never runs
        assert_eq!(draft.arxiv, None);
    }

    #[tokio::test]
    async fn test_local_pass_keeps_remote_doi() {
        let remote = Arc::new(FakeRemote {
            doi_only: true,
            ..Default::default()
        });
        let drafts = scraper(Some(Arc::clone(&remote)))
            .scrape(&Payload::file("/tmp/paper.pdf"), &remote_options())
            .await
            .unwrap();

        let draft = &drafts[0];
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(draft.doi.as_deref(), Some("10.1000/remote"));
        assert_eq!(draft.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(draft.arxiv.as_deref(), Some("1706.03762v5"));
        assert_eq!(draft.authors, None);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back() {
        let remote = Arc::new(FakeRemote {
            fail: true,
            ..Default::default()
        });
        let drafts = scraper(Some(Arc::clone(&remote)))
            .scrape(&Payload::file("/tmp/paper.pdf"), &remote_options())
            .await
            .unwrap();

        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(drafts[0].title.as_deref(), Some("Attention Is All You Need"));
    }

    #[tokio::test]
    async fn test_rejects_other_payloads() {
        let scraper = scraper(None);
        for payload in [
            Payload::file("/tmp/refs.bib"),
            Payload::file("https://example.com/paper.pdf"),
            Payload::web("https://example.com/paper.pdf", ""),
        ] {
            assert!(!scraper.validate(&payload));
            let drafts = scraper.scrape(&payload, &ScrapeOptions::default()).await.unwrap();
            assert!(drafts.is_empty());
        }
        assert!(scraper.validate(&Payload::file("file:///tmp/Paper.PDF")));
    }
}
