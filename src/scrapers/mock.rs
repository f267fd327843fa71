//! Mock scraper and PDF recognizer for testing purposes.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::config::ScrapeOptions;
use crate::models::{Block, Draft, DraftBuilder, Line, Page, Payload, RecognitionDocument, Word};
use crate::pdf::DocumentRecognizer;
use crate::scrapers::{ScrapeError, Scraper};

#[derive(Debug, Clone)]
enum Behavior {
    Drafts(Vec<Draft>),
    Fail(String),
    Panic,
}

/// A mock scraper that returns predefined drafts, fails, or panics.
#[derive(Debug)]
pub struct MockScraper {
    id: String,
    behavior: Behavior,
    accept: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockScraper {
    /// Create a mock that accepts every recognized payload and finds nothing.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            behavior: Behavior::Drafts(Vec::new()),
            accept: true,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Return these drafts from every scrape.
    pub fn with_drafts(mut self, drafts: Vec<Draft>) -> Self {
        self.behavior = Behavior::Drafts(drafts);
        self
    }

    /// Return one draft per title.
    pub fn with_titles(self, titles: &[&str]) -> Self {
        let drafts = titles
            .iter()
            .map(|t| DraftBuilder::new().title(*t).build())
            .collect();
        self.with_drafts(drafts)
    }

    /// Sleep before answering.
    pub fn with_delay_ms(mut self, millis: u64) -> Self {
        self.delay = Duration::from_millis(millis);
        self
    }

    /// Fail every scrape with the given message.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.behavior = Behavior::Fail(message.into());
        self
    }

    /// Panic inside every scrape.
    pub fn panicking(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    /// Reject every payload in `validate`.
    pub fn rejecting(mut self) -> Self {
        self.accept = false;
        self
    }

    /// Number of times `scrape` got past validation.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Scraper for MockScraper {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Mock Scraper"
    }

    fn validate(&self, payload: &Payload) -> bool {
        self.accept && !matches!(payload, Payload::Unrecognized { .. })
    }

    async fn scrape(
        &self,
        payload: &Payload,
        _options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        if !self.validate(payload) {
            return Ok(Vec::new());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match &self.behavior {
            Behavior::Drafts(drafts) => Ok(drafts.clone()),
            Behavior::Fail(message) => Err(ScrapeError::Other(message.clone())),
            Behavior::Panic => panic!("mock scraper '{}' panicked", self.id),
        }
    }
}

/// A recognizer that ignores the file and lays out fixed lines, top to bottom.
#[derive(Debug, Default)]
pub struct MockRecognizer {
    lines: Vec<(String, f32)>,
    calls: AtomicUsize,
}

impl MockRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line of text set at `size` points.
    pub fn with_line(mut self, text: impl Into<String>, size: f32) -> Self {
        self.lines.push((text.into(), size));
        self
    }

    /// Number of documents recognized.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn document(&self, file_name: String) -> RecognitionDocument {
        let mut y = 72.0;
        let blocks = self
            .lines
            .iter()
            .map(|(text, size)| {
                y += size * 1.5;
                let mut x = 72.0;
                let words = text
                    .split_whitespace()
                    .map(|w| {
                        let width = w.chars().count() as f32 * size * 0.5;
                        let word = Word {
                            text: w.to_string(),
                            font_size: *size,
                            space_after: 1,
                            rotated: false,
                            font_index: 0,
                            x_min: x,
                            y_min: y - size,
                            x_max: x + width,
                            y_max: y,
                            baseline: y,
                        };
                        x += width + size * 0.25;
                        word
                    })
                    .collect();
                Block {
                    lines: vec![Line { words }],
                }
            })
            .collect();

        RecognitionDocument {
            file_name,
            total_pages: 1,
            pages: vec![Page {
                width: 612.0,
                height: 792.0,
                blocks,
            }],
        }
    }
}

#[async_trait]
impl DocumentRecognizer for MockRecognizer {
    async fn recognize(
        &self,
        path: &Path,
        _max_pages: usize,
    ) -> Result<RecognitionDocument, ScrapeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(self.document(file_name))
    }
}
