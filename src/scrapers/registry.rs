//! Registry and dispatcher for entry scrapers.

use futures_util::future::join_all;
use std::sync::Arc;

use super::{
    BibtexScraper, EmbedScraper, PaperEntityScraper, PaperlibCsvScraper, PdfScraper,
    PdfUrlScraper, ScrapeError, Scraper, ZoteroCsvScraper,
};
#[cfg(feature = "webcontent")]
use super::{AcmScraper, ArxivScraper, CnkiScraper, GoogleScholarScraper, IeeeScraper};
use crate::config::ScrapeOptions;
use crate::models::{Draft, Payload};
use crate::pdf::{DocumentRecognizer, RemoteRecognizer};
use crate::utils::HttpClient;

bitflags::bitflags! {
    /// Payload kinds a scraper can accept
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PayloadKinds: u32 {
        const FILE = 1 << 0;
        const PAPER_ENTITY = 1 << 1;
        const WEBCONTENT = 1 << 2;
    }
}

impl PayloadKinds {
    /// The kind of a decoded payload; empty for unrecognized payloads
    pub fn of(payload: &Payload) -> Self {
        match payload {
            Payload::File(_) => PayloadKinds::FILE,
            Payload::PaperEntity(_) => PayloadKinds::PAPER_ENTITY,
            Payload::WebContent(_) => PayloadKinds::WEBCONTENT,
            Payload::Unrecognized { .. } => PayloadKinds::empty(),
        }
    }
}

/// Priority group of a scraper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Always tried
    Primary,
    /// Tried only when the primary tier found nothing
    Fallback,
}

/// Every built-in scraper, in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperKind {
    Pdf,
    Bibtex,
    PaperEntity,
    ZoteroCsv,
    PaperlibCsv,
    #[cfg(feature = "webcontent")]
    Arxiv,
    #[cfg(feature = "webcontent")]
    GoogleScholar,
    #[cfg(feature = "webcontent")]
    Ieee,
    #[cfg(feature = "webcontent")]
    Cnki,
    #[cfg(feature = "webcontent")]
    Acm,
    PdfUrl,
    Embed,
}

impl ScraperKind {
    /// All compiled-in scrapers; primary tier first, each tier in order
    pub fn all() -> Vec<ScraperKind> {
        let mut kinds = vec![
            ScraperKind::Pdf,
            ScraperKind::Bibtex,
            ScraperKind::PaperEntity,
            ScraperKind::ZoteroCsv,
            ScraperKind::PaperlibCsv,
        ];
        #[cfg(feature = "webcontent")]
        kinds.extend([
            ScraperKind::Arxiv,
            ScraperKind::GoogleScholar,
            ScraperKind::Ieee,
            ScraperKind::Cnki,
            ScraperKind::Acm,
        ]);
        kinds.extend([ScraperKind::PdfUrl, ScraperKind::Embed]);
        kinds
    }

    /// Identifier used in logs
    pub fn id(self) -> &'static str {
        match self {
            ScraperKind::Pdf => "pdf",
            ScraperKind::Bibtex => "bibtex",
            ScraperKind::PaperEntity => "paperentity",
            ScraperKind::ZoteroCsv => "zoterocsv",
            ScraperKind::PaperlibCsv => "paperlibcsv",
            #[cfg(feature = "webcontent")]
            ScraperKind::Arxiv => "webcontent-arxiv",
            #[cfg(feature = "webcontent")]
            ScraperKind::GoogleScholar => "webcontent-googlescholar",
            #[cfg(feature = "webcontent")]
            ScraperKind::Ieee => "webcontent-ieee",
            #[cfg(feature = "webcontent")]
            ScraperKind::Cnki => "webcontent-cnki",
            #[cfg(feature = "webcontent")]
            ScraperKind::Acm => "webcontent-acm",
            ScraperKind::PdfUrl => "webcontent-pdfurl",
            ScraperKind::Embed => "webcontent-embed",
        }
    }

    pub fn tier(self) -> Tier {
        match self {
            ScraperKind::PdfUrl | ScraperKind::Embed => Tier::Fallback,
            _ => Tier::Primary,
        }
    }

    fn build(self, deps: &ScraperDeps, pdf: &Arc<PdfScraper>) -> Arc<dyn Scraper> {
        match self {
            ScraperKind::Pdf => Arc::clone(pdf) as Arc<dyn Scraper>,
            ScraperKind::Bibtex => Arc::new(BibtexScraper::new()),
            ScraperKind::PaperEntity => Arc::new(PaperEntityScraper::new()),
            ScraperKind::ZoteroCsv => Arc::new(ZoteroCsvScraper::new()),
            ScraperKind::PaperlibCsv => Arc::new(PaperlibCsvScraper::new()),
            #[cfg(feature = "webcontent")]
            ScraperKind::Arxiv => Arc::new(ArxivScraper::new(deps.http.clone(), Arc::clone(pdf))),
            #[cfg(feature = "webcontent")]
            ScraperKind::GoogleScholar => Arc::new(GoogleScholarScraper::new(
                deps.http.clone(),
                Arc::clone(pdf),
            )),
            #[cfg(feature = "webcontent")]
            ScraperKind::Ieee => Arc::new(IeeeScraper::new(deps.http.clone(), Arc::clone(pdf))),
            #[cfg(feature = "webcontent")]
            ScraperKind::Cnki => Arc::new(CnkiScraper::new(deps.http.clone())),
            #[cfg(feature = "webcontent")]
            ScraperKind::Acm => Arc::new(AcmScraper::new()),
            ScraperKind::PdfUrl => Arc::new(PdfUrlScraper::new(deps.http.clone(), Arc::clone(pdf))),
            ScraperKind::Embed => Arc::new(EmbedScraper::new(deps.http.clone(), Arc::clone(pdf))),
        }
    }
}

/// Shared collaborators handed to the built-in scrapers
#[derive(Debug, Clone)]
pub struct ScraperDeps {
    pub http: HttpClient,
    pub recognizer: Arc<dyn DocumentRecognizer>,
    pub remote: Option<Arc<dyn RemoteRecognizer>>,
}

/// Registry holding the two scraper tiers
///
/// Scrapers run in parallel, but their results are always concatenated in
/// registration order.
#[derive(Debug, Clone)]
pub struct ScraperRegistry {
    primary: Vec<Arc<dyn Scraper>>,
    fallback: Vec<Arc<dyn Scraper>>,
    defaults: ScrapeOptions,
}

impl ScraperRegistry {
    /// Create a registry with every built-in scraper
    pub fn new(deps: &ScraperDeps, defaults: ScrapeOptions) -> Self {
        let pdf = Arc::new(PdfScraper::new(
            Arc::clone(&deps.recognizer),
            deps.remote.clone(),
        ));

        let mut registry = Self::empty(defaults);
        for kind in ScraperKind::all() {
            registry.register(kind.tier(), kind.build(deps, &pdf));
        }
        registry
    }

    /// Create a registry with no scrapers
    pub fn empty(defaults: ScrapeOptions) -> Self {
        Self {
            primary: Vec::new(),
            fallback: Vec::new(),
            defaults,
        }
    }

    /// Append a scraper to the end of a tier
    pub fn register(&mut self, tier: Tier, scraper: Arc<dyn Scraper>) {
        match tier {
            Tier::Primary => self.primary.push(scraper),
            Tier::Fallback => self.fallback.push(scraper),
        }
    }

    /// Scrapers of one tier, in order
    pub fn tier(&self, tier: Tier) -> &[Arc<dyn Scraper>] {
        match tier {
            Tier::Primary => &self.primary,
            Tier::Fallback => &self.fallback,
        }
    }

    /// Get a scraper by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Scraper>> {
        self.all().find(|s| s.id() == id)
    }

    /// Get all registered scrapers, primary tier first
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Scraper>> {
        self.primary.iter().chain(self.fallback.iter())
    }

    /// Get all scraper IDs, primary tier first
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.all().map(|s| s.id())
    }

    /// Get the number of registered scrapers
    pub fn len(&self) -> usize {
        self.primary.len() + self.fallback.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Default options before per-payload overrides
    pub fn defaults(&self) -> &ScrapeOptions {
        &self.defaults
    }

    /// Run the registry over one payload
    ///
    /// Never fails: a scraper that errors or panics is logged and contributes
    /// nothing.
    pub async fn scrape_payload(&self, payload: Arc<Payload>) -> Vec<Draft> {
        let options = self.defaults.resolve(&payload);

        let drafts = run_tier(&self.primary, &payload, options).await;
        if !drafts.is_empty() {
            return drafts;
        }

        tracing::debug!(payload = %payload.summary(), "Primary scrapers found nothing, trying fallbacks");
        run_tier(&self.fallback, &payload, options).await
    }
}

async fn run_tier(
    scrapers: &[Arc<dyn Scraper>],
    payload: &Arc<Payload>,
    options: ScrapeOptions,
) -> Vec<Draft> {
    let kind = PayloadKinds::of(payload);
    let candidates: Vec<&Arc<dyn Scraper>> = scrapers
        .iter()
        .filter(|s| s.accepts().intersects(kind))
        .collect();

    let tasks = candidates.iter().map(|scraper| {
        let scraper = Arc::clone(scraper);
        let payload = Arc::clone(payload);
        tokio::spawn(async move {
            if !scraper.validate(&payload) {
                return Ok(Vec::new());
            }
            scraper.scrape(&payload, &options).await
        })
    });
    let results = join_all(tasks).await;

    let mut drafts = Vec::new();
    for (scraper, result) in candidates.iter().zip(results) {
        match result {
            Ok(Ok(found)) => {
                if !found.is_empty() {
                    tracing::debug!(scraper = scraper.id(), count = found.len(), "Scraper produced drafts");
                }
                drafts.extend(found);
            }
            Ok(Err(ScrapeError::InvalidPayload(reason))) => {
                tracing::debug!(scraper = scraper.id(), %reason, "Scraper rejected payload");
            }
            Ok(Err(e)) => {
                tracing::error!(
                    scraper = scraper.id(),
                    payload = %payload.summary(),
                    error = %e,
                    "Scraper failed"
                );
            }
            Err(e) => {
                tracing::error!(
                    scraper = scraper.id(),
                    payload = %payload.summary(),
                    error = %e,
                    "Scraper panicked"
                );
            }
        }
    }
    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::MockScraper;

    fn file_payload() -> Arc<Payload> {
        Arc::new(Payload::file("/tmp/paper.pdf"))
    }

    #[test]
    fn test_kind_order_and_tiers() {
        let kinds = ScraperKind::all();
        assert_eq!(kinds.first(), Some(&ScraperKind::Pdf));

        let fallback: Vec<_> = kinds
            .iter()
            .filter(|k| k.tier() == Tier::Fallback)
            .map(|k| k.id())
            .collect();
        assert_eq!(fallback, vec!["webcontent-pdfurl", "webcontent-embed"]);

        // Fallback kinds are listed after every primary kind
        let first_fallback = kinds.iter().position(|k| k.tier() == Tier::Fallback).unwrap();
        assert!(kinds[first_fallback..].iter().all(|k| k.tier() == Tier::Fallback));
    }

    #[test]
    fn test_payload_kinds() {
        assert_eq!(PayloadKinds::of(&Payload::file("a.pdf")), PayloadKinds::FILE);
        let unknown = Payload::Unrecognized {
            kind: "nope".into(),
            value: serde_json::Value::Null,
        };
        assert!(PayloadKinds::of(&unknown).is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_registration_order() {
        let mut registry = ScraperRegistry::empty(ScrapeOptions::default());
        registry.register(
            Tier::Primary,
            Arc::new(MockScraper::new("slow").with_titles(&["a"]).with_delay_ms(50)),
        );
        registry.register(Tier::Primary, Arc::new(MockScraper::new("fast").with_titles(&["b", "c"])));

        let drafts = registry.scrape_payload(file_payload()).await;
        let titles: Vec<_> = drafts.iter().filter_map(|d| d.title.as_deref()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_fallback_only_when_primary_empty() {
        let mut registry = ScraperRegistry::empty(ScrapeOptions::default());
        registry.register(Tier::Primary, Arc::new(MockScraper::new("primary").with_titles(&["p"])));
        registry.register(Tier::Fallback, Arc::new(MockScraper::new("fallback").with_titles(&["f"])));

        let drafts = registry.scrape_payload(file_payload()).await;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title.as_deref(), Some("p"));

        let mut registry = ScraperRegistry::empty(ScrapeOptions::default());
        registry.register(Tier::Primary, Arc::new(MockScraper::new("primary").rejecting()));
        registry.register(Tier::Fallback, Arc::new(MockScraper::new("fallback").with_titles(&["f"])));

        let drafts = registry.scrape_payload(file_payload()).await;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title.as_deref(), Some("f"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let mut registry = ScraperRegistry::empty(ScrapeOptions::default());
        registry.register(Tier::Primary, Arc::new(MockScraper::new("ok").with_titles(&["kept"])));
        registry.register(Tier::Primary, Arc::new(MockScraper::new("err").failing("boom")));
        registry.register(Tier::Primary, Arc::new(MockScraper::new("panic").panicking()));

        let drafts = registry.scrape_payload(file_payload()).await;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_unrecognized_payload_yields_nothing() {
        let mut registry = ScraperRegistry::empty(ScrapeOptions::default());
        registry.register(Tier::Primary, Arc::new(MockScraper::new("any").with_titles(&["x"])));
        registry.register(Tier::Fallback, Arc::new(MockScraper::new("fb").with_titles(&["y"])));

        let payload = Arc::new(Payload::Unrecognized {
            kind: "file".into(),
            value: serde_json::json!({ "url": 1 }),
        });
        assert!(registry.scrape_payload(payload).await.is_empty());
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = ScraperRegistry::empty(ScrapeOptions::default());
        assert!(registry.is_empty());
        registry.register(Tier::Fallback, Arc::new(MockScraper::new("b")));
        registry.register(Tier::Primary, Arc::new(MockScraper::new("a")));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(registry.get("b").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.tier(Tier::Fallback).len(), 1);
    }
}
