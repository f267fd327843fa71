//! Integration tests for Entry Scrape
//!
//! These tests drive the batch runner and the built-in scrapers together.

use async_trait::async_trait;
use entry_scrape::config::{Config, ScrapeOptions};
use entry_scrape::models::{Draft, DraftBuilder, Payload};
use entry_scrape::scrapers::{
    MockRecognizer, MockScraper, ScrapeError, Scraper, ScraperDeps, ScraperRegistry, Tier,
};
use entry_scrape::utils::{HttpClient, ResourceCache};
use entry_scrape::EntryScrapeService;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;
use std::sync::Arc;

/// Fails only for payloads whose summary mentions `needle`
#[derive(Debug)]
struct FailsOn {
    needle: &'static str,
}

#[async_trait]
impl Scraper for FailsOn {
    fn id(&self) -> &str {
        "fails-on"
    }

    fn name(&self) -> &str {
        "Selective Failure"
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload.as_file().is_some()
    }

    async fn scrape(
        &self,
        payload: &Payload,
        _options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        if payload.summary().contains(self.needle) {
            return Err(ScrapeError::Parse("corrupt input".into()));
        }
        Ok(vec![DraftBuilder::new().title("selective").build()])
    }
}

fn service_with(primary: Vec<Arc<dyn Scraper>>, fallback: Vec<Arc<dyn Scraper>>) -> EntryScrapeService {
    let mut registry = ScraperRegistry::empty(ScrapeOptions::default());
    for scraper in primary {
        registry.register(Tier::Primary, scraper);
    }
    for scraper in fallback {
        registry.register(Tier::Fallback, scraper);
    }
    EntryScrapeService::with_registry(registry, Arc::new(ResourceCache::new(None)), 4)
}

fn builtin_service(dir: &Path) -> EntryScrapeService {
    let mut config = Config::default();
    config.downloads.default_path = dir.to_path_buf();
    EntryScrapeService::new(&config).unwrap()
}

/// A one page PDF with Helvetica text lines `(size, x, y, text)`
fn write_pdf(path: &Path, lines: &[(i64, i64, i64, &str)]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![Operation::new("BT", vec![])];
    for (size, x, y, text) in lines {
        operations.push(Operation::new("Tf", vec!["F1".into(), (*size).into()]));
        operations.push(Operation::new(
            "Tm",
            vec![1.into(), 0.into(), 0.into(), 1.into(), (*x).into(), (*y).into()],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*text)]));
    }
    operations.push(Operation::new("ET", vec![]));
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

const PAPER_LINES: [(i64, i64, i64, &str); 3] = [
    (8, 20, 760, "arXiv:1706.03762v5 [cs.CL] 6 Dec 2017"),
    (17, 100, 700, "Attention Is All You Need"),
    (10, 100, 650, "Ashish Vaswani"),
];

#[tokio::test]
async fn test_batch_isolates_one_failing_payload() {
    let service = service_with(
        vec![
            Arc::new(MockScraper::new("steady").with_titles(&["steady"])),
            Arc::new(FailsOn { needle: "broken" }),
        ],
        Vec::new(),
    );

    let payloads = vec![
        Payload::file("/data/a.pdf"),
        Payload::file("/data/broken.pdf"),
        Payload::file("/data/c.pdf"),
    ];
    let drafts = service.scrape(payloads).await;

    // 3 from the steady scraper, 2 from the selective one
    assert_eq!(drafts.len(), 5);
    let steady = drafts.iter().filter(|d| d.title.as_deref() == Some("steady")).count();
    assert_eq!(steady, 3);
}

#[tokio::test]
async fn test_batch_survives_panicking_scraper() {
    let service = service_with(
        vec![
            Arc::new(MockScraper::new("panics").panicking()),
            Arc::new(MockScraper::new("errors").failing("network down")),
            Arc::new(MockScraper::new("ok").with_titles(&["found"])),
        ],
        Vec::new(),
    );

    let payloads = (0..4).map(|i| Payload::file(format!("/data/{}.pdf", i))).collect();
    let drafts = service.scrape(payloads).await;
    assert_eq!(drafts.len(), 4);
    assert!(drafts.iter().all(|d| d.title.as_deref() == Some("found")));
}

#[tokio::test]
async fn test_within_payload_order_is_registration_order() {
    let service = service_with(
        vec![
            Arc::new(MockScraper::new("first").with_titles(&["1"]).with_delay_ms(40)),
            Arc::new(MockScraper::new("second").with_titles(&["2"])),
            Arc::new(MockScraper::new("third").with_titles(&["3"]).with_delay_ms(10)),
        ],
        Vec::new(),
    );

    let drafts = service.scrape(vec![Payload::file("/data/a.pdf")]).await;
    let titles: Vec<_> = drafts.iter().filter_map(|d| d.title.as_deref()).collect();
    assert_eq!(titles, vec!["1", "2", "3"]);
}

#[tokio::test]
async fn test_fallback_tier_runs_only_when_primary_is_empty() {
    let fallback = Arc::new(MockScraper::new("fallback").with_titles(&["fallback"]));
    let service = service_with(
        vec![Arc::new(MockScraper::new("primary").with_titles(&["primary"]))],
        vec![fallback.clone() as Arc<dyn Scraper>],
    );
    let drafts = service.scrape(vec![Payload::file("/data/a.pdf")]).await;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].title.as_deref(), Some("primary"));
    assert_eq!(fallback.calls(), 0);

    let fallback = Arc::new(MockScraper::new("fallback").with_titles(&["fallback"]));
    let service = service_with(
        vec![
            Arc::new(MockScraper::new("empty")),
            Arc::new(MockScraper::new("broken").failing("boom")),
        ],
        vec![fallback.clone() as Arc<dyn Scraper>],
    );
    let drafts = service.scrape(vec![Payload::file("/data/a.pdf")]).await;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].title.as_deref(), Some("fallback"));
    assert_eq!(fallback.calls(), 1);
}

#[tokio::test]
async fn test_rejected_payloads_scrape_to_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let deps = ScraperDeps {
        http: HttpClient::new(dir.path()).unwrap(),
        recognizer: Arc::new(MockRecognizer::new().with_line("Some Title", 17.0)),
        remote: None,
    };
    let registry = ScraperRegistry::new(&deps, ScrapeOptions::default());
    assert!(!registry.is_empty());

    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "plain text").unwrap();

    let payloads = vec![
        Payload::from_value(serde_json::json!({ "type": "bogus", "value": 1 })),
        Payload::from_value(serde_json::json!({ "type": "file", "value": { "path": "x" } })),
        Payload::from_value(serde_json::json!({ "type": "paperEntity", "value": { "title": "t" } })),
        Payload::from_value(serde_json::json!({ "type": "webcontent", "value": 42 })),
        Payload::file(notes.to_string_lossy().into_owned()),
        Payload::file("https://example.com/remote.pdf"),
        Payload::web("https://example.com/about", "<html><body>nothing</body></html>"),
    ];

    let options = ScrapeOptions::default();
    for payload in &payloads {
        for scraper in registry.all() {
            if scraper.validate(payload) {
                continue;
            }
            let drafts = scraper.scrape(payload, &options).await.unwrap();
            assert!(
                drafts.is_empty(),
                "{} produced drafts for rejected {}",
                scraper.id(),
                payload.summary()
            );
        }
    }

    let service = EntryScrapeService::with_registry(registry, Arc::new(ResourceCache::new(None)), 2);
    assert!(service.scrape(payloads).await.is_empty());
}

#[tokio::test]
async fn test_pdf_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("attention.pdf");
    write_pdf(&pdf, &PAPER_LINES);

    let service = builtin_service(dir.path());
    let path = pdf.to_string_lossy().into_owned();
    let drafts = service.scrape(vec![Payload::file(path.clone())]).await;

    assert_eq!(drafts.len(), 1);
    let draft = &drafts[0];
    assert_eq!(draft.title.as_deref(), Some("Attention Is All You Need"));
    assert_eq!(draft.arxiv.as_deref(), Some("1706.03762v5"));
    assert_eq!(draft.main_url.as_deref(), Some(path.as_str()));
    service.dispose();
}

#[tokio::test]
async fn test_scrape_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let pdf = dir.path().join("attention.pdf");
    write_pdf(&pdf, &PAPER_LINES);
    let bib = dir.path().join("refs.bib");
    std::fs::write(
        &bib,
        "@article{lecun2015,\n  title={Deep learning},\n  author={LeCun, Yann and Bengio, Yoshua and Hinton, Geoffrey},\n  journal={Nature},\n  volume={521},\n  year={2015}\n}\n",
    )
    .unwrap();

    let service = builtin_service(dir.path());
    let payloads = || {
        vec![
            Payload::file(pdf.to_string_lossy().into_owned()),
            Payload::file(bib.to_string_lossy().into_owned()),
        ]
    };

    let mut first = service.scrape(payloads()).await;
    let mut second = service.scrape(payloads()).await;
    assert_eq!(first.len(), 2);

    // payloads may finish in any order
    let key = |d: &Draft| d.title.clone().unwrap_or_default();
    first.sort_by_key(key);
    second.sort_by_key(key);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_mixed_batch_through_builtin_scrapers() {
    let dir = tempfile::tempdir().unwrap();
    let bib = dir.path().join("refs.bib");
    std::fs::write(
        &bib,
        "@inproceedings{he2016,\n  title={Deep Residual Learning for Image Recognition},\n  author={He, Kaiming and Zhang, Xiangyu},\n  booktitle={CVPR},\n  year={2016}\n}\n",
    )
    .unwrap();

    let entity = DraftBuilder::new()
        .title("Imported Record")
        .authors("Grace Hopper")
        .build();
    let raw = serde_json::json!([
        { "type": "file", "value": bib.to_string_lossy() },
        { "type": "paperEntity", "value": serde_json::to_value(&entity).unwrap() },
        { "type": "unknown", "value": null },
    ]);
    let payloads = Payload::from_json_array(&raw.to_string()).unwrap();
    assert_eq!(payloads.len(), 3);

    let service = builtin_service(dir.path());
    let drafts = service.scrape(payloads).await;
    assert_eq!(drafts.len(), 2);

    let mut titles: Vec<_> = drafts.iter().filter_map(|d| d.title.as_deref()).collect();
    titles.sort();
    assert_eq!(
        titles,
        vec!["Deep Residual Learning for Image Recognition", "Imported Record"]
    );
    let residual = drafts
        .iter()
        .find(|d| d.title.as_deref() == Some("Deep Residual Learning for Image Recognition"))
        .unwrap();
    assert_eq!(residual.authors.as_deref(), Some("Kaiming He, Xiangyu Zhang"));
}

#[tokio::test]
async fn test_empty_batch() {
    let dir = tempfile::tempdir().unwrap();
    let service = builtin_service(dir.path());
    assert!(service.scrape(Vec::new()).await.is_empty());
}
