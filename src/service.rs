//! Batch runner turning payloads into drafts.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

use crate::config::{Config, ScrapeOptions};
use crate::models::{Draft, Payload};
use crate::pdf::{DocumentRecognizer, LopdfRecognizer, RemoteRecognizer, ZoteroRecognizer};
use crate::scrapers::{ScrapeError, ScraperDeps, ScraperRegistry};
use crate::utils::{HttpClient, ResourceCache};

/// Entry point of the library: owns the registry and the shared resources.
///
/// Each payload is scraped in its own task. Failures never reach the caller;
/// a payload nothing understood simply yields no drafts.
#[derive(Debug, Clone)]
pub struct EntryScrapeService {
    registry: Arc<ScraperRegistry>,
    resources: Arc<ResourceCache>,
    max_concurrent: usize,
}

impl EntryScrapeService {
    /// Build the service with every built-in scraper
    pub fn new(config: &Config) -> Result<Self, ScrapeError> {
        let http = HttpClient::new(config.downloads.default_path.clone())?;
        let resources = Arc::new(ResourceCache::new(config.resources.directory.clone()));

        let recognizer: Arc<dyn DocumentRecognizer> =
            Arc::new(LopdfRecognizer::new(Arc::clone(&resources)));
        let remote: Arc<dyn RemoteRecognizer> = Arc::new(ZoteroRecognizer::new(
            http.clone(),
            config.remote.endpoint.clone(),
            config.remote.timeout(),
        ));

        let deps = ScraperDeps {
            http,
            recognizer,
            remote: Some(remote),
        };
        let registry = ScraperRegistry::new(&deps, ScrapeOptions::from_config(&config.scrape));

        tracing::debug!(
            scrapers = registry.len(),
            local_pdf_parse = config.scrape.local_pdf_parse,
            "Entry scrape service ready"
        );

        Ok(Self::with_registry(
            registry,
            resources,
            config.batch.max_concurrent_payloads,
        ))
    }

    /// Build the service around an existing registry
    pub fn with_registry(
        registry: ScraperRegistry,
        resources: Arc<ResourceCache>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            resources,
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn registry(&self) -> &ScraperRegistry {
        &self.registry
    }

    pub fn resources(&self) -> &Arc<ResourceCache> {
        &self.resources
    }

    /// Scrape every payload and return all drafts found.
    ///
    /// Drafts of one payload keep scraper registration order; payloads may
    /// finish in any order.
    pub async fn scrape(&self, payloads: Vec<Payload>) -> Vec<Draft> {
        let started = Instant::now();
        let count = payloads.len();
        tracing::info!(payloads = count, "Scraping entry payloads");

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let tasks: Vec<_> = payloads
            .into_iter()
            .map(|payload| {
                let registry = Arc::clone(&self.registry);
                let semaphore = Arc::clone(&semaphore);
                let payload = Arc::new(payload);
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        return Vec::new();
                    };
                    registry.scrape_payload(payload).await
                })
            })
            .collect();

        let mut drafts = Vec::new();
        for result in join_all(tasks).await {
            match result {
                Ok(found) => drafts.extend(found),
                Err(e) => tracing::error!(error = %e, "Payload task failed"),
            }
        }

        tracing::info!(
            payloads = count,
            drafts = drafts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scraped entry payloads"
        );
        drafts
    }

    /// Release cached resources
    pub fn dispose(&self) {
        self.resources.clear();
        tracing::debug!("Entry scrape service disposed");
    }
}
