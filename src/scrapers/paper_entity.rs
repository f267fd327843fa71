//! Pass-through scraper for records that are already complete drafts.

use async_trait::async_trait;

use super::{PayloadKinds, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{Draft, Payload};

/// Returns a `paperEntity` payload's record unchanged
#[derive(Debug, Clone, Default)]
pub struct PaperEntityScraper;

impl PaperEntityScraper {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Scraper for PaperEntityScraper {
    fn id(&self) -> &str {
        "paperentity"
    }

    fn name(&self) -> &str {
        "Paper Entity"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::PAPER_ENTITY
    }

    fn validate(&self, payload: &Payload) -> bool {
        // decoding already checked that every field is present
        matches!(payload, Payload::PaperEntity(_))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        _options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        match payload {
            Payload::PaperEntity(draft) => Ok(vec![draft.as_ref().clone()]),
            _ => Ok(Vec::new()),
        }
    }
}
