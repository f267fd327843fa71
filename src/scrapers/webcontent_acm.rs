//! ACM Digital Library article pages.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::{PayloadKinds, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{Draft, Payload};
use crate::utils::collapse_whitespace;

static ACM_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https://dl\.acm\.org/doi").unwrap());

/// Article header title, newest layout first
const TITLE_SELECTORS: [&str; 2] = [
    "#skip-to-main-content > main > article > header > div > h1",
    "h1.citation__title",
];

/// Scraper reading the title off an ACM DL article page
#[derive(Debug, Clone, Default)]
pub struct AcmScraper;

impl AcmScraper {
    pub fn new() -> Self {
        Self
    }
}

fn article_title(document: &str) -> Option<String> {
    let html = Html::parse_document(document);
    TITLE_SELECTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            html.select(&selector)
                .next()
                .map(|h1| collapse_whitespace(&h1.text().collect::<String>()))
                .filter(|t| !t.is_empty())
        })
}

#[async_trait]
impl Scraper for AcmScraper {
    fn id(&self) -> &str {
        "webcontent-acm"
    }

    fn name(&self) -> &str {
        "ACM Digital Library"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::WEBCONTENT
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload.as_web().is_some_and(|w| ACM_URL.is_match(&w.url))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        _options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        let Some(web) = payload.as_web().filter(|_| self.validate(payload)) else {
            return Ok(Vec::new());
        };

        Ok(article_title(web.document())
            .map(|title| {
                let mut draft = Draft::new();
                draft.title = Some(title);
                vec![draft]
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><div id="skip-to-main-content"><main><article><header><div>
<h1 property="name">On the Dangers of Stochastic Parrots:
  Can Language Models Be Too Big?</h1></div></header></article></main></div></body></html>"#;

    #[tokio::test]
    async fn test_title_from_header() {
        let payload = Payload::web("https://dl.acm.org/doi/10.1145/3442188.3445922", PAGE);
        let scraper = AcmScraper::new();
        assert!(scraper.validate(&payload));

        let drafts = scraper.scrape(&payload, &ScrapeOptions::default()).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(
            drafts[0].title.as_deref(),
            Some("On the Dangers of Stochastic Parrots: Can Language Models Be Too Big?")
        );
    }

    #[tokio::test]
    async fn test_no_title_no_draft() {
        let scraper = AcmScraper::new();
        let payload = Payload::web("https://dl.acm.org/doi/10.1145/1", "<html></html>");
        assert!(scraper
            .scrape(&payload, &ScrapeOptions::default())
            .await
            .unwrap()
            .is_empty());
        assert!(!scraper.validate(&Payload::web("https://example.com/doi/1", PAGE)));
    }
}
