//! Scraper for the library's own CSV export.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::csv::{first_line, CsvRow, CsvTable};
use super::{PayloadKinds, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{set_if_present, Draft, FileKind, Payload, PubType};

/// Header line written by the native exporter
pub const EXPORT_HEADER: &str = "id,addTime,title,authors,publication,pubTime,pubType,doi,arxiv,mainURL,supURLs,rating,tags,folders,flag,note,codes,pages,volume,number,publisher,";

/// Scraper for native CSV exports; every column maps one-to-one onto a draft
#[derive(Debug, Clone, Default)]
pub struct PaperlibCsvScraper;

impl PaperlibCsvScraper {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Scraper for PaperlibCsvScraper {
    fn id(&self) -> &str {
        "paperlibcsv"
    }

    fn name(&self) -> &str {
        "Paperlib CSV"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::FILE
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload
            .as_file()
            .filter(|f| f.is_local_kind(&FileKind::Csv))
            .and_then(|f| first_line(&f.local_path()))
            .is_some_and(|header| header.contains(EXPORT_HEADER))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        _options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        let Some(file) = payload.as_file().filter(|_| self.validate(payload)) else {
            return Ok(Vec::new());
        };

        let content = tokio::fs::read_to_string(file.local_path()).await?;
        let table = CsvTable::parse(&content);

        let drafts = table
            .rows()
            .filter_map(|row| match row {
                Ok(row) => Some(row_to_draft(&row)),
                Err(number) => {
                    tracing::warn!(path = %file.url, row = number, "Skipping malformed CSV row");
                    None
                }
            })
            .collect();
        Ok(drafts)
    }
}

fn row_to_draft(row: &CsvRow<'_>) -> Draft {
    let mut draft = Draft::new();

    set_if_present(&mut draft.id, row.get("id"));
    draft.add_time = DateTime::parse_from_rfc3339(row.get("addTime").trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok();

    for (column, slot) in [
        ("title", &mut draft.title),
        ("authors", &mut draft.authors),
        ("publication", &mut draft.publication),
        ("pubTime", &mut draft.pub_time),
        ("doi", &mut draft.doi),
        ("arxiv", &mut draft.arxiv),
        ("mainURL", &mut draft.main_url),
        ("note", &mut draft.note),
        ("pages", &mut draft.pages),
        ("volume", &mut draft.volume),
        ("number", &mut draft.number),
        ("publisher", &mut draft.publisher),
    ] {
        set_if_present(slot, row.get(column));
    }

    draft.pub_type = row.get("pubType").trim().parse::<i64>().ok().map(PubType::from_code);
    draft.rating = row.get("rating").trim().parse().unwrap_or(0);
    draft.flag = row.get("flag").trim() == "true";

    draft.sup_urls = row.list("supURLs").into_iter().map(str::to_string).collect();
    draft.tags = row.list("tags").into_iter().map(str::to_string).collect();
    draft.folders = row.list("folders").into_iter().map(str::to_string).collect();
    draft.codes = row.list("codes").into_iter().map(str::to_string).collect();

    draft
}
