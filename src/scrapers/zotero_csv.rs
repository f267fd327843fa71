//! Zotero CSV export scraper.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};

use super::csv::{first_line, CsvRow, CsvTable};
use super::{PayloadKinds, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{set_if_present, Draft, FileKind, Payload, PubType};
use crate::utils::html_to_text;

/// Zotero item types in publication-type code order
const ITEM_TYPES: [&str; 4] = ["journalArticle", "conferencePaper", "others", "book"];

/// Scraper for CSV files exported by Zotero
#[derive(Debug, Clone, Default)]
pub struct ZoteroCsvScraper;

impl ZoteroCsvScraper {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Scraper for ZoteroCsvScraper {
    fn id(&self) -> &str {
        "zoterocsv"
    }

    fn name(&self) -> &str {
        "Zotero CSV"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::FILE
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload
            .as_file()
            .filter(|f| f.is_local_kind(&FileKind::Csv))
            .and_then(|f| first_line(&f.local_path()))
            .is_some_and(|header| header.contains("Item Type"))
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

        let mut drafts = Vec::new();
        for row in table.rows() {
            match row {
                Ok(row) => drafts.push(row_to_draft(&row)),
                Err(number) => {
                    tracing::warn!(path = %file.url, row = number, "Skipping malformed Zotero CSV row");
                }
            }
        }
        Ok(drafts)
    }
}

fn row_to_draft(row: &CsvRow<'_>) -> Draft {
    let mut draft = Draft::new();

    set_if_present(&mut draft.title, row.get("Title"));

    let authors: Vec<String> = row.list("Author").into_iter().map(flip_name).collect();
    if !authors.is_empty() {
        draft.authors = Some(authors.join(", "));
    }

    set_if_present(&mut draft.publication, row.get("Publication Title"));
    set_if_present(&mut draft.pub_time, row.get("Publication Year"));
    set_if_present(&mut draft.doi, row.get("DOI"));
    set_if_present(&mut draft.pages, row.get("Pages"));
    set_if_present(&mut draft.volume, row.get("Volume"));
    set_if_present(&mut draft.number, row.get("Issue"));
    set_if_present(&mut draft.publisher, row.get("Publisher"));

    let item_type = row.get("Item Type");
    draft.pub_type = Some(
        ITEM_TYPES
            .iter()
            .position(|t| *t == item_type)
            .map(|i| PubType::from_code(i as i64))
            .unwrap_or(PubType::Other),
    );

    for attachment in row.list("File Attachments") {
        if draft.main_url.is_none() && attachment.to_lowercase().ends_with(".pdf") {
            draft.main_url = Some(attachment.to_string());
        } else {
            draft.sup_urls.insert(attachment.to_string());
        }
    }

    let note = html_to_text(row.get("Notes"));
    if !note.trim().is_empty() {
        draft.note = Some(format!("<md>\n{}", note));
    }

    draft.tags = row
        .list("Manual Tags")
        .into_iter()
        .chain(row.list("Automatic Tags"))
        .map(str::to_string)
        .collect();

    draft.add_time = parse_date_added(row.get("Date Added"));
    draft
}

/// "Last, First" to "First Last"
fn flip_name(name: &str) -> String {
    let mut parts: Vec<&str> = name.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
    parts.reverse();
    parts.join(" ")
}

fn parse_date_added(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const HEADER: &str = "\"Key\",\"Item Type\",\"Publication Year\",\"Author\",\"Title\",\"Publication Title\",\"DOI\",\"Date Added\",\"Pages\",\"Issue\",\"Volume\",\"Publisher\",\"File Attachments\",\"Notes\",\"Manual Tags\",\"Automatic Tags\"";

    fn write_csv(body: &str) -> (tempfile::TempDir, Payload) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        std::fs::write(&path, format!("{}\n{}", HEADER, body)).unwrap();
        let payload = Payload::file(path.to_string_lossy().to_string());
        (dir, payload)
    }

    #[tokio::test]
    async fn test_scrape_rows() {
        let body = concat!(
            "\"K1\",\"conferencePaper\",\"2017\",\"Vaswani, Ashish; Shazeer, Noam\",\"Attention Is All You Need\",\"NeurIPS\",\"10.5555/3295222\",\"2023-01-05 10:22:11\",\"5998-6008\",\"\",\"30\",\"Curran\",\"/papers/attention.pdf; /papers/supp.zip\",\"<p>Great <b>paper</b></p>\",\"nlp; transformers\",\"nlp; attention\"\n",
            "\"K2\",\"thesis\",\"2020\",\"\",\"A Thesis\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\",\"\"\n",
            "\"K3\",\"broken row\"\n",
        );
        let (_dir, payload) = write_csv(body);

        let scraper = ZoteroCsvScraper::new();
        assert!(scraper.validate(&payload));
        let drafts = scraper.scrape(&payload, &ScrapeOptions::default()).await.unwrap();
        assert_eq!(drafts.len(), 2);

        let d = &drafts[0];
        assert_eq!(d.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(d.authors.as_deref(), Some("Ashish Vaswani, Noam Shazeer"));
        assert_eq!(d.pub_type, Some(PubType::Conference));
        assert_eq!(d.main_url.as_deref(), Some("/papers/attention.pdf"));
        assert!(d.sup_urls.contains("/papers/supp.zip"));
        assert_eq!(d.number, None);
        assert_eq!(d.note.as_deref(), Some("<md>\nGreat\npaper"));
        let tags: Vec<&str> = d.tags.iter().map(String::as_str).collect();
        assert_eq!(tags, vec!["attention", "nlp", "transformers"]);
        assert_eq!(
            d.add_time,
            Some(Utc.with_ymd_and_hms(2023, 1, 5, 10, 22, 11).unwrap())
        );

        assert_eq!(drafts[1].pub_type, Some(PubType::Other));
        assert_eq!(drafts[1].authors, None);
    }

    #[tokio::test]
    async fn test_rejects_other_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "id,title\n1,x\n").unwrap();
        let scraper = ZoteroCsvScraper::new();

        for payload in [
            Payload::file(path.to_string_lossy().to_string()),
            Payload::file(dir.path().join("missing.csv").to_string_lossy().to_string()),
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
    fn test_flip_name() {
        assert_eq!(flip_name("Vaswani, Ashish"), "Ashish Vaswani");
        assert_eq!(flip_name("Plato"), "Plato");
    }
}
