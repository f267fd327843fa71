//! CNKI detail pages, via the site's RefWorks export.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use super::{PayloadKinds, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{set_if_present, Draft, Payload, PubType};
use crate::utils::{collapse_whitespace, html_to_text, HttpClient};

const CNKI_EXPORT_URL: &str = "https://kns.cnki.net/kns8/manage/ShowExport";

static CNKI_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://kns\.cnki\.net/KCMS/detail").unwrap());

/// Scraper for CNKI article pages
#[derive(Debug, Clone)]
pub struct CnkiScraper {
    http: HttpClient,
    export_url: String,
}

impl CnkiScraper {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            export_url: CNKI_EXPORT_URL.to_string(),
        }
    }

    /// Request exports from another endpoint
    pub fn with_export_url(mut self, export_url: impl Into<String>) -> Self {
        self.export_url = export_url.into();
        self
    }
}

/// `filename` and `dbname` query parameters of a detail URL
fn record_keys(url: &str) -> (String, String) {
    let mut filename = String::new();
    let mut dbname = String::new();
    if let Ok(parsed) = url::Url::parse(url) {
        for (key, value) in parsed.query_pairs() {
            match key.to_lowercase().as_str() {
                "filename" => filename = value.into_owned(),
                "dbname" => dbname = value.into_owned(),
                _ => {}
            }
        }
    }
    (filename, dbname)
}

/// Lines of the first exported record
fn refworks_lines(response: &str) -> Vec<String> {
    let html = Html::parse_document(response);
    let Ok(selector) = Selector::parse("li") else {
        return Vec::new();
    };
    let Some(item) = html.select(&selector).next() else {
        return Vec::new();
    };
    item.inner_html()
        .split("<br>")
        .map(|line| collapse_whitespace(&html_to_text(line)))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Map RefWorks tagged lines onto a draft
fn refworks_to_draft(lines: &[String]) -> Draft {
    let mut draft = Draft::new();
    let mut authors: Vec<String> = Vec::new();
    let mut record_type = String::new();
    let mut patent_id = String::new();

    for line in lines {
        let (tag, value) = match (line.get(..2), line.get(3..)) {
            (Some(tag), Some(value)) => (tag, value.trim()),
            _ => continue,
        };
        match tag {
            "T1" => set_if_present(&mut draft.title, value),
            "A1" | "A2" | "A3" | "A4" => authors.extend(
                value
                    .split(';')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(str::to_string),
            ),
            "YR" => set_if_present(&mut draft.pub_time, value),
            "FD" => {
                let year: String = value.chars().take(4).collect();
                set_if_present(&mut draft.pub_time, &year);
            }
            "JF" => set_if_present(&mut draft.publication, value),
            "PB" => set_if_present(&mut draft.publisher, value),
            "OP" => set_if_present(&mut draft.pages, value),
            "vo" => set_if_present(&mut draft.volume, value),
            "IS" => set_if_present(&mut draft.number, value),
            "ID" => patent_id = value.to_string(),
            "RT" => record_type = value.to_string(),
            _ => {}
        }
    }

    draft.pub_type = Some(match record_type.as_str() {
        "Journal Article" => PubType::Journal,
        "Conference Proceeding" => PubType::Conference,
        "Book" => PubType::Book,
        _ => PubType::Other,
    });
    match record_type.as_str() {
        "Dissertation/Thesis" | "Standard" => draft.publication = draft.publisher.clone(),
        "Patent" => set_if_present(&mut draft.publication, &patent_id),
        _ => {}
    }

    if !authors.is_empty() {
        draft.authors = Some(authors.join(", "));
    }
    draft
}

#[async_trait]
impl Scraper for CnkiScraper {
    fn id(&self) -> &str {
        "webcontent-cnki"
    }

    fn name(&self) -> &str {
        "CNKI"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::WEBCONTENT
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload.as_web().is_some_and(|w| CNKI_URL.is_match(&w.url))
    }

    async fn scrape(
        &self,
        payload: &Payload,
        _options: &ScrapeOptions,
    ) -> Result<Vec<Draft>, ScrapeError> {
        let Some(web) = payload.as_web().filter(|_| self.validate(payload)) else {
            return Ok(Vec::new());
        };

        let (filename, dbname) = record_keys(&web.url);
        let form = [
            ("filename", filename.as_str()),
            ("dbname", dbname.as_str()),
            ("displaymode", "Refworks"),
            ("ordertype", "desc"),
        ];
        let response = self
            .http
            .post_form(&self.export_url, &form, Some(&web.url))
            .await?;

        let lines = refworks_lines(&response);
        if lines.is_empty() {
            tracing::debug!(url = %web.url, "CNKI export returned no record");
            return Ok(Vec::new());
        }

        let draft = refworks_to_draft(&lines);
        if !draft.has_title() {
            return Ok(Vec::new());
        }
        Ok(vec![draft])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "<ul><li>RT Journal Article<br>SR 1<br>A1 张三;李四;<br>T1 深度学习综述<br>JF 计算机学报<br>YR 2020<br>IS 03<br>vo 43<br>OP 1-20<br>PB 科学出版社<br></li><li>T1 Second</li></ul>";

    #[test]
    fn test_refworks_mapping() {
        let draft = refworks_to_draft(&refworks_lines(EXPORT));
        assert_eq!(draft.title.as_deref(), Some("深度学习综述"));
        assert_eq!(draft.authors.as_deref(), Some("张三, 李四"));
        assert_eq!(draft.publication.as_deref(), Some("计算机学报"));
        assert_eq!(draft.pub_type, Some(PubType::Journal));
        assert_eq!(draft.pub_time.as_deref(), Some("2020"));
        assert_eq!(draft.number.as_deref(), Some("03"));
        assert_eq!(draft.volume.as_deref(), Some("43"));
        assert_eq!(draft.pages.as_deref(), Some("1-20"));
    }

    #[test]
    fn test_thesis_and_patent_venues() {
        let lines: Vec<String> = ["RT Dissertation/Thesis", "T1 论文", "PB 清华大学", "FD 2019-06-01"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let thesis = refworks_to_draft(&lines);
        assert_eq!(thesis.publication.as_deref(), Some("清华大学"));
        assert_eq!(thesis.pub_time.as_deref(), Some("2019"));
        assert_eq!(thesis.pub_type, Some(PubType::Other));

        let lines: Vec<String> = ["RT Patent", "T1 一种方法", "ID CN123456A"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(refworks_to_draft(&lines).publication.as_deref(), Some("CN123456A"));
    }

    #[test]
    fn test_record_keys() {
        let (filename, dbname) = record_keys(
            "https://kns.cnki.net/KCMS/detail/detail.aspx?dbcode=CJFD&dbname=CJFDLAST2020&filename=JSJX202003001",
        );
        assert_eq!(filename, "JSJX202003001");
        assert_eq!(dbname, "CJFDLAST2020");
    }

    #[tokio::test]
    async fn test_scrape_posts_export_form() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/export")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("filename".into(), "JSJX202003001".into()),
                mockito::Matcher::UrlEncoded("displaymode".into(), "Refworks".into()),
            ]))
            .with_status(200)
            .with_body(EXPORT)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let scraper = CnkiScraper::new(HttpClient::new(dir.path()).unwrap())
            .with_export_url(format!("{}/export", server.url()));
        let payload = Payload::web(
            "https://kns.cnki.net/KCMS/detail/detail.aspx?dbname=CJFDLAST2020&filename=JSJX202003001",
            "",
        );
        assert!(scraper.validate(&payload));

        let drafts = scraper.scrape(&payload, &ScrapeOptions::default()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].title.as_deref(), Some("深度学习综述"));
    }
}
