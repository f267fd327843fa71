//! BibTeX scraper built on `biblatex`.

use async_trait::async_trait;
use biblatex::{Bibliography, Chunk, Entry, Person, Spanned};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{PayloadKinds, ScrapeError, Scraper};
use crate::config::ScrapeOptions;
use crate::models::{set_if_present, Draft, FileKind, Payload, PubType};
use crate::pdf::extract_arxiv;
use crate::utils::collapse_whitespace;

static ENTRY_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*@[a-zA-Z]").unwrap());
static BARE_ARXIV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}\.\d{4,5}(v\d+)?$").unwrap());

/// Scraper for local `.bib` files; one draft per entry
#[derive(Debug, Clone, Default)]
pub struct BibtexScraper;

impl BibtexScraper {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Scraper for BibtexScraper {
    fn id(&self) -> &str {
        "bibtex"
    }

    fn name(&self) -> &str {
        "BibTeX"
    }

    fn accepts(&self) -> PayloadKinds {
        PayloadKinds::FILE
    }

    fn validate(&self, payload: &Payload) -> bool {
        payload
            .as_file()
            .is_some_and(|f| f.is_local_kind(&FileKind::Bib))
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
        let drafts = parse_bibtex(&content);
        tracing::debug!(path = %file.url, entries = drafts.len(), "Parsed BibTeX file");
        Ok(drafts)
    }
}

/// Parse BibTeX source into drafts.
///
/// The whole text is parsed first. If that fails, each `@entry` is parsed on
/// its own so one broken entry does not lose the rest.
pub fn parse_bibtex(content: &str) -> Vec<Draft> {
    match Bibliography::parse(content) {
        Ok(bibliography) => bibliography.iter().map(entry_to_draft).collect(),
        Err(e) => {
            tracing::debug!(error = %e, "BibTeX parse failed, recovering entries one by one");
            parse_entries_individually(content)
        }
    }
}

fn parse_entries_individually(content: &str) -> Vec<Draft> {
    let starts: Vec<usize> = ENTRY_START.find_iter(content).map(|m| m.start()).collect();

    let mut drafts = Vec::new();
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(content.len());
        match Bibliography::parse(&content[start..end]) {
            Ok(bibliography) => drafts.extend(bibliography.iter().map(entry_to_draft)),
            Err(e) => tracing::warn!(offset = start, error = %e, "Skipping malformed BibTeX entry"),
        }
    }
    drafts
}

fn entry_to_draft(entry: &Entry) -> Draft {
    let mut draft = Draft::new();
    apply_entry(entry, &mut draft);
    draft
}

/// Copy the fields of a BibTeX entry onto a draft
fn apply_entry(entry: &Entry, draft: &mut Draft) {
    if let Some(title) = field(entry, "title") {
        set_if_present(&mut draft.title, &title);
    }

    let authors: Vec<String> = entry
        .author()
        .unwrap_or_default()
        .iter()
        .filter(|p| p.name != "others")
        .map(person_name)
        .filter(|n| !n.is_empty())
        .collect();
    if !authors.is_empty() {
        draft.authors = Some(authors.join(", "));
    }

    if let Some(year) = field(entry, "year").or_else(|| field(entry, "date")) {
        let year: String = year.chars().take(4).collect();
        set_if_present(&mut draft.pub_time, &year);
    }

    if let Some(venue) = venue(entry) {
        set_if_present(&mut draft.publication, &venue);
    }

    draft.pub_type = Some(match entry.entry_type.to_string().to_lowercase().as_str() {
        "article" => PubType::Journal,
        "inproceedings" | "incollection" | "conference" => PubType::Conference,
        "book" => PubType::Book,
        _ => PubType::Other,
    });

    for (key, slot) in [
        ("pages", &mut draft.pages),
        ("volume", &mut draft.volume),
        ("number", &mut draft.number),
        ("publisher", &mut draft.publisher),
        ("doi", &mut draft.doi),
    ] {
        if let Some(value) = field(entry, key) {
            set_if_present(slot, &value);
        }
    }

    if let Some(arxiv) = entry_arxiv(entry) {
        draft.arxiv = Some(arxiv);
    }
}

/// Journal or booktitle, preferring a venue that is not arXiv
fn venue(entry: &Entry) -> Option<String> {
    let candidates: Vec<String> = ["journal", "booktitle"]
        .iter()
        .filter_map(|key| field(entry, key))
        .collect();
    candidates
        .iter()
        .find(|v| !v.to_lowercase().contains("arxiv"))
        .or_else(|| candidates.first())
        .cloned()
}

fn entry_arxiv(entry: &Entry) -> Option<String> {
    if let Some(eprint) = field(entry, "eprint") {
        let prefix = field(entry, "archiveprefix").unwrap_or_default();
        if prefix.is_empty() || prefix.eq_ignore_ascii_case("arxiv") {
            if BARE_ARXIV.is_match(&eprint) {
                return Some(eprint);
            }
            if let Some(id) = extract_arxiv(&format!("arXiv:{}", eprint)) {
                return Some(id);
            }
        }
    }
    // "arXiv preprint arXiv:1706.03762"
    field(entry, "journal").and_then(|j| extract_arxiv(&j))
}

/// A field as plain text, whitespace collapsed; `None` when absent or blank
fn field(entry: &Entry, key: &str) -> Option<String> {
    let text = collapse_whitespace(&chunks_to_string(entry.get(key)?));
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn chunks_to_string(chunks: &[Spanned<Chunk>]) -> String {
    chunks
        .iter()
        .map(|c| match &c.v {
            Chunk::Normal(s) => s.as_str(),
            Chunk::Verbatim(s) => s.as_str(),
            Chunk::Math(s) => s.as_str(),
        })
        .collect()
}

/// "Given Family"
fn person_name(p: &Person) -> String {
    [&p.given_name, &p.prefix, &p.name, &p.suffix]
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
