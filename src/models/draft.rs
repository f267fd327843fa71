//! Draft model representing a bibliographic record under construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Publication type of a draft
///
/// Serialized as its integer code so records round-trip with hosts that
/// store the numeric form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum PubType {
    Journal,
    Conference,
    #[default]
    Other,
    Book,
}

impl PubType {
    /// Returns the integer code of the publication type
    pub fn code(self) -> u8 {
        match self {
            PubType::Journal => 0,
            PubType::Conference => 1,
            PubType::Other => 2,
            PubType::Book => 3,
        }
    }

    /// Parse a numeric code, mapping anything unknown to `Other`
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => PubType::Journal,
            1 => PubType::Conference,
            3 => PubType::Book,
            _ => PubType::Other,
        }
    }
}

impl From<PubType> for u8 {
    fn from(value: PubType) -> Self {
        value.code()
    }
}

impl From<u8> for PubType {
    fn from(value: u8) -> Self {
        PubType::from_code(i64::from(value))
    }
}

impl std::fmt::Display for PubType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PubType::Journal => "journal",
            PubType::Conference => "conference",
            PubType::Other => "other",
            PubType::Book => "book",
        };
        write!(f, "{}", name)
    }
}

/// A bibliographic record produced by a scraper, not yet persisted.
///
/// Every field starts out unset. Scrapers fill in whatever they discover and
/// leave the rest alone; an unset field means "unknown", never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Draft {
    /// Opaque record id, only carried over from native exports
    pub id: Option<String>,

    /// Paper title
    pub title: Option<String>,

    /// Authors as a single display string ("First Last, First Last")
    pub authors: Option<String>,

    /// Journal, conference, or other venue name
    pub publication: Option<String>,

    /// Publication year
    pub pub_time: Option<String>,

    /// Publication type
    pub pub_type: Option<PubType>,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// arXiv identifier
    pub arxiv: Option<String>,

    /// Main file (local path or URL)
    #[serde(rename = "mainURL")]
    pub main_url: Option<String>,

    /// Supplementary files
    #[serde(rename = "supURLs")]
    pub sup_urls: BTreeSet<String>,

    pub pages: Option<String>,
    pub volume: Option<String>,
    pub number: Option<String>,
    pub publisher: Option<String>,

    /// Tag names
    pub tags: BTreeSet<String>,

    /// Folder names
    pub folders: BTreeSet<String>,

    /// Linked code repositories
    pub codes: Vec<String>,

    pub note: Option<String>,
    pub flag: bool,
    pub rating: u32,

    /// When the record was first added to a library
    pub add_time: Option<DateTime<Utc>>,
}

impl Draft {
    /// Every field name a complete serialized record carries
    pub const FIELD_NAMES: [&'static str; 21] = [
        "id",
        "title",
        "authors",
        "publication",
        "pubTime",
        "pubType",
        "doi",
        "arxiv",
        "mainURL",
        "supURLs",
        "pages",
        "volume",
        "number",
        "publisher",
        "tags",
        "folders",
        "codes",
        "note",
        "flag",
        "rating",
        "addTime",
    ];

    /// Create an empty draft
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the author names as a vector
    pub fn author_list(&self) -> Vec<&str> {
        self.authors
            .as_deref()
            .map(|a| a.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Whether a title has been discovered
    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Whether the draft carries no information at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Check that a serialized record carries every draft field
    pub fn has_complete_shape(value: &serde_json::Value) -> bool {
        match value.as_object() {
            Some(map) => Self::FIELD_NAMES.iter().all(|k| map.contains_key(*k)),
            None => false,
        }
    }
}

/// Set `slot` to a trimmed copy of `value` unless it is blank.
pub(crate) fn set_if_present(slot: &mut Option<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        *slot = Some(value.to_string());
    }
}

/// Builder for constructing Draft objects
#[derive(Debug, Clone, Default)]
pub struct DraftBuilder {
    draft: Draft,
}

impl DraftBuilder {
    /// Create a new builder for an empty draft
    pub fn new() -> Self {
        Self::default()
    }

    /// Set title
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.draft.title = Some(title.into());
        self
    }

    /// Set authors
    pub fn authors(mut self, authors: impl Into<String>) -> Self {
        self.draft.authors = Some(authors.into());
        self
    }

    /// Set publication venue
    pub fn publication(mut self, publication: impl Into<String>) -> Self {
        self.draft.publication = Some(publication.into());
        self
    }

    /// Set publication year
    pub fn pub_time(mut self, year: impl Into<String>) -> Self {
        self.draft.pub_time = Some(year.into());
        self
    }

    /// Set publication type
    pub fn pub_type(mut self, pub_type: PubType) -> Self {
        self.draft.pub_type = Some(pub_type);
        self
    }

    /// Set DOI
    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.draft.doi = Some(doi.into());
        self
    }

    /// Set arXiv ID
    pub fn arxiv(mut self, arxiv: impl Into<String>) -> Self {
        self.draft.arxiv = Some(arxiv.into());
        self
    }

    /// Set main file URL
    pub fn main_url(mut self, url: impl Into<String>) -> Self {
        self.draft.main_url = Some(url.into());
        self
    }

    /// Add a supplementary URL
    pub fn sup_url(mut self, url: impl Into<String>) -> Self {
        self.draft.sup_urls.insert(url.into());
        self
    }

    /// Add a tag
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.draft.tags.insert(tag.into());
        self
    }

    /// Set note
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.draft.note = Some(note.into());
        self
    }

    /// Build the Draft
    pub fn build(self) -> Draft {
        self.draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_builder() {
        let draft = DraftBuilder::new()
            .title("Attention Is All You Need")
            .authors("Ashish Vaswani, Noam Shazeer")
            .arxiv("1706.03762")
            .pub_type(PubType::Conference)
            .tag("transformers")
            .build();

        assert_eq!(draft.title.as_deref(), Some("Attention Is All You Need"));
        assert_eq!(draft.author_list(), vec!["Ashish Vaswani", "Noam Shazeer"]);
        assert_eq!(draft.pub_type, Some(PubType::Conference));
        assert!(draft.tags.contains("transformers"));
    }

    #[test]
    fn test_new_draft_is_empty() {
        let draft = Draft::new();
        assert!(draft.is_empty());
        assert!(!draft.has_title());
        assert!(draft.author_list().is_empty());
    }

    #[test]
    fn test_pub_type_serializes_as_code() {
        let draft = DraftBuilder::new().pub_type(PubType::Book).build();
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["pubType"], 3);
        assert_eq!(json["mainURL"], serde_json::Value::Null);

        let back: Draft = serde_json::from_value(json).unwrap();
        assert_eq!(back.pub_type, Some(PubType::Book));
        assert_eq!(PubType::from_code(42), PubType::Other);
    }

    #[test]
    fn test_complete_shape() {
        let json = serde_json::to_value(Draft::new()).unwrap();
        assert!(Draft::has_complete_shape(&json));

        let partial = serde_json::json!({ "title": "Only a title" });
        assert!(!Draft::has_complete_shape(&partial));
        assert!(!Draft::has_complete_shape(&serde_json::json!("nope")));
    }
}
