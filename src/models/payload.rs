//! Entry payloads: the raw inputs handed to scrapers.
//!
//! A payload arrives as `{ "type": ..., "value": ... }`. Decoding never fails:
//! anything whose value does not fit its declared type becomes
//! [`Payload::Unrecognized`], which every scraper rejects.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::draft::Draft;

/// The file types scrapers know how to sniff
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileKind {
    Pdf,
    Bib,
    Csv,
    Other(String),
}

impl FileKind {
    /// Infer the kind from a path or URL's extension
    pub fn from_extension(path: &str) -> Self {
        let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_lowercase(),
            None => String::new(),
        };
        match ext.as_str() {
            "pdf" => FileKind::Pdf,
            "bib" => FileKind::Bib,
            "csv" => FileKind::Csv,
            _ => FileKind::Other(ext),
        }
    }
}

/// A `file` payload: a local path or `file://` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePayload {
    /// The value exactly as supplied
    pub url: String,
    /// Kind inferred from the extension
    pub kind: FileKind,
}

impl FilePayload {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let kind = FileKind::from_extension(&url);
        Self { url, kind }
    }

    /// URL scheme of the value, empty for bare paths
    pub fn protocol(&self) -> &str {
        match self.url.split_once("://") {
            Some((scheme, _)) => scheme,
            None => "",
        }
    }

    /// Whether the value points at the local filesystem
    pub fn is_local(&self) -> bool {
        matches!(self.protocol(), "" | "file")
    }

    /// The value with any `file://` prefix removed
    pub fn local_path(&self) -> PathBuf {
        let path = self.url.strip_prefix("file://").unwrap_or(&self.url);
        PathBuf::from(path)
    }

    /// The last path component
    pub fn file_name(&self) -> String {
        self.url
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.url)
            .to_string()
    }

    /// Local file of the given kind
    pub fn is_local_kind(&self, kind: &FileKind) -> bool {
        self.is_local() && &self.kind == kind
    }
}

/// A single browser cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    #[serde(default)]
    pub domain: String,
    pub name: String,
    pub value: String,
}

/// Cookies captured with a web page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cookies {
    /// Raw `Cookie:` header value
    Header(String),
    /// Structured cookie list
    List(Vec<Cookie>),
}

impl Default for Cookies {
    fn default() -> Self {
        Cookies::Header(String::new())
    }
}

impl Cookies {
    /// Render as a `Cookie:` header value
    pub fn header_value(&self) -> String {
        match self {
            Cookies::Header(h) => h.clone(),
            Cookies::List(list) => list
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cookies::Header(h) => h.trim().is_empty(),
            Cookies::List(list) => list.is_empty(),
        }
    }
}

/// Options a web payload may carry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebContentOptions {
    #[serde(default, rename = "downloadPDF")]
    pub download_pdf: Option<bool>,
}

/// A `webcontent` payload: a page the user was looking at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebContent {
    pub url: String,
    /// Raw HTML of the page, if captured
    #[serde(default)]
    pub document: Option<String>,
    #[serde(default)]
    pub cookies: Cookies,
    #[serde(default)]
    pub options: Option<WebContentOptions>,
}

impl WebContent {
    pub fn new(url: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            document: Some(document.into()),
            cookies: Cookies::default(),
            options: None,
        }
    }

    /// The captured HTML, empty if none was supplied
    pub fn document(&self) -> &str {
        self.document.as_deref().unwrap_or("")
    }

    /// Whether the payload explicitly asked for a PDF download
    pub fn download_pdf_option(&self) -> Option<bool> {
        self.options.as_ref().and_then(|o| o.download_pdf)
    }
}

/// An entry payload
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    File(FilePayload),
    PaperEntity(Box<Draft>),
    WebContent(WebContent),
    /// Declared type unknown, or value does not fit the declared type
    Unrecognized {
        kind: String,
        value: serde_json::Value,
    },
}

impl Payload {
    /// Convenience constructor for a file payload
    pub fn file(path: impl Into<String>) -> Self {
        Payload::File(FilePayload::new(path))
    }

    /// Convenience constructor for a web payload
    pub fn web(url: impl Into<String>, document: impl Into<String>) -> Self {
        Payload::WebContent(WebContent::new(url, document))
    }

    /// Decode a raw `{type, value}` record
    pub fn from_value(raw: serde_json::Value) -> Self {
        let kind = raw
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        let value = raw.get("value").cloned().unwrap_or(serde_json::Value::Null);

        let decoded = match kind.to_lowercase().as_str() {
            "file" => value.as_str().map(Payload::file),
            "paperentity" if Draft::has_complete_shape(&value) => {
                serde_json::from_value::<Draft>(value.clone())
                    .ok()
                    .map(|d| Payload::PaperEntity(Box::new(d)))
            }
            "webcontent" => serde_json::from_value::<WebContent>(value.clone())
                .ok()
                .map(Payload::WebContent),
            _ => None,
        };

        decoded.unwrap_or(Payload::Unrecognized { kind, value })
    }

    /// Decode a JSON array of raw payloads
    pub fn from_json_array(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        let raw: Vec<serde_json::Value> = serde_json::from_str(json)?;
        Ok(raw.into_iter().map(Payload::from_value).collect())
    }

    /// Declared payload type
    pub fn kind(&self) -> &str {
        match self {
            Payload::File(_) => "file",
            Payload::PaperEntity(_) => "paperEntity",
            Payload::WebContent(_) => "webcontent",
            Payload::Unrecognized { kind, .. } => kind,
        }
    }

    /// Short description for log lines
    pub fn summary(&self) -> String {
        let detail = match self {
            Payload::File(f) => f.url.clone(),
            Payload::PaperEntity(d) => d.title.clone().unwrap_or_default(),
            Payload::WebContent(w) => w.url.clone(),
            Payload::Unrecognized { value, .. } => value.to_string(),
        };
        let detail: String = detail.chars().take(100).collect();
        format!("{}:{}", self.kind(), detail)
    }

    pub fn as_file(&self) -> Option<&FilePayload> {
        match self {
            Payload::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_web(&self) -> Option<&WebContent> {
        match self {
            Payload::WebContent(w) => Some(w),
            _ => None,
        }
    }
}
