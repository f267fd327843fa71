//! Configuration management.

mod file_config;

pub use file_config::{find_config_file, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::Payload;

/// Recognizer endpoint used when none is configured
pub const DEFAULT_RECOGNIZER_ENDPOINT: &str = "https://services.zotero.org/recognizer/recognize";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Scraping preferences
    #[serde(default)]
    pub scrape: ScrapeConfig,

    /// Remote recognition service
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Download settings
    #[serde(default)]
    pub downloads: DownloadConfig,

    /// Font/cmap resources for the PDF tokenizer
    #[serde(default)]
    pub resources: ResourceConfig,

    /// Batch settings
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Scraping preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Parse PDFs locally only, never calling the remote recognizer
    #[serde(default = "default_true")]
    pub local_pdf_parse: bool,

    /// Download the PDF when importing from a web page
    #[serde(default)]
    pub download_pdf: bool,

    /// How many leading pages to recognize (1 or 2)
    #[serde(default = "default_recognition_pages")]
    pub recognition_pages: usize,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            local_pdf_parse: true,
            download_pdf: false,
            recognition_pages: default_recognition_pages(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_recognition_pages() -> usize {
    1
}

/// Remote recognition service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

impl RemoteConfig {
    /// Timeout clamped to the 1-15 second window
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs.clamp(1, 15))
    }
}

fn default_endpoint() -> String {
    DEFAULT_RECOGNIZER_ENDPOINT.to_string()
}

fn default_timeout() -> u64 {
    5
}

/// Download configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory downloaded PDFs are written to
    #[serde(default = "default_download_dir")]
    pub default_path: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            default_path: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    std::env::temp_dir().join("entry-scrape")
}

/// Resource configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Root directory holding `cmaps/` and `standard_fonts/`
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

/// Batch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum payloads scraped at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_payloads: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_payloads: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    8
}

/// Per-payload scrape options, resolved once before dispatch.
///
/// | option              | default                         |
/// |---------------------|---------------------------------|
/// | `download_pdf`      | `scrape.download_pdf` (`false`) |
/// | `local_pdf_parse`   | `scrape.local_pdf_parse` (`true`) |
/// | `recognition_pages` | `scrape.recognition_pages` (`1`) |
///
/// A web payload's own `options.downloadPDF` overrides `download_pdf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeOptions {
    pub download_pdf: bool,
    pub local_pdf_parse: bool,
    pub recognition_pages: usize,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self::from_config(&ScrapeConfig::default())
    }
}

impl ScrapeOptions {
    /// Options taken straight from configuration
    pub fn from_config(config: &ScrapeConfig) -> Self {
        Self {
            download_pdf: config.download_pdf,
            local_pdf_parse: config.local_pdf_parse,
            recognition_pages: config.recognition_pages.clamp(1, 2),
        }
    }

    /// Apply any overrides carried by the payload itself
    pub fn resolve(&self, payload: &Payload) -> Self {
        let mut options = *self;
        if let Some(download) = payload.as_web().and_then(|w| w.download_pdf_option()) {
            options.download_pdf = download;
        }
        options
    }
}

impl Config {
    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, ConfigFileError> {
        toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))
    }
}

/// Load configuration from a file, with `ENTRY_SCRAPE_*` environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(
            config::Environment::with_prefix("ENTRY_SCRAPE")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize()
}

/// Get the default configuration
pub fn get_config() -> Config {
    Config::default()
}
