//! Configuration file discovery and TOML persistence.
//!
//! # Configuration File Format
//!
//! ```toml
//! [scrape]
//! local_pdf_parse = true
//! download_pdf = false
//! recognition_pages = 1
//!
//! [remote]
//! endpoint = "https://services.zotero.org/recognizer/recognize"
//! timeout_secs = 5
//!
//! [downloads]
//! default_path = "/tmp/entry-scrape"
//!
//! [resources]
//! directory = "/usr/share/entry-scrape"
//!
//! [batch]
//! max_concurrent_payloads = 8
//! ```

use std::path::{Path, PathBuf};

use super::Config;

/// File name looked up in the working directory
const LOCAL_CONFIG_NAME: &str = "entry-scrape.toml";

/// Find a configuration file in the default locations
///
/// Checks `./entry-scrape.toml`, then `<config dir>/entry-scrape/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_NAME);
    if local.is_file() {
        return Some(local);
    }

    let user = dirs::config_dir()?.join("entry-scrape").join("config.toml");
    user.is_file().then_some(user)
}

impl Config {
    /// Load configuration from a TOML file, without environment overrides
    pub fn load_toml(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
