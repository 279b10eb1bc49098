//! Loading typed configuration from TOML or JSON files

use serde::de::DeserializeOwned;
use std::path::Path;

use crate::errors::types::{Error, Result};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick a format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(Error::UnsupportedFormat(format!(
                "'.{}' (expected .toml or .json)",
                other
            ))),
            None => Err(Error::UnsupportedFormat(format!(
                "{} has no file extension",
                path.display()
            ))),
        }
    }
}

/// Parse configuration text in the given format
pub fn load_str<T: DeserializeOwned>(contents: &str, format: ConfigFormat) -> Result<T> {
    match format {
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| Error::Parse(e.to_string())),
        ConfigFormat::Json => serde_json::from_str(contents).map_err(|e| Error::Parse(e.to_string())),
    }
}

/// Read and parse a configuration file, choosing the format by extension
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)?;
    tracing::debug!("Loading {:?} configuration from {}", format, path.display());
    load_str(&contents, format)
}
