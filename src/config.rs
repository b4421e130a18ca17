use crate::error::{ReportError, Result};
use crate::preprocess::Hub;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontPaths {
    pub regular: PathBuf,
    pub bold: PathBuf,
}

impl Default for FontPaths {
    fn default() -> Self {
        Self {
            regular: PathBuf::from("resources/fonts/DejaVuSans.ttf"),
            bold: PathBuf::from("resources/fonts/DejaVuSans-Bold.ttf"),
        }
    }
}

/// Settings read from a YAML file; every field has a default. Relative
/// paths are resolved against the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub template: PathBuf,
    pub fonts: FontPaths,
    pub output_dir: PathBuf,
    /// CSV export per hub source key (`impo`, `expo1`, `expo2`).
    pub sources: BTreeMap<String, PathBuf>,
    pub delimiter: char,
    pub cache_ttl_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("resources/templates/reporte.pdf"),
            fonts: FontPaths::default(),
            output_dir: PathBuf::from("resources/output"),
            sources: BTreeMap::new(),
            delimiter: ',',
            cache_ttl_secs: 300,
            access_key: None,
        }
    }
}

impl ReportConfig {
    /// Defaults when `path` is `None`, otherwise the parsed file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            None => Self::default(),
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&text)?
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.delimiter.is_ascii() {
            return Err(ReportError::InvalidConfiguration(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }
        for key in self.sources.keys() {
            if !Hub::ALL.iter().any(|hub| hub.source_key() == key) {
                return Err(ReportError::InvalidConfiguration(format!(
                    "unknown source key '{key}' (expected impo, expo1 or expo2)"
                )));
            }
        }
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        u8::try_from(self.delimiter).unwrap_or(b',')
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Configured source paths, filling in `resources/data/<key>.csv` for
    /// hubs without one.
    pub fn source_paths(&self) -> BTreeMap<String, PathBuf> {
        Hub::ALL
            .iter()
            .map(|hub| {
                let key = hub.source_key();
                let path = self
                    .sources
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| PathBuf::from(format!("resources/data/{key}.csv")));
                (key.to_string(), path)
            })
            .collect()
    }
}
