use std::path::Path;

use serde::Deserialize;

use crate::import::MAX_IMPORT_BYTES;
use crate::otel::MappingOverride;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub langsmith: LangSmithConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

impl IngestConfig {
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub max_bytes: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_bytes: MAX_IMPORT_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "pretty".to_owned(),
        }
    }
}

/// Run-name fragments. `None` keeps the built-in list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LangSmithConfig {
    pub llm_run_names: Option<Vec<String>>,
    pub retriever_run_names: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OtelConfig {
    /// Replace the built-in key lists instead of appending to them.
    pub replace_defaults: bool,
    #[serde(flatten)]
    pub mapping: MappingOverride,
}
