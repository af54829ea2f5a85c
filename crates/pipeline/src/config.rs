//! Pipeline configuration loading.

use std::path::Path;

use anyhow::Context;
use chiron_llm::LlmConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level configuration, usually loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub llm: LlmConfig,
}

impl PipelineConfig {
    /// Loads configuration from a TOML file. Missing tables fall back
    /// to their defaults, so a partial file is fine.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.llm.api_key.is_some() {
            warn!(
                "API key found in config file; prefer the QWEN_API_KEY or \
                 OPENAI_API_KEY environment variable"
            );
        }

        Ok(config)
    }
}
