//! Configuration management for docqa
//!
//! Loads the TOML configuration, applies `DOCQA_SECTION__KEY` environment
//! overrides and validates the result.

use crate::error::{DocQaError, Result};
use crate::llm::DEFAULT_OLLAMA_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub indexing: IndexingConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            schema_version: "1.0.0".to_string(),
            created_at: current_timestamp(),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
        }
    }
}

/// HNSW index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub vector_dim: usize,
    pub hnsw_ef_construction: usize,
    pub hnsw_m: usize,
    pub hnsw_ef_search: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            vector_dim: 384,
            hnsw_ef_construction: 200,
            hnsw_m: 16,
            hnsw_ef_search: 64,
        }
    }
}

/// Document chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Characters per chunk
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Token window each chunk is re-split to (0 = off)
    pub tokens_per_chunk: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0,
            tokens_per_chunk: 256,
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String, // "ollama" or "openai"
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "llama3.1:8b".to_string(),
            temperature: 0.2,
            request_timeout_secs: 60,
        }
    }
}

/// Retrieval pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Paraphrases generated per question
    pub num_variants: usize,
    /// Nearest neighbours fetched per sub-query
    pub fetch_k: usize,
    /// Passages kept after reranking
    pub top_n: usize,
    pub reranker_model: String,
    pub fallback_on_expansion_error: bool,
    /// Whole-request deadline in seconds (0 = none)
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            num_variants: 5,
            fetch_k: 20,
            top_n: 6,
            reranker_model: "BAAI/bge-reranker-base".to_string(),
            fallback_on_expansion_error: true,
            timeout_secs: 0,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DocQaError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DocQaError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load `path`, or fall back to defaults plus environment overrides when
    /// it does not exist. The result is validated either way.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }

        tracing::warn!("Config file not found, using defaults. Run 'docqa config init' to create one.");
        Self::from_defaults(std::env::vars())
    }

    fn from_defaults(vars: impl IntoIterator<Item = (String, String)>) -> Result<Self> {
        let mut config = Config::default();
        config.apply_overrides(vars);
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply per-invocation retrieval overrides and re-validate
    pub fn override_retrieval(
        &mut self,
        top_n: Option<usize>,
        num_variants: Option<usize>,
    ) -> Result<()> {
        if let Some(top_n) = top_n {
            self.retrieval.top_n = top_n;
        }
        if let Some(num_variants) = num_variants {
            self.retrieval.num_variants = num_variants;
        }
        ConfigValidator::validate(self)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| DocQaError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: DOCQA_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("DOCQA_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "LLM__PROVIDER" => self.llm.provider = value.to_string(),
            "LLM__BASE_URL" => self.llm.base_url = value.to_string(),
            "LLM__MODEL" => self.llm.model = value.to_string(),
            "LLM__API_KEY_ENV" => self.llm.api_key_env = value.to_string(),
            "LLM__TEMPERATURE" => self.llm.temperature = parse_value(path, value)?,
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "CHUNKING__TOKENS_PER_CHUNK" => {
                self.chunking.tokens_per_chunk = parse_value(path, value)?
            }
            "RETRIEVAL__NUM_VARIANTS" => self.retrieval.num_variants = parse_value(path, value)?,
            "RETRIEVAL__FETCH_K" => self.retrieval.fetch_k = parse_value(path, value)?,
            "RETRIEVAL__TOP_N" => self.retrieval.top_n = parse_value(path, value)?,
            "RETRIEVAL__RERANKER_MODEL" => self.retrieval.reranker_model = value.to_string(),
            "RETRIEVAL__TIMEOUT_SECS" => self.retrieval.timeout_secs = parse_value(path, value)?,
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DocQaError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("docqa").join("config.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| DocQaError::InvalidConfigValue {
        path: path.to_string(),
        message: format!("Cannot parse '{}'", value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.retrieval.top_n = 4;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retrieval.top_n, 4);
        assert_eq!(loaded.chunking.chunk_size, 1000);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[_meta]\nschema_version = \"1.0.0\"\n\n[retrieval]\nfetch_k = 10\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.retrieval.fetch_k, 10);
        assert_eq!(config.retrieval.top_n, 6);
        assert_eq!(config.llm.provider, "ollama");
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load(Path::new("/nonexistent/docqa/config.toml"));
        assert!(matches!(result, Err(DocQaError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(vec![
            ("DOCQA_LLM__MODEL".to_string(), "qwen2.5:7b".to_string()),
            ("DOCQA_RETRIEVAL__TOP_N".to_string(), "3".to_string()),
            ("DOCQA_RETRIEVAL__FETCH_K".to_string(), "lots".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);

        assert_eq!(config.llm.model, "qwen2.5:7b");
        assert_eq!(config.retrieval.top_n, 3);
        assert_eq!(config.retrieval.fetch_k, 20);
    }

    #[test]
    fn test_defaults_are_validated_after_env_overrides() {
        let config = Config::from_defaults(vec![(
            "DOCQA_CHUNKING__TOKENS_PER_CHUNK".to_string(),
            "128".to_string(),
        )])
        .unwrap();
        assert_eq!(config.chunking.tokens_per_chunk, 128);
        assert_eq!(config.llm.base_url, DEFAULT_OLLAMA_URL);

        let result = Config::from_defaults(vec![(
            "DOCQA_RETRIEVAL__TOP_N".to_string(),
            "0".to_string(),
        )]);
        assert!(matches!(result, Err(DocQaError::ConfigValidation { .. })));
    }

    #[test]
    fn test_retrieval_overrides_are_validated() {
        let mut config = Config::default();
        config.override_retrieval(Some(3), Some(0)).unwrap();
        assert_eq!(config.retrieval.top_n, 3);
        assert_eq!(config.retrieval.num_variants, 0);

        let result = config.override_retrieval(Some(0), None);
        assert!(matches!(result, Err(DocQaError::ConfigValidation { .. })));
    }
}
