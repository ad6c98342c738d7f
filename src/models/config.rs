use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChunkingError, ConfigError};

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EMBEDDING_MODEL: &str = "models/embedding-001";
pub const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "ragqa_passages";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant specialized in analyzing literature.";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub document: DocumentConfig,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ragqa").join("config.toml"))
    }

    pub fn load() -> Result<Self, ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            return Self::load_from(&path);
        }
        Ok(Self::default())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Write a default config file. Refuses to overwrite unless `force`.
    pub fn init(force: bool) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        if path.exists() && !force {
            return Err(ConfigError::PathError(format!(
                "config already exists at {}",
                path.display()
            )));
        }
        Self::default().save_to(&path)?;
        Ok(path)
    }

    /// Eager checks run before any external call is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.retrieval.validate()?;

        if self.embedding.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "embedding.concurrency must be at least 1".to_string(),
            ));
        }
        for (section, secs) in [
            ("embedding", self.embedding.timeout_secs),
            ("index", self.index.timeout_secs),
            ("generation", self.generation.timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{section}.timeout_secs must be at least 1"
                )));
            }
        }
        if self.document.encodings.is_empty() {
            return Err(ConfigError::ValidationError(
                "document.encodings must list at least one encoding".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum passage length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Trailing characters of a passage repeated at the start of the next.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_separator() -> String {
    "\n".to_string()
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separator: default_separator(),
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ChunkingError> {
        if self.chunk_size == 0 {
            return Err(ChunkingError::ZeroChunkSize);
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: self.chunk_overlap,
                size: self.chunk_size,
            });
        }
        if self.separator.is_empty() {
            return Err(ChunkingError::EmptySeparator);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages finally selected.
    #[serde(default = "default_k")]
    pub k: usize,

    /// Candidate pool size fetched from the index.
    #[serde(default = "default_fetch_k")]
    pub fetch_k: usize,

    /// 1.0 ranks purely by relevance, 0.0 purely by diversity.
    #[serde(default = "default_lambda_mult")]
    pub lambda_mult: f32,
}

fn default_k() -> usize {
    5
}

fn default_fetch_k() -> usize {
    8
}

fn default_lambda_mult() -> f32 {
    0.7
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            fetch_k: default_fetch_k(),
            lambda_mult: default_lambda_mult(),
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.k == 0 {
            return Err(ConfigError::ValidationError(
                "k must be at least 1".to_string(),
            ));
        }
        if self.k > self.fetch_k {
            return Err(ConfigError::ValidationError(format!(
                "k ({}) must not exceed fetch_k ({})",
                self.k, self.fetch_k
            )));
        }
        if !(0.0..=1.0).contains(&self.lambda_mult) {
            return Err(ConfigError::ValidationError(format!(
                "lambda_mult must be between 0.0 and 1.0, got {}",
                self.lambda_mult
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    Gemini,
    /// text-embeddings-inference compatible `/embed` endpoint
    Http,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingProvider::Gemini => write!(f, "gemini"),
            EmbeddingProvider::Http => write!(f, "http"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingProvider,

    #[serde(default = "default_gemini_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Maximum embedding requests in flight during ingestion.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_gemini_url() -> String {
    DEFAULT_GEMINI_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_embedding_timeout() -> u64 {
    60
}

fn default_concurrency() -> usize {
    4
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            url: default_gemini_url(),
            model: default_embedding_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_embedding_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexDriver {
    /// In-process exact search, lost on exit
    #[default]
    Memory,
    Qdrant,
}

impl std::fmt::Display for IndexDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexDriver::Memory => write!(f, "memory"),
            IndexDriver::Qdrant => write!(f, "qdrant"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub driver: IndexDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_index_timeout() -> u64 {
    30
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            driver: IndexDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            timeout_secs: default_index_timeout(),
        }
    }
}

impl IndexConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_gemini_url")]
    pub url: String,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_generation_timeout() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            url: default_gemini_url(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            system_prompt: default_system_prompt(),
            temperature: None,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Encoding labels tried in order when decoding a document.
    #[serde(default = "default_encodings")]
    pub encodings: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_encodings() -> Vec<String> {
    vec!["utf-8".to_string(), "windows-1252".to_string()]
}

fn default_max_file_size() -> u64 {
    64 * 1024 * 1024
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            encodings: default_encodings(),
            max_file_size: default_max_file_size(),
        }
    }
}

/// Caller-side retry settings; the pipeline itself never retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    200
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.chunking.separator, "\n");
        assert_eq!(config.retrieval.k, 5);
        assert_eq!(config.retrieval.fetch_k, 8);
        assert!((config.retrieval.lambda_mult - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.index.driver, IndexDriver::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let chunking = ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
            ..Default::default()
        };
        assert_eq!(
            chunking.validate(),
            Err(ChunkingError::OverlapTooLarge {
                overlap: 100,
                size: 100
            })
        );
    }

    #[test]
    fn test_fetch_k_smaller_than_k_is_rejected() {
        let retrieval = RetrievalConfig {
            k: 5,
            fetch_k: 3,
            ..Default::default()
        };
        assert!(retrieval.validate().is_err());
    }

    #[test]
    fn test_lambda_out_of_range_is_rejected() {
        for lambda_mult in [-0.1, 1.5, f32::NAN] {
            let retrieval = RetrievalConfig {
                lambda_mult,
                ..Default::default()
            };
            assert!(retrieval.validate().is_err(), "accepted {lambda_mult}");
        }
    }

    #[test]
    fn test_zero_timeouts_are_rejected() {
        let mut config = Config::default();
        config.embedding.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.index.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("generation.timeout_secs"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [retrieval]
            k = 3

            [index]
            driver = "qdrant"
            "#,
        )
        .unwrap();
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.retrieval.fetch_k, 8);
        assert_eq!(config.index.driver, IndexDriver::Qdrant);
        assert_eq!(config.index.collection, DEFAULT_COLLECTION);
    }

    #[test]
    fn test_save_and_load_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.chunking.chunk_size = 400;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.chunking.chunk_size, 400);
    }
}
