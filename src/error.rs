//! Error types for the retrieval QA pipeline.

use std::time::Duration;

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Invalid chunking parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkingError {
    #[error("chunk_size must be greater than zero")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },

    #[error("separator must not be empty")]
    EmptySeparator,
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding provider: {0}")]
    ConnectionError(String),

    #[error("embedding provider error: {0}")]
    ServerError(String),

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("cannot embed empty text")]
    EmptyInput,

    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("embedding timeout")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ServerError(msg) => is_transient_status(msg),
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            EmbeddingError::InvalidResponse(_)
            | EmbeddingError::EmptyInput
            | EmbeddingError::MissingApiKey(_) => false,
        }
    }
}

/// Errors reported by a vector index backend.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl Retryable for IndexError {
    fn is_retryable(&self) -> bool {
        matches!(self, IndexError::Unavailable(_))
    }
}

/// Errors related to answer generation.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation provider rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("generation blocked by content filter: {0}")]
    ContentFiltered(String),

    #[error("prompt exceeds the generator context length: {0}")]
    ContextLengthExceeded(String),

    #[error("generation provider error: {0}")]
    ServerError(String),

    #[error("generation request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: environment variable {0} is not set")]
    MissingApiKey(String),

    #[error("generation timeout")]
    Timeout,
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::RateLimited(_) | GenerationError::Timeout => true,
            GenerationError::ServerError(msg) => is_transient_status(msg),
            GenerationError::RequestError(e) => e.is_timeout() || e.is_connect(),
            GenerationError::ContentFiltered(_)
            | GenerationError::ContextLengthExceeded(_)
            | GenerationError::InvalidResponse(_)
            | GenerationError::MissingApiKey(_) => false,
        }
    }
}

/// Errors related to reading a source document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("document is too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("could not read {path} with any of the encodings: {}", tried.join(", "))]
    Unreadable { path: String, tried: Vec<String> },

    #[error("{0} looks like a binary file")]
    Binary(String),

    #[error("unknown encoding label: {0}")]
    UnknownEncoding(String),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Pipeline-level errors surfaced by `ingest` and `answer`.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid chunking configuration: {0}")]
    Chunking(#[from] ChunkingError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("{0}")]
    Index(#[from] IndexError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("unreadable document: {0}")]
    Document(#[from] DocumentError),

    #[error("document {document_id} produced no passages to index")]
    EmptyCorpus { document_id: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
}

impl PipelineError {
    /// True for errors raised by eager validation, before any external call.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Chunking(_) | PipelineError::InvalidConfig(_)
        )
    }
}

impl From<ConfigError> for PipelineError {
    fn from(err: ConfigError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}

impl Retryable for PipelineError {
    fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Embedding(e) => e.is_retryable(),
            PipelineError::Index(e) => e.is_retryable(),
            PipelineError::Generation(e) => e.is_retryable(),
            PipelineError::Timeout { .. } => true,
            PipelineError::Chunking(_)
            | PipelineError::InvalidConfig(_)
            | PipelineError::Document(_)
            | PipelineError::EmptyCorpus { .. } => false,
        }
    }
}

fn is_transient_status(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    msg.contains("429")
        || msg.contains("502")
        || msg.contains("503")
        || msg.contains("504")
        || lower.contains("unavailable")
        || lower.contains("too many requests")
}
