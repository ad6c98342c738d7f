mod answer;
mod config;
mod passage;

pub use answer::{Answer, OutputFormat};
pub use config::{
    ChunkingConfig, Config, DEFAULT_API_KEY_ENV, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_MODEL,
    DEFAULT_GEMINI_URL, DEFAULT_GENERATION_MODEL, DEFAULT_QDRANT_URL, DEFAULT_SYSTEM_PROMPT,
    DocumentConfig, EmbeddingConfig, EmbeddingProvider, GenerationConfig, IndexConfig,
    IndexDriver, RetrievalConfig, RetrySettings,
};
pub use passage::{EmbeddedPassage, IndexHandle, Passage};
