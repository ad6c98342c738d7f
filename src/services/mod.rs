mod chunker;
pub mod context;
mod embedding;
mod generation;
pub mod mmr;
mod pipeline;
mod vector_index;

pub use chunker::TextChunker;
pub use embedding::{Embedder, GeminiEmbedder, HttpEmbedder, InstructionType, create_embedder};
pub use generation::{GeminiGenerator, Generator, create_generator};
pub use pipeline::Pipeline;
pub use vector_index::{MemoryIndex, QdrantIndex, VectorIndex, create_index};
