//! Retrieval-augmented question answering over a single long document.
//!
//! A document is split into overlapping passages ([`services::TextChunker`]),
//! embedded and stored in a vector index, and questions are answered from a
//! relevant yet diverse subset of passages chosen by Maximal Marginal
//! Relevance ([`services::mmr`]). [`services::Pipeline`] ties the pieces
//! together behind `ingest` and `answer`.

pub mod cli;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use error::PipelineError;
pub use models::{Answer, Config, IndexHandle, OutputFormat, Passage};
pub use services::Pipeline;
