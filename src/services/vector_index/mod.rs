//! Vector index abstraction layer.
//!
//! The pipeline only needs three things from an index: replace a document's
//! passages, drop them, and fetch the top-K most similar passages for a
//! query vector. Backends are selected by configuration.

mod memory;
mod qdrant;

pub use memory::MemoryIndex;
pub use qdrant::QdrantIndex;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IndexError;
use crate::models::{EmbeddedPassage, IndexConfig, IndexDriver};

/// Abstract trait for vector index operations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Check if the index is reachable.
    async fn health_check(&self) -> Result<bool, IndexError>;

    /// Store passages for a document. Callers delete first for a full replace.
    async fn upsert(
        &self,
        document_id: &str,
        passages: Vec<EmbeddedPassage>,
    ) -> Result<(), IndexError>;

    /// Remove every passage of a document.
    async fn delete(&self, document_id: &str) -> Result<(), IndexError>;

    /// Up to `fetch_k` passages of a document, most similar first, with vectors.
    async fn query(
        &self,
        document_id: &str,
        vector: &[f32],
        fetch_k: usize,
    ) -> Result<Vec<EmbeddedPassage>, IndexError>;

    /// Number of passages stored for a document.
    async fn count(&self, document_id: &str) -> Result<u64, IndexError>;

    /// Backend name, for logs and status output.
    fn name(&self) -> &'static str;
}

/// Create an index backend based on configuration.
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>, IndexError> {
    match config.driver {
        IndexDriver::Memory => Ok(Arc::new(MemoryIndex::new())),
        IndexDriver::Qdrant => Ok(Arc::new(QdrantIndex::new(config)?)),
    }
}

/// All vectors in a batch must share one dimension.
fn batch_dimension(passages: &[EmbeddedPassage]) -> Result<Option<usize>, IndexError> {
    let Some(first) = passages.first() else {
        return Ok(None);
    };
    let expected = first.dimension();
    if let Some(bad) = passages.iter().find(|p| p.dimension() != expected) {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: bad.dimension(),
        });
    }
    Ok(Some(expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Passage;

    #[test]
    fn test_batch_dimension() {
        let ok = vec![
            EmbeddedPassage::new(Passage::new(0, "a", 0), vec![1.0, 0.0]),
            EmbeddedPassage::new(Passage::new(1, "b", 2), vec![0.0, 1.0]),
        ];
        assert_eq!(batch_dimension(&ok).unwrap(), Some(2));
        assert_eq!(batch_dimension(&[]).unwrap(), None);

        let mixed = vec![
            EmbeddedPassage::new(Passage::new(0, "a", 0), vec![1.0, 0.0]),
            EmbeddedPassage::new(Passage::new(1, "b", 2), vec![0.0, 1.0, 0.0]),
        ];
        assert!(matches!(
            batch_dimension(&mixed),
            Err(IndexError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_create_memory_index() {
        let index = create_index(&IndexConfig::default()).unwrap();
        assert_eq!(index.name(), "memory");
    }
}
