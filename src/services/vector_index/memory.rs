//! In-process exact-search index.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{VectorIndex, batch_dimension};
use crate::error::IndexError;
use crate::models::EmbeddedPassage;
use crate::services::mmr::cosine_similarity;

#[derive(Debug, Default)]
struct State {
    /// Fixed by the first stored vector, shared by every document.
    dimension: Option<usize>,
    documents: HashMap<String, Vec<EmbeddedPassage>>,
}

/// Brute-force cosine index held in memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: RwLock<State>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> IndexError {
        IndexError::Unavailable("memory index lock poisoned".to_string())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(!self.state.is_poisoned())
    }

    async fn upsert(
        &self,
        document_id: &str,
        passages: Vec<EmbeddedPassage>,
    ) -> Result<(), IndexError> {
        let Some(dimension) = batch_dimension(&passages)? else {
            return Ok(());
        };

        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        match state.dimension {
            Some(expected) if expected != dimension => {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: dimension,
                });
            }
            Some(_) => {}
            None => state.dimension = Some(dimension),
        }

        let stored = state.documents.entry(document_id.to_string()).or_default();
        for passage in passages {
            match stored.iter_mut().find(|p| p.passage.id == passage.passage.id) {
                Some(existing) => *existing = passage,
                None => stored.push(passage),
            }
        }
        stored.sort_by_key(|p| p.passage.id);
        Ok(())
    }

    async fn delete(&self, document_id: &str) -> Result<(), IndexError> {
        let mut state = self.state.write().map_err(|_| Self::poisoned())?;
        state.documents.remove(document_id);
        if state.documents.is_empty() {
            state.dimension = None;
        }
        Ok(())
    }

    async fn query(
        &self,
        document_id: &str,
        vector: &[f32],
        fetch_k: usize,
    ) -> Result<Vec<EmbeddedPassage>, IndexError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;

        if let Some(expected) = state.dimension
            && expected != vector.len()
        {
            return Err(IndexError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let Some(stored) = state.documents.get(document_id) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(f32, &EmbeddedPassage)> = stored
            .iter()
            .map(|p| (cosine_similarity(vector, &p.vector), p))
            .collect();
        // stable: equal scores keep passage order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(fetch_k)
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn count(&self, document_id: &str) -> Result<u64, IndexError> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state
            .documents
            .get(document_id)
            .map_or(0, |passages| passages.len() as u64))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
