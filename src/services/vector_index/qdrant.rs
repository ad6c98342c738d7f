//! Qdrant vector index backend.

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    Filter, PointStruct, ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value,
    VectorParamsBuilder,
};
use tokio::sync::OnceCell;

use super::{VectorIndex, batch_dimension};
use crate::error::IndexError;
use crate::models::{EmbeddedPassage, IndexConfig, Passage};

const TRACING_TARGET: &str = "ragqa::index::qdrant";

/// Passages of all documents share one collection, scoped by a
/// `document_id` payload field.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
    /// Collection vector size, resolved on first use.
    dimension: OnceCell<usize>,
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("collection", &self.collection)
            .field("dimension", &self.dimension.get())
            .finish()
    }
}

impl QdrantIndex {
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let mut builder = Qdrant::from_url(&config.url).timeout(config.timeout());

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| IndexError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            dimension: OnceCell::new(),
        })
    }

    /// Vector size of the existing collection, `None` if it does not exist.
    async fn existing_dimension(&self) -> Result<Option<usize>, IndexError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(unavailable)?;
        if !exists {
            return Ok(None);
        }

        let info = self
            .client
            .collection_info(&self.collection)
            .await
            .map_err(unavailable)?;

        let size = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config)
            .and_then(|c| match c {
                VectorsConfigKind::Params(params) => Some(params.size as usize),
                VectorsConfigKind::ParamsMap(_) => None,
            })
            .ok_or_else(|| {
                IndexError::Unavailable(format!(
                    "collection {} has no single unnamed vector",
                    self.collection
                ))
            })?;

        Ok(Some(size))
    }

    /// Make sure the collection exists with `dimension`-sized cosine vectors.
    async fn ensure_collection(&self, dimension: usize) -> Result<(), IndexError> {
        let expected = *self
            .dimension
            .get_or_try_init(|| self.open_or_create(dimension))
            .await?;

        check_dimension(expected, dimension)
    }

    async fn open_or_create(&self, dimension: usize) -> Result<usize, IndexError> {
        if let Some(size) = self.existing_dimension().await? {
            return Ok(size);
        }

        tracing::info!(
            target: TRACING_TARGET,
            collection = %self.collection,
            dimension,
            "Creating collection"
        );

        let create = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(dimension as u64, Distance::Cosine));
        self.client
            .create_collection(create)
            .await
            .map_err(unavailable)?;
        Ok(dimension)
    }

    fn document_filter(document_id: &str) -> Filter {
        Filter::must([Condition::matches("document_id", document_id.to_string())])
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn health_check(&self) -> Result<bool, IndexError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(unavailable)
    }

    async fn upsert(
        &self,
        document_id: &str,
        passages: Vec<EmbeddedPassage>,
    ) -> Result<(), IndexError> {
        let Some(dimension) = batch_dimension(&passages)? else {
            return Ok(());
        };
        self.ensure_collection(dimension).await?;

        let count = passages.len();
        let points: Vec<PointStruct> = passages
            .into_iter()
            .map(|embedded| {
                let id = embedded.point_id(document_id);
                let EmbeddedPassage { passage, vector } = embedded;
                PointStruct::new(id, vector, passage_payload(document_id, passage))
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(unavailable)?;

        tracing::debug!(
            target: TRACING_TARGET,
            document_id,
            points = count,
            "Upserted passages"
        );
        Ok(())
    }

    async fn delete(&self, document_id: &str) -> Result<(), IndexError> {
        if !self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(unavailable)?
        {
            return Ok(());
        }

        let delete = DeletePointsBuilder::new(&self.collection)
            .points(Self::document_filter(document_id))
            .wait(true);

        self.client.delete_points(delete).await.map_err(unavailable)?;
        Ok(())
    }

    async fn query(
        &self,
        document_id: &str,
        vector: &[f32],
        fetch_k: usize,
    ) -> Result<Vec<EmbeddedPassage>, IndexError> {
        let expected = match self.dimension.get() {
            Some(size) => *size,
            None => match self.existing_dimension().await? {
                Some(size) => *self.dimension.get_or_init(|| async { size }).await,
                // nothing was ever stored
                None => return Ok(Vec::new()),
            },
        };
        check_dimension(expected, vector.len())?;

        let search = SearchPointsBuilder::new(&self.collection, vector.to_vec(), fetch_k as u64)
            .filter(Self::document_filter(document_id))
            .with_payload(true)
            .with_vectors(true);

        let response = self
            .client
            .search_points(search)
            .await
            .map_err(unavailable)?;

        response
            .result
            .into_iter()
            .map(scored_to_embedded)
            .collect()
    }

    async fn count(&self, document_id: &str) -> Result<u64, IndexError> {
        if !self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(unavailable)?
        {
            return Ok(0);
        }

        let count = CountPointsBuilder::new(&self.collection)
            .filter(Self::document_filter(document_id))
            .exact(true);

        let response = self.client.count(count).await.map_err(unavailable)?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    fn name(&self) -> &'static str {
        "qdrant"
    }
}

fn unavailable(e: qdrant_client::QdrantError) -> IndexError {
    IndexError::Unavailable(e.to_string())
}

fn check_dimension(expected: usize, actual: usize) -> Result<(), IndexError> {
    if expected != actual {
        return Err(IndexError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

fn passage_payload(document_id: &str, passage: Passage) -> HashMap<String, Value> {
    let mut payload: HashMap<String, Value> = HashMap::new();
    payload.insert("document_id".to_string(), document_id.to_string().into());
    payload.insert("passage_id".to_string(), i64::from(passage.id).into());
    payload.insert("text".to_string(), passage.text.into());
    payload.insert(
        "source_offset".to_string(),
        (passage.source_offset as i64).into(),
    );
    payload.insert(
        "overlap_chars".to_string(),
        i64::from(passage.overlap_chars).into(),
    );
    payload
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        _ => None,
    })
}

fn payload_int(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
    payload.get(key).and_then(|v| match &v.kind {
        Some(Kind::IntegerValue(n)) => Some(*n),
        _ => None,
    })
}

fn scored_to_embedded(point: ScoredPoint) -> Result<EmbeddedPassage, IndexError> {
    let payload = &point.payload;
    let malformed = |field: &str| {
        IndexError::Unavailable(format!("stored point is missing payload field {field}"))
    };

    let passage = Passage {
        id: payload_int(payload, "passage_id").ok_or_else(|| malformed("passage_id"))? as u32,
        text: payload_str(payload, "text").ok_or_else(|| malformed("text"))?,
        source_offset: payload_int(payload, "source_offset").unwrap_or(0) as u64,
        overlap_chars: payload_int(payload, "overlap_chars").unwrap_or(0) as u32,
    };

    let vector = point
        .vectors
        .and_then(|v| match v.vectors_options {
            #[allow(deprecated)]
            Some(VectorsOptions::Vector(vector)) => Some(vector.data),
            _ => None,
        })
        .ok_or_else(|| malformed("vector"))?;

    Ok(EmbeddedPassage::new(passage, vector))
}
