//! Ingestion and question answering over one vector index.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::{StreamExt, TryStreamExt, stream};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use super::chunker::TextChunker;
use super::context;
use super::embedding::{Embedder, InstructionType, create_embedder};
use super::generation::{Generator, create_generator};
use super::mmr;
use super::vector_index::{VectorIndex, create_index};
use crate::error::{IndexError, PipelineError};
use crate::models::{Answer, Config, EmbeddedPassage, IndexHandle, Passage};

const TRACING_TARGET: &str = "ragqa::pipeline";

type DocumentLocks = Mutex<HashMap<String, Arc<RwLock<()>>>>;

/// Retrieval-augmented QA pipeline.
///
/// Configuration is validated once in [`Pipeline::new`], so `ingest` and
/// `answer` never reach an external service with an invalid setup. The core
/// performs no retries; callers decide whether a failure is worth repeating.
pub struct Pipeline {
    config: Config,
    chunker: TextChunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    /// One lock per document id: ingestion writes, answering reads.
    locks: DocumentLocks,
}

/// A held per-document guard. Dropping it removes the document's map entry
/// when no other task refers to the lock.
struct DocumentGuard<'a, G> {
    locks: &'a DocumentLocks,
    document_id: String,
    guard: Option<G>,
}

impl<G> Drop for DocumentGuard<'_, G> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks
            .get(&self.document_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.document_id);
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("chunker", &self.chunker)
            .field("embedder", &self.embedder.model())
            .field("index", &self.index.name())
            .field("generator", &self.generator.model())
            .finish()
    }
}

impl Pipeline {
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, PipelineError> {
        let chunker = TextChunker::new(&config.chunking)?;
        config.validate()?;

        Ok(Self {
            config,
            chunker,
            embedder,
            index,
            generator,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Build a pipeline with the providers named in the configuration.
    pub fn from_config(config: Config) -> Result<Self, PipelineError> {
        TextChunker::new(&config.chunking)?;
        config.validate()?;

        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config.index)?;
        let generator = create_generator(&config.generation)?;
        Self::new(config, embedder, index, generator)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Chunk, embed and store a document, replacing anything previously
    /// stored under `document_id`.
    ///
    /// Nothing in the index changes unless every passage was embedded. A
    /// handle is only returned once the full passage set is stored.
    pub async fn ingest(
        &self,
        document_id: &str,
        text: &str,
    ) -> Result<IndexHandle, PipelineError> {
        let started = Instant::now();

        let passages = self.chunker.chunk(text);
        if passages.is_empty() {
            return Err(PipelineError::EmptyCorpus {
                document_id: document_id.to_string(),
            });
        }

        tracing::info!(
            target: TRACING_TARGET,
            document_id,
            passages = passages.len(),
            "Chunked document"
        );

        let embedded = self.embed_passages(passages).await?;
        let dimension = embedded.first().map_or(0, EmbeddedPassage::dimension);
        let count = embedded.len();

        let _guard = self.write_document(document_id).await;

        let index_timeout = self.config.index.timeout();
        timed("index delete", index_timeout, self.index.delete(document_id)).await?;

        if let Err(err) = timed(
            "index upsert",
            index_timeout,
            self.index.upsert(document_id, embedded),
        )
        .await
        {
            tracing::warn!(
                target: TRACING_TARGET,
                document_id,
                error = %err,
                "Upsert failed, removing partial passage set"
            );
            if let Err(cleanup) =
                timed("index delete", index_timeout, self.index.delete(document_id)).await
            {
                tracing::warn!(
                    target: TRACING_TARGET,
                    document_id,
                    error = %cleanup,
                    "Cleanup after failed upsert also failed"
                );
            }
            return Err(err);
        }

        tracing::info!(
            target: TRACING_TARGET,
            document_id,
            passages = count,
            dimension,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingested document"
        );

        Ok(IndexHandle {
            document_id: document_id.to_string(),
            passages: count,
            dimension,
        })
    }

    /// Answer a question from the passages of an ingested document.
    ///
    /// An empty candidate pool is not an error: the generator receives the
    /// no-context prompt and is expected to reply with its fallback phrase.
    pub async fn answer(
        &self,
        question: &str,
        handle: &IndexHandle,
    ) -> Result<Answer, PipelineError> {
        let started = Instant::now();
        let retrieval = &self.config.retrieval;

        let _guard = self.read_document(&handle.document_id).await;

        let query = timed(
            "question embedding",
            self.config.embedding.timeout(),
            self.embedder.embed(question, InstructionType::Query),
        )
        .await?;

        if handle.dimension != 0 && handle.dimension != query.len() {
            return Err(IndexError::DimensionMismatch {
                expected: handle.dimension,
                actual: query.len(),
            }
            .into());
        }

        let pool = timed(
            "index query",
            self.config.index.timeout(),
            self.index
                .query(&handle.document_id, &query, retrieval.fetch_k),
        )
        .await?;
        let pool_size = pool.len();

        let passages: Vec<Passage> = mmr::select(&query, pool, retrieval.k, retrieval.lambda_mult)
            .into_iter()
            .map(|selected| selected.passage)
            .collect();

        if passages.is_empty() {
            tracing::warn!(
                target: TRACING_TARGET,
                document_id = %handle.document_id,
                "No passages retrieved, answering without context"
            );
        } else {
            tracing::debug!(
                target: TRACING_TARGET,
                document_id = %handle.document_id,
                pool = pool_size,
                selected = passages.len(),
                "Selected passages"
            );
        }

        let prompt = context::assemble(question, &passages);
        let text = timed(
            "generation",
            self.config.generation.timeout(),
            self.generator.generate(&prompt),
        )
        .await?;

        Ok(Answer {
            question: question.to_string(),
            text,
            passages,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Embed passages with bounded concurrency, keeping document order.
    async fn embed_passages(
        &self,
        passages: Vec<Passage>,
    ) -> Result<Vec<EmbeddedPassage>, PipelineError> {
        let concurrency = self.config.embedding.concurrency.max(1);
        let after = self.config.embedding.timeout();
        let embedder = &self.embedder;

        let embedded: Vec<EmbeddedPassage> = stream::iter(passages)
            .map(|passage| async move {
                let vector = timed(
                    "passage embedding",
                    after,
                    embedder.embed(&passage.text, InstructionType::Document),
                )
                .await?;
                Ok::<_, PipelineError>(EmbeddedPassage::new(passage, vector))
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        if let Some(first) = embedded.first() {
            let expected = first.dimension();
            if let Some(bad) = embedded.iter().find(|e| e.dimension() != expected) {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: bad.dimension(),
                }
                .into());
            }
        }

        Ok(embedded)
    }

    fn document_lock(&self, document_id: &str) -> Arc<RwLock<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(document_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    async fn write_document(
        &self,
        document_id: &str,
    ) -> DocumentGuard<'_, OwnedRwLockWriteGuard<()>> {
        let guard = self.document_lock(document_id).write_owned().await;
        DocumentGuard {
            locks: &self.locks,
            document_id: document_id.to_string(),
            guard: Some(guard),
        }
    }

    async fn read_document(&self, document_id: &str) -> DocumentGuard<'_, OwnedRwLockReadGuard<()>> {
        let guard = self.document_lock(document_id).read_owned().await;
        DocumentGuard {
            locks: &self.locks,
            document_id: document_id.to_string(),
            guard: Some(guard),
        }
    }
}

/// Bound an external call, mapping elapsed deadlines to [`PipelineError::Timeout`].
async fn timed<T, E>(
    operation: &'static str,
    after: Duration,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, PipelineError>
where
    PipelineError: From<E>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result.map_err(PipelineError::from),
        Err(_) => {
            tracing::warn!(
                target: TRACING_TARGET,
                operation,
                after_ms = after.as_millis() as u64,
                "External call timed out"
            );
            Err(PipelineError::Timeout { operation, after })
        }
    }
}
