use crate::error::{IndexError, ProviderError, StoreError};
use crate::models::{Chunk, IndexedEntry, Judgment, ScoredEntry};
use async_trait::async_trait;
use std::path::Path;

/// Converts a raw document into an ordered chunk sequence with provenance
/// metadata. Must be deterministic for a fixed document and configuration.
pub trait ChunkExtractor {
    fn extract(&self, document: &Path) -> Result<Vec<Chunk>, IndexError>;
}

/// Maps text to a fixed-dimension vector. `dimension` is constant for a
/// given provider instance; callers may invoke `embed` concurrently.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Scores (query, passage) pairs. The returned scores are aligned by
/// position with the input passages.
#[async_trait]
pub trait ReRankProvider: Send + Sync {
    async fn rerank(&self, query: &str, passages: &[String]) -> Result<Vec<f32>, ProviderError>;
}

/// Scores a produced answer against the expected answer.
#[async_trait]
pub trait JudgeProvider: Send + Sync {
    async fn judge(
        &self,
        question: &str,
        answer: &str,
        expected_answer: &str,
    ) -> Result<Judgment, ProviderError>;
}

/// A chat-completion backend used for answer synthesis and judging.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

/// Persists entries keyed by `source_key` and serves nearest-neighbor
/// lookups.
///
/// Contract: `upsert` replaces rows sharing a key instead of duplicating
/// them, and a batch is observable in full by the next `search` issued from
/// the same call sequence. `search` orders by ascending distance with ties
/// broken by insertion order. `reset` is safe on a store that does not exist
/// yet and destructive otherwise.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn ensure_schema(&self, dimension: usize) -> Result<(), StoreError>;

    async fn upsert(&self, entries: Vec<IndexedEntry>) -> Result<(), StoreError>;

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, StoreError>;

    async fn reset(&self) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}
