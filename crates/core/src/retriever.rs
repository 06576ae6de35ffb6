use crate::config::RetrieverConfig;
use crate::error::{ProviderError, RetrievalError};
use crate::models::SearchResult;
use crate::traits::{EmbeddingProvider, ReRankProvider, VectorStore};
use tracing::debug;

/// Two-stage retrieval: cheap vector search over an overfetched candidate
/// set, then cross-encoder re-ranking down to the final `top_k`.
pub struct Retriever<E, R, S> {
    embedder: E,
    reranker: R,
    store: S,
    config: RetrieverConfig,
}

impl<E, R, S> Retriever<E, R, S>
where
    E: EmbeddingProvider,
    R: ReRankProvider,
    S: VectorStore,
{
    pub fn new(embedder: E, reranker: R, store: S, config: RetrieverConfig) -> Result<Self, RetrievalError> {
        if config.top_k == 0 {
            return Err(RetrievalError::InvalidConfiguration(
                "top_k must be positive".to_string(),
            ));
        }
        if config.overfetch_factor == 0 {
            return Err(RetrievalError::InvalidConfiguration(
                "overfetch_factor must be positive".to_string(),
            ));
        }

        Ok(Self {
            embedder,
            reranker,
            store,
            config,
        })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, RetrievalError> {
        self.search_top_k(query, self.config.top_k).await
    }

    /// Returns at most `top_k` results ordered by descending relevance
    /// score. Exact ties keep their stage-1 vector-search rank.
    pub async fn search_top_k(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, RetrievalError> {
        if top_k == 0 {
            return Err(RetrievalError::InvalidConfiguration(
                "top_k must be positive".to_string(),
            ));
        }

        let query_vector = self
            .timed(self.embedder.embed(query), "embedding")
            .await
            .map_err(RetrievalError::Embedding)?;

        // Stage 1 must complete before stage 2: the re-ranker needs the
        // full candidate set.
        let candidate_count = top_k * self.config.overfetch_factor;
        let candidates = self.store.search(&query_vector, candidate_count).await?;

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let passages: Vec<String> = candidates
            .iter()
            .map(|candidate| candidate.entry.content.clone())
            .collect();

        let scores = self
            .timed(self.reranker.rerank(query, &passages), "rerank")
            .await
            .map_err(RetrievalError::ReRank)?;

        if scores.len() != candidates.len() {
            return Err(RetrievalError::ReRank(ProviderError::Contract {
                provider: "reranker".to_string(),
                details: format!(
                    "got {} scores for {} passages",
                    scores.len(),
                    candidates.len()
                ),
            }));
        }

        let mut ranked: Vec<(usize, f32)> = scores.into_iter().enumerate().collect();
        // Stable sort: equal scores fall back to stage-1 rank.
        ranked.sort_by(|left, right| right.1.total_cmp(&left.1));
        ranked.truncate(top_k);

        debug!(
            candidates = candidates.len(),
            returned = ranked.len(),
            "two-stage retrieval complete"
        );

        let mut by_position: Vec<Option<_>> = candidates.into_iter().map(Some).collect();
        Ok(ranked
            .into_iter()
            .filter_map(|(position, score)| {
                by_position[position]
                    .take()
                    .map(|candidate| SearchResult::from_entry(candidate.entry, score))
            })
            .collect())
    }

    async fn timed<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, ProviderError>>,
        provider: &str,
    ) -> Result<T, ProviderError> {
        match tokio::time::timeout(self.config.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                provider: provider.to_string(),
                elapsed_ms: self.config.request_timeout.as_millis() as u64,
            }),
        }
    }
}
