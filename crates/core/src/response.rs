use crate::error::ProviderError;
use crate::eval::QueryPipeline;
use crate::models::SearchResult;
use crate::retriever::Retriever;
use crate::traits::{ChatProvider, EmbeddingProvider, ReRankProvider, VectorStore};
use async_trait::async_trait;

pub const ANSWER_SYSTEM_PROMPT: &str = "\
Use the provided context to provide a concise answer to the user's question.
If you cannot find the answer in the context, say so. Do not make up information.";

/// Synthesizes a grounded answer from retrieved chunks.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        query: &str,
        results: &[SearchResult],
    ) -> Result<String, ProviderError>;
}

/// Chat-completion answer synthesis with a citation block appended.
pub struct ChatResponder<C> {
    chat: C,
}

impl<C: ChatProvider> ChatResponder<C> {
    pub fn new(chat: C) -> Self {
        Self { chat }
    }
}

#[async_trait]
impl<C: ChatProvider> ResponseGenerator for ChatResponder<C> {
    async fn generate(
        &self,
        query: &str,
        results: &[SearchResult],
    ) -> Result<String, ProviderError> {
        let context_text = results
            .iter()
            .map(|result| result.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let user_message =
            format!("<context>\n{context_text}\n</context>\n<question>\n{query}\n</question>");

        let answer = self.chat.complete(ANSWER_SYSTEM_PROMPT, &user_message).await?;
        Ok(format!("{answer}{}", format_citations(results)))
    }
}

/// Numbered source citations: filename, page, heading path, relevance, and
/// a single-line content preview.
pub fn format_citations(results: &[SearchResult]) -> String {
    let mut sources = String::from("\n\nSources Used:");

    for (number, result) in results.iter().enumerate() {
        let page_info = result
            .page_no
            .map(|page| format!(", Page: {page}"))
            .unwrap_or_default();

        let section_info = if result.headings.is_empty() {
            String::new()
        } else {
            format!(", Section: \"{}\"", result.headings.join(" > "))
        };

        let score_info = if result.relevance_score > 0.0 {
            format!(" (Relevance: {:.3})", result.relevance_score)
        } else {
            String::new()
        };

        let mut preview: String = result.content.chars().take(150).collect();
        if result.content.chars().count() > 150 {
            preview.push_str("...");
        }
        let preview = preview.replace('\n', " ");

        sources.push_str(&format!(
            "\n{}. Document: {}{page_info}{section_info}{score_info}\n   Text: \"{preview}\"",
            number + 1,
            result.filename(),
        ));
    }

    sources
}

/// Retrieval plus answer synthesis, as one pipeline the evaluation harness
/// can drive.
pub struct AnsweringPipeline<E, R, S, G> {
    retriever: Retriever<E, R, S>,
    generator: G,
}

impl<E, R, S, G> AnsweringPipeline<E, R, S, G> {
    pub fn new(retriever: Retriever<E, R, S>, generator: G) -> Self {
        Self {
            retriever,
            generator,
        }
    }
}

#[async_trait]
impl<E, R, S, G> QueryPipeline for AnsweringPipeline<E, R, S, G>
where
    E: EmbeddingProvider,
    R: ReRankProvider,
    S: VectorStore,
    G: ResponseGenerator,
{
    async fn answer(&self, question: &str) -> anyhow::Result<String> {
        let results = self.retriever.search(question).await?;
        Ok(self.generator.generate(question, &results).await?)
    }
}
