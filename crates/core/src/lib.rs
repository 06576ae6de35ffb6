pub mod chunking;
pub mod config;
pub mod error;
pub mod eval;
pub mod extractor;
pub mod indexer;
pub mod models;
pub mod providers;
pub mod response;
pub mod retriever;
pub mod stores;
pub mod traits;

pub use chunking::{
    accumulate_paragraphs, chunks_from_pages, normalize_whitespace, ChunkingConfig,
    PdfChunkExtractor,
};
pub use config::{ChatBackend, EvalConfig, FailurePolicy, IndexerConfig, RetrieverConfig};
pub use error::{EvalError, IndexError, ProviderError, RetrievalError, StoreError};
pub use eval::{EvaluationHarness, QueryPipeline};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use indexer::{digest_file, discover_documents, fingerprint_document, Indexer};
pub use models::{
    make_source_key, BoundingRegion, Chunk, ChunkMetadata, DocumentFingerprint, EvaluationRecord,
    EvaluationReport, IndexedEntry, Judgment, QuestionPair, ScoredEntry, SearchResult,
};
pub use providers::{ChatClient, ChatJudge, CohereReRanker, OpenAiEmbedder};
pub use response::{format_citations, AnsweringPipeline, ChatResponder, ResponseGenerator};
pub use retriever::Retriever;
pub use stores::{MemoryStore, QdrantStore};
pub use traits::{
    ChatProvider, ChunkExtractor, EmbeddingProvider, JudgeProvider, ReRankProvider, VectorStore,
};
