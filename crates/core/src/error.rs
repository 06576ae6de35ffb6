use thiserror::Error;

/// Failures surfaced by a remote provider (embedding, rerank, chat, judge).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} call timed out after {elapsed_ms}ms")]
    Timeout { provider: String, elapsed_ms: u64 },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned an error response: {details}")]
    Backend { provider: String, details: String },

    #[error("{provider} violated its response contract: {details}")]
    Contract { provider: String, details: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("stored vector dimension {stored} does not match requested dimension {requested}")]
    SchemaMismatch { stored: usize, requested: usize },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("embedding failed for {} chunk(s), no entries were written: [{}]", failed_keys.len(), failed_keys.join(", "))]
    EmbeddingBatch { failed_keys: Vec<String> },

    #[error("embedding worker failed: {0}")]
    Worker(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("query embedding failed: {0}")]
    Embedding(#[source] ProviderError),

    #[error("re-ranking failed: {0}")]
    ReRank(#[source] ProviderError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("evaluation aborted at question {index}: {reason}")]
    Aborted { index: usize, reason: String },

    #[error("evaluation worker failed: {0}")]
    Worker(String),
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
