use std::time::Duration;

/// Which chat-completion backend answers and judges run against. Resolved
/// once at startup; components never read ambient configuration mid-call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatBackend {
    OpenAiCompatible { endpoint: String, model: String },
    Cerebras { model: String },
}

impl ChatBackend {
    pub const CEREBRAS_ENDPOINT: &'static str = "https://api.cerebras.ai/v1";

    pub fn endpoint(&self) -> &str {
        match self {
            Self::OpenAiCompatible { endpoint, .. } => endpoint,
            Self::Cerebras { .. } => Self::CEREBRAS_ENDPOINT,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAiCompatible { model, .. } | Self::Cerebras { model } => model,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Upper bound on concurrently outstanding embedding calls.
    pub max_concurrency: usize,
    /// Deadline applied to each embedding call.
    pub request_timeout: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    pub top_k: usize,
    /// Stage-1 fetches `top_k * overfetch_factor` candidates to compensate
    /// for the coarser similarity signal of the embedding space.
    pub overfetch_factor: usize,
    pub request_timeout: Duration,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            overfetch_factor: 3,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record a unit failure as an incorrect answer and keep going.
    BestEffort,
    /// Abort the whole run on the first unit failure.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub max_concurrency: usize,
    pub policy: FailurePolicy,
    /// Deadline applied separately to the pipeline call and the judge call
    /// of each unit.
    pub request_timeout: Duration,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            policy: FailurePolicy::BestEffort,
            request_timeout: Duration::from_secs(120),
        }
    }
}
