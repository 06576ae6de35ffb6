use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Page-relative geometry of a chunk, when the extractor can provide one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub page_no: Option<u32>,
    pub headings: Vec<String>,
    pub bounding_region: Option<BoundingRegion>,
    pub chunk_index: u64,
}

/// A bounded unit of extracted document text with structural provenance.
///
/// `source_key` is derived deterministically from filename, page, and chunk
/// index, so re-indexing an unmodified document reproduces the same keys and
/// overwrites instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source_key: String,
    pub metadata: ChunkMetadata,
}

pub fn make_source_key(filename: &str, page_no: Option<u32>, chunk_index: u64) -> String {
    match page_no {
        Some(page) => format!("{filename}:page_{page}:chunk_{chunk_index}"),
        None => format!("{filename}:chunk_{chunk_index}"),
    }
}

/// A persisted row in the vector store, keyed by `source_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub source_key: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A store hit before re-ranking. Lower distance means closer.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: IndexedEntry,
    pub distance: f32,
}

/// A retrieval result after re-ranking. Scores are comparable only within
/// one retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub source_key: String,
    pub page_no: Option<u32>,
    pub headings: Vec<String>,
    pub bounding_region: Option<BoundingRegion>,
    pub relevance_score: f32,
}

impl SearchResult {
    pub fn from_entry(entry: IndexedEntry, relevance_score: f32) -> Self {
        Self {
            content: entry.content,
            source_key: entry.source_key,
            page_no: entry.metadata.page_no,
            headings: entry.metadata.headings,
            bounding_region: entry.metadata.bounding_region,
            relevance_score,
        }
    }

    /// The filename portion of the source key (`report.pdf:page_3:chunk_7`
    /// yields `report.pdf`).
    pub fn filename(&self) -> &str {
        self.source_key
            .split(':')
            .next()
            .unwrap_or(&self.source_key)
    }
}

/// Identity and checksum of an ingested document, kept for provenance logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub document_id: String,
    pub filename: String,
    pub source_path: String,
    pub checksum: String,
    pub ingested_at: DateTime<Utc>,
}

/// Correctness verdict returned by a judge provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub is_correct: bool,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// One labeled row of an evaluation question set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPair {
    pub question: String,
    pub expected_answer: String,
}

/// Outcome of one question in an evaluation run. `index` maps the record
/// back to its position in the input pairs regardless of completion order.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub index: usize,
    pub question: String,
    pub produced_answer: Option<String>,
    pub expected_answer: String,
    pub is_correct: bool,
    pub reasoning: Option<String>,
}

/// Aggregate of an evaluation run. `score` is `None` when the run had no
/// input pairs, which keeps the empty case distinct from a score of zero.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub score: Option<f64>,
    pub records: Vec<EvaluationRecord>,
}
