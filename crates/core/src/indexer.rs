use crate::config::IndexerConfig;
use crate::error::IndexError;
use crate::models::{Chunk, DocumentFingerprint, IndexedEntry};
use crate::traits::{ChunkExtractor, EmbeddingProvider, VectorStore};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub fn discover_documents(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IndexError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn fingerprint_document(path: &Path) -> Result<DocumentFingerprint, IndexError> {
    let checksum = digest_file(path)?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            IndexError::MissingFileName(format!("path missing filename: {}", path.display()))
        })?;

    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());

    Ok(DocumentFingerprint {
        document_id: format!("{:x}", hasher.finalize()),
        filename: filename.to_string(),
        source_path: path.to_string_lossy().to_string(),
        checksum,
        ingested_at: Utc::now(),
    })
}

/// Turns extracted chunks into vector-store entries.
///
/// Embedding calls fan out concurrently up to the configured limit, each
/// under its own deadline. The batch is all-or-nothing: any embedding
/// failure surfaces every failed key and nothing is written, so a partial
/// index can never be observed.
pub struct Indexer<X, E, S> {
    extractor: X,
    embedder: Arc<E>,
    store: S,
    config: IndexerConfig,
}

impl<X, E, S> Indexer<X, E, S>
where
    X: ChunkExtractor,
    E: EmbeddingProvider + 'static,
    S: VectorStore,
{
    pub fn new(extractor: X, embedder: E, store: S, config: IndexerConfig) -> Result<Self, IndexError> {
        if config.max_concurrency == 0 {
            return Err(IndexError::InvalidConfiguration(
                "max_concurrency must be positive".to_string(),
            ));
        }

        Ok(Self {
            extractor,
            embedder: Arc::new(embedder),
            store,
            config,
        })
    }

    /// Indexes every document and returns the number of entries written.
    /// Re-running over unmodified documents reproduces the same keys, so
    /// the store row count stays flat.
    pub async fn index(&self, documents: &[PathBuf]) -> Result<usize, IndexError> {
        self.store.ensure_schema(self.embedder.dimension()).await?;

        let mut chunks = Vec::new();
        for document in documents {
            let document_chunks = self.extractor.extract(document)?;
            debug!(
                document = %document.display(),
                chunk_count = document_chunks.len(),
                "extracted chunks"
            );
            chunks.extend(document_chunks);
        }

        if chunks.is_empty() {
            return Ok(0);
        }

        let entries = self.embed_chunks(chunks).await?;
        let written = entries.len();
        self.store.upsert(entries).await?;
        Ok(written)
    }

    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<IndexedEntry>, IndexError> {
        let dimension = self.embedder.dimension();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut workers = JoinSet::new();

        for (slot, chunk) in chunks.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let embedder = Arc::clone(&self.embedder);
            let deadline = self.config.request_timeout;

            workers.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(closed) => return (slot, chunk, Err(closed.to_string())),
                };

                let outcome =
                    match tokio::time::timeout(deadline, embedder.embed(&chunk.content)).await {
                        Ok(Ok(vector)) => Ok(vector),
                        Ok(Err(error)) => Err(error.to_string()),
                        Err(_) => Err(format!(
                            "embedding call timed out after {}ms",
                            deadline.as_millis()
                        )),
                    };

                (slot, chunk, outcome)
            });
        }

        let mut slots: Vec<Option<IndexedEntry>> = Vec::new();
        slots.resize_with(workers.len(), || None);
        let mut failed_keys = Vec::new();

        while let Some(joined) = workers.join_next().await {
            let (slot, chunk, outcome) = joined.map_err(|error| IndexError::Worker(error.to_string()))?;

            match outcome {
                Ok(vector) if vector.len() == dimension => {
                    slots[slot] = Some(IndexedEntry {
                        source_key: chunk.source_key,
                        vector,
                        content: chunk.content,
                        metadata: chunk.metadata,
                    });
                }
                Ok(vector) => {
                    warn!(
                        source_key = %chunk.source_key,
                        got = vector.len(),
                        expected = dimension,
                        "provider returned wrong embedding dimension"
                    );
                    failed_keys.push(chunk.source_key);
                }
                Err(reason) => {
                    warn!(source_key = %chunk.source_key, %reason, "embedding failed");
                    failed_keys.push(chunk.source_key);
                }
            }
        }

        if !failed_keys.is_empty() {
            failed_keys.sort_unstable();
            return Err(IndexError::EmbeddingBatch { failed_keys });
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
