use crate::error::StoreError;
use crate::models::{ChunkMetadata, IndexedEntry, ScoredEntry};
use crate::traits::VectorStore;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Qdrant-backed store. One collection, cosine similarity, point ids derived
/// from `source_key` so re-indexing upserts instead of duplicating.
pub struct QdrantStore {
    endpoint: String,
    collection: String,
    client: Client,
    vector_size: usize,
}

impl QdrantStore {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        vector_size: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            collection: collection.into(),
            client: Client::new(),
            vector_size,
        }
    }

    async fn collection_dimension(&self) -> Result<Option<usize>, StoreError> {
        let response = self
            .client
            .get(format!("{}/collections/{}", self.endpoint, self.collection))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let size = parsed
            .pointer("/result/config/params/vectors/size")
            .and_then(Value::as_u64)
            .ok_or_else(|| StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: "collection info missing vector size".to_string(),
            })?;

        Ok(Some(size as usize))
    }

    async fn create_collection(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .put(format!("{}/collections/{}", self.endpoint, self.collection))
            .json(&json!({
                "vectors": { "size": self.vector_size, "distance": "Cosine" },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }
}

/// One `source_key` must always map to the same point id.
fn point_id(source_key: &str) -> String {
    let digest = Sha256::digest(source_key.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn ensure_schema(&self, dimension: usize) -> Result<(), StoreError> {
        if dimension != self.vector_size {
            return Err(StoreError::SchemaMismatch {
                stored: self.vector_size,
                requested: dimension,
            });
        }

        match self.collection_dimension().await? {
            Some(stored) if stored != dimension => Err(StoreError::SchemaMismatch {
                stored,
                requested: dimension,
            }),
            Some(_) => Ok(()),
            None => self.create_collection().await,
        }
    }

    async fn upsert(&self, entries: Vec<IndexedEntry>) -> Result<(), StoreError> {
        let points = entries
            .iter()
            .map(|entry| {
                if entry.vector.len() != self.vector_size {
                    return Err(StoreError::SchemaMismatch {
                        stored: self.vector_size,
                        requested: entry.vector.len(),
                    });
                }

                Ok(json!({
                    "id": point_id(&entry.source_key),
                    "vector": entry.vector,
                    "payload": {
                        "source_key": entry.source_key,
                        "content": entry.content,
                        "metadata": serde_json::to_value(&entry.metadata)?,
                    },
                }))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        if points.is_empty() {
            return Ok(());
        }

        // wait=true makes the batch visible to the next search.
        let response = self
            .client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.endpoint, self.collection
            ))
            .json(&json!({ "points": points }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        if query_vector.len() != self.vector_size {
            return Err(StoreError::SchemaMismatch {
                stored: self.vector_size,
                requested: query_vector.len(),
            });
        }

        if self.collection_dimension().await?.is_none() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.endpoint, self.collection
            ))
            .json(&json!({
                "vector": query_vector,
                "limit": limit,
                "with_payload": true,
                "with_vector": true,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let hits = parsed
            .pointer("/result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::new();
        for hit in hits {
            let source_key = hit
                .pointer("/payload/source_key")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let content = hit
                .pointer("/payload/content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let metadata: ChunkMetadata = hit
                .pointer("/payload/metadata")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .ok_or_else(|| StoreError::BackendResponse {
                    backend: "qdrant".to_string(),
                    details: format!("hit missing metadata payload for {source_key}"),
                })?;
            let vector = hit
                .pointer("/vector")
                .and_then(Value::as_array)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_f64)
                        .map(|value| value as f32)
                        .collect()
                })
                .unwrap_or_default();
            let score = hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0);

            results.push(ScoredEntry {
                entry: IndexedEntry {
                    source_key,
                    vector,
                    content,
                    metadata,
                },
                // Qdrant reports cosine similarity, higher is closer.
                distance: 1.0 - score as f32,
            });
        }

        Ok(results)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(format!("{}/collections/{}", self.endpoint, self.collection))
            .send()
            .await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        self.create_collection().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        if self.collection_dimension().await?.is_none() {
            return Ok(0);
        }

        let response = self
            .client
            .post(format!(
                "{}/collections/{}/points/count",
                self.endpoint, self.collection
            ))
            .json(&json!({ "exact": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::BackendResponse {
                backend: "qdrant".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        let count = parsed
            .pointer("/result/count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(count as usize)
    }
}
