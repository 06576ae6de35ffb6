use crate::error::StoreError;
use crate::models::{IndexedEntry, ScoredEntry};
use crate::traits::VectorStore;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-process store used for tests and single-node runs.
///
/// Rows keep insertion order; an upsert that replaces an existing key keeps
/// the row's original position so distance ties stay stable across
/// re-indexing. A whole upsert batch happens under one write lock, which
/// gives per-key write atomicity and read-after-write consistency.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    dimension: Option<usize>,
    rows: Vec<IndexedEntry>,
    positions: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn ensure_schema(&self, dimension: usize) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.dimension {
            Some(stored) if stored != dimension => Err(StoreError::SchemaMismatch {
                stored,
                requested: dimension,
            }),
            Some(_) => Ok(()),
            None => {
                inner.dimension = Some(dimension);
                Ok(())
            }
        }
    }

    async fn upsert(&self, entries: Vec<IndexedEntry>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;

        for entry in &entries {
            let stored = *inner.dimension.get_or_insert(entry.vector.len());
            if entry.vector.len() != stored {
                return Err(StoreError::SchemaMismatch {
                    stored,
                    requested: entry.vector.len(),
                });
            }
        }

        for entry in entries {
            match inner.positions.get(&entry.source_key).copied() {
                Some(position) => inner.rows[position] = entry,
                None => {
                    let position = inner.rows.len();
                    inner.positions.insert(entry.source_key.clone(), position);
                    inner.rows.push(entry);
                }
            }
        }

        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredEntry>, StoreError> {
        let inner = self.inner.read().await;

        if inner.rows.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(stored) = inner.dimension {
            if query_vector.len() != stored {
                return Err(StoreError::SchemaMismatch {
                    stored,
                    requested: query_vector.len(),
                });
            }
        }

        let mut hits: Vec<ScoredEntry> = inner
            .rows
            .iter()
            .map(|entry| ScoredEntry {
                entry: entry.clone(),
                distance: cosine_distance(query_vector, &entry.vector),
            })
            .collect();

        // Stable sort keeps insertion order for equal distances.
        hits.sort_by(|left, right| left.distance.total_cmp(&right.distance));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.rows.clear();
        inner.positions.clear();
        inner.dimension = None;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.rows.len())
    }
}

fn cosine_distance(left: &[f32], right: &[f32]) -> f32 {
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let left_norm: f32 = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm: f32 = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    if left_norm == 0.0 || right_norm == 0.0 {
        return 1.0;
    }

    1.0 - dot / (left_norm * right_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkMetadata;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn entry(key: &str, vector: Vec<f32>) -> IndexedEntry {
        IndexedEntry {
            source_key: key.to_string(),
            vector,
            content: format!("content of {key}"),
            metadata: ChunkMetadata {
                filename: "doc.pdf".to_string(),
                page_no: Some(1),
                headings: Vec::new(),
                bounding_region: None,
                chunk_index: 0,
            },
        }
    }

    #[tokio::test]
    async fn upsert_twice_is_idempotent() {
        let store = MemoryStore::new();
        let batch = vec![
            entry("doc.pdf:page_1:chunk_0", vec![1.0, 0.0]),
            entry("doc.pdf:page_1:chunk_1", vec![0.0, 1.0]),
        ];

        store.upsert(batch.clone()).await.unwrap();
        store.upsert(batch).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let hits = store.search(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.source_key, "doc.pdf:page_1:chunk_0");
    }

    #[tokio::test]
    async fn upsert_replaces_matching_key_in_place() {
        let store = MemoryStore::new();
        store
            .upsert(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])])
            .await
            .unwrap();

        let mut replacement = entry("a", vec![1.0, 0.0]);
        replacement.content = "updated".to_string();
        store.upsert(vec![replacement]).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 2);
        let hits = store.search(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits[0].entry.content, "updated");
    }

    #[tokio::test]
    async fn equal_distances_keep_insertion_order() {
        let store = MemoryStore::new();
        store
            .upsert(vec![
                entry("first", vec![0.0, 1.0]),
                entry("second", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits[0].entry.source_key, "first");
        assert_eq!(hits[1].entry.source_key, "second");
    }

    #[tokio::test]
    async fn concurrent_batches_over_the_same_keys_stay_whole() {
        let store = Arc::new(MemoryStore::new());
        let keys = ["doc.pdf:page_1:chunk_0", "doc.pdf:page_1:chunk_1", "doc.pdf:page_1:chunk_2"];

        let batch = |tag: &str| -> Vec<IndexedEntry> {
            keys.iter()
                .map(|key| {
                    let mut row = entry(key, vec![1.0, 0.0]);
                    row.content = format!("{tag}:{key}");
                    row
                })
                .collect()
        };

        let first = tokio::spawn({
            let store = Arc::clone(&store);
            let rows = batch("one");
            async move { store.upsert(rows).await }
        });
        let second = tokio::spawn({
            let store = Arc::clone(&store);
            let rows = batch("two");
            async move { store.upsert(rows).await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        assert_eq!(store.count().await.unwrap(), keys.len());

        // A batch runs under one write lock, so every row carries the tag of
        // whichever batch committed last; a mixed set would mean two batches
        // interleaved mid-write.
        let hits = store.search(&[1.0, 0.0], 10).await.unwrap();
        let mut tags = HashSet::new();
        for hit in &hits {
            let (tag, key) = hit
                .entry
                .content
                .split_once(':')
                .expect("row content carries its batch tag");
            assert_eq!(key, hit.entry.source_key);
            tags.insert(tag.to_string());
        }
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test]
    async fn schema_mismatch_is_rejected_before_write() {
        let store = MemoryStore::new();
        store.ensure_schema(2).await.unwrap();

        let result = store.ensure_schema(3).await;
        assert!(matches!(
            result,
            Err(StoreError::SchemaMismatch {
                stored: 2,
                requested: 3
            })
        ));

        let result = store.upsert(vec![entry("a", vec![1.0, 0.0, 0.0])]).await;
        assert!(result.is_err());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn reset_is_safe_on_fresh_store_and_destructive_otherwise() {
        let store = MemoryStore::new();
        store.reset().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        store.upsert(vec![entry("a", vec![1.0])]).await.unwrap();
        store.reset().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);

        let hits = store.search(&[1.0], 5).await.unwrap();
        assert!(hits.is_empty());
    }
}
