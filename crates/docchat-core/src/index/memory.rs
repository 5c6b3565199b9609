//! In-memory [`VectorIndex`] for tests and ephemeral sessions.
//!
//! Records live in a `BTreeMap` keyed by record id behind a `std::sync::RwLock`.
//! Queries are a brute-force cosine scan over every stored vector.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::warn;

use crate::embedding::cosine_distance;
use crate::error::{Error, Result};
use crate::models::{IndexedRecord, ScoredChunk};

use super::{IndexedDocument, VectorIndex};

const BACKEND: &str = "memory";

/// Process-local vector index. Contents are lost on drop.
pub struct InMemoryIndex {
    records: RwLock<BTreeMap<String, IndexedRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> Error {
    Error::index(BACKEND, "lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn backend_name(&self) -> &str {
        BACKEND
    }

    async fn upsert(&self, records: &[IndexedRecord]) -> Result<()> {
        let mut stored = self.records.write().map_err(|_| poisoned())?;
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let stored = self.records.read().map_err(|_| poisoned())?;

        let mut mismatched = 0usize;
        let mut scored: Vec<ScoredChunk> = stored
            .values()
            .map(|r| {
                if r.vector.len() != vector.len() {
                    mismatched += 1;
                }
                ScoredChunk {
                    text: r.text.clone(),
                    metadata: r.metadata.clone(),
                    distance: cosine_distance(vector, &r.vector),
                }
            })
            .collect();

        if mismatched > 0 {
            warn!(
                mismatched,
                query_dims = vector.len(),
                "records with different dimensions scored as unrelated"
            );
        }

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let mut stored = self.records.write().map_err(|_| poisoned())?;
        let before = stored.len();
        stored.retain(|_, r| r.metadata.doc_id != doc_id);
        Ok(before - stored.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(|_| poisoned())?.len())
    }

    async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        let stored = self.records.read().map_err(|_| poisoned())?;
        let mut by_doc: HashMap<&str, IndexedDocument> = HashMap::new();
        for r in stored.values() {
            by_doc
                .entry(r.metadata.doc_id.as_str())
                .or_insert_with(|| IndexedDocument {
                    doc_id: r.metadata.doc_id.clone(),
                    doc_name: r.metadata.doc_name.clone(),
                    chunks: 0,
                })
                .chunks += 1;
        }
        let mut docs: Vec<IndexedDocument> = by_doc.into_values().collect();
        docs.sort_by(|a, b| a.doc_name.cmp(&b.doc_name).then(a.doc_id.cmp(&b.doc_id)));
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{record_id, ChunkMetadata};

    fn record(doc_id: &str, i: usize, vector: Vec<f32>) -> IndexedRecord {
        IndexedRecord {
            id: record_id(doc_id, i),
            vector,
            text: format!("{} chunk {}", doc_id, i),
            metadata: ChunkMetadata {
                doc_id: doc_id.to_string(),
                doc_name: format!("{}.txt", doc_id),
                chunk_index: i,
            },
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let index = InMemoryIndex::new();
        index.upsert(&[record("a", 0, vec![1.0, 0.0])]).await.unwrap();
        index.upsert(&[record("a", 0, vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 1);

        let hits = index.query(&[0.0, 1.0], 5).await.unwrap();
        assert!(hits[0].distance < 1e-6);
    }

    #[tokio::test]
    async fn test_query_orders_ascending_and_truncates() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record("a", 0, vec![1.0, 0.0]),
                record("a", 1, vec![0.7, 0.7]),
                record("a", 2, vec![-1.0, 0.0]),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.chunk_index, 0);
        assert_eq!(hits[1].metadata.chunk_index, 1);
        assert!(hits[0].distance <= hits[1].distance);

        let all = index.query(&[1.0, 0.0], 10).await.unwrap();
        assert!((all[2].distance - 2.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_mismatched_dimensions_score_as_unrelated() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[record("a", 0, vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let hits = index.query(&[1.0, 0.0], 1).await.unwrap();
        assert!((hits[0].distance - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_delete_and_list_documents() {
        let index = InMemoryIndex::new();
        index
            .upsert(&[
                record("b", 0, vec![1.0]),
                record("b", 1, vec![1.0]),
                record("a", 0, vec![1.0]),
            ])
            .await
            .unwrap();

        let docs = index.list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].doc_name, "a.txt");
        assert_eq!(docs[1].chunks, 2);

        assert_eq!(index.delete_document("b").await.unwrap(), 2);
        assert_eq!(index.delete_document("missing").await.unwrap(), 0);
        assert_eq!(index.count().await.unwrap(), 1);
    }
}
