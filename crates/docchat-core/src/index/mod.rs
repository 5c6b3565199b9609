//! Vector index abstraction and the embedding-aware adapter over it.
//!
//! The [`VectorIndex`] trait is the contract of the external nearest-neighbor
//! store: it deals only in ready-made vectors. [`VectorIndexAdapter`] sits
//! on top, embedding chunk text and queries through the
//! [`EmbeddingGateway`] and enforcing the record layout:
//!
//! | Field | Value |
//! |-------|-------|
//! | id | `{doc_id}::chunk::{chunk_index}` |
//! | metadata.doc_id | owning document id |
//! | metadata.doc_name | document display name |
//! | metadata.chunk_index | 0-based position |
//!
//! # Operations
//!
//! | Method | Failure behavior |
//! |--------|------------------|
//! | [`upsert`](VectorIndexAdapter::upsert) | propagates; all records land or none |
//! | [`query`](VectorIndexAdapter::query) | propagates; empty index is `Ok(empty)` |
//! | [`delete`](VectorIndexAdapter::delete) | logged and swallowed |
//! | [`count`](VectorIndexAdapter::count) | logged, reported as `0` |

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::embedding::EmbeddingGateway;
use crate::error::{Error, Result};
use crate::models::{record_id, ChunkMetadata, DocumentRef, IndexedRecord, QueryResult, ScoredChunk};

/// Per-document summary of what the index holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexedDocument {
    pub doc_id: String,
    pub doc_name: String,
    pub chunks: usize,
}

/// Persistent cosine-distance nearest-neighbor collection.
///
/// Implementations must be `Send + Sync`; a single handle is shared by
/// every concurrent request.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend label used in errors and logs (e.g. `"sqlite"`).
    fn backend_name(&self) -> &str;

    /// Insert or replace records by id, atomically.
    async fn upsert(&self, records: &[IndexedRecord]) -> Result<()>;

    /// Return up to `k` records nearest to `vector`, ascending by cosine distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Remove every record whose `metadata.doc_id` equals `doc_id`.
    ///
    /// Returns the number of records removed.
    async fn delete_document(&self, doc_id: &str) -> Result<usize>;

    /// Total number of records.
    async fn count(&self) -> Result<usize>;

    /// Distinct documents with their record counts, ordered by name.
    async fn list_documents(&self) -> Result<Vec<IndexedDocument>>;
}

/// Embeds through the gateway and reads/writes the index.
pub struct VectorIndexAdapter {
    gateway: Arc<EmbeddingGateway>,
    index: Arc<dyn VectorIndex>,
}

impl VectorIndexAdapter {
    pub fn new(gateway: Arc<EmbeddingGateway>, index: Arc<dyn VectorIndex>) -> Self {
        Self { gateway, index }
    }

    pub fn gateway(&self) -> &Arc<EmbeddingGateway> {
        &self.gateway
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed and store all chunks of one document.
    ///
    /// Returns the number of records written.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] for an empty `doc_id` or an empty chunk list.
    /// - [`Error::Embedding`] when every embedding backend fails.
    /// - [`Error::Index`] when the backend returns a misaligned vector set
    ///   or the index rejects the write.
    pub async fn upsert(&self, doc: &DocumentRef, chunks: &[String]) -> Result<usize> {
        if doc.doc_id.trim().is_empty() {
            return Err(Error::Validation("doc_id must not be empty".to_string()));
        }
        if chunks.is_empty() {
            return Err(Error::Validation(format!(
                "no chunks to index for document '{}'",
                doc.doc_id
            )));
        }

        let vectors = self.gateway.embed(chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::index(
                self.index.backend_name(),
                format!(
                    "embedding count mismatch for document '{}': {} vectors for {} chunks",
                    doc.doc_id,
                    vectors.len(),
                    chunks.len()
                ),
            ));
        }

        let records: Vec<IndexedRecord> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| IndexedRecord {
                id: record_id(&doc.doc_id, i),
                vector,
                text: text.clone(),
                metadata: ChunkMetadata {
                    doc_id: doc.doc_id.clone(),
                    doc_name: doc.doc_name.clone(),
                    chunk_index: i,
                },
            })
            .collect();

        self.index.upsert(&records).await?;
        info!(doc.id = %doc.doc_id, chunk_count = records.len(), "indexed document");
        Ok(records.len())
    }

    /// Embed `text` and return its `k` nearest chunks.
    ///
    /// An empty collection short-circuits to an empty result before the
    /// query is embedded.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when `k` is 0.
    pub async fn query(&self, text: &str, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(Error::Validation(
                "k must be at least 1 to query the index".to_string(),
            ));
        }
        if self.index.count().await? == 0 {
            debug!(k, "query against empty index");
            return Ok(QueryResult::empty());
        }

        let vector = self.gateway.embed_one(text).await?;
        let matches = self.index.query(&vector, k).await?;
        debug!(k, returned = matches.len(), "index query completed");
        Ok(QueryResult { matches })
    }

    /// Remove all records of a document. Failures are logged, not returned.
    pub async fn delete(&self, doc_id: &str) {
        match self.index.delete_document(doc_id).await {
            Ok(removed) => info!(doc.id = doc_id, removed, "deleted document vectors"),
            Err(e) => warn!(
                doc.id = doc_id,
                error = %e,
                "failed to delete document vectors; orphaned records may remain"
            ),
        }
    }

    /// Record count, or `0` when the index cannot be read.
    pub async fn count(&self) -> usize {
        match self.index.count().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "failed to count index records");
                0
            }
        }
    }

    /// Documents currently present in the index.
    pub async fn list_documents(&self) -> Result<Vec<IndexedDocument>> {
        self.index.list_documents().await
    }
}
