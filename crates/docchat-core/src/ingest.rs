//! Ingestion pipeline: text → chunks → vectors → index.
//!
//! # File ingestion sequence
//!
//! ```text
//! registry.create ─▶ extract ─▶ chunk ─▶ embed + upsert ─▶ registry.update
//!        │               │         │            │                 │
//!        └──────────── any failure: delete the record, return the error
//! ```
//!
//! Nothing here serializes work per document; callers that may ingest
//! and remove the same document concurrently must coordinate themselves.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::chunk::{chunk_text, ChunkingParams};
use crate::error::{Error, Result};
use crate::extract::TextExtractor;
use crate::index::VectorIndexAdapter;
use crate::models::{DocumentRecord, DocumentRef, FileType, IngestReport};
use crate::registry::DocumentRegistry;

/// Minimum character count of document text after trimming.
pub const MIN_TEXT_CHARS: usize = 10;

/// Adds, replaces and removes the searchable content of documents.
pub struct IngestionPipeline {
    adapter: Arc<VectorIndexAdapter>,
    chunking: ChunkingParams,
}

impl IngestionPipeline {
    pub fn new(adapter: Arc<VectorIndexAdapter>, chunking: ChunkingParams) -> Self {
        Self { adapter, chunking }
    }

    pub fn adapter(&self) -> &Arc<VectorIndexAdapter> {
        &self.adapter
    }

    /// Chunk, embed and upsert one document's text.
    ///
    /// Records are written with ids `{doc_id}::chunk::{i}`. Re-ingesting a
    /// document that now yields fewer chunks leaves the higher-index
    /// records in place; use [`replace_text`](Self::replace_text) for that.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] when the text is too short or yields no chunks;
    /// otherwise whatever the adapter's upsert returns.
    pub async fn ingest_text(&self, doc: &DocumentRef, text: &str) -> Result<IngestReport> {
        let trimmed_len = text.trim().chars().count();
        if trimmed_len < MIN_TEXT_CHARS {
            return Err(Error::Validation(format!(
                "document '{}' contains no readable text or is too short (extracted {} chars)",
                doc.doc_name,
                trimmed_len
            )));
        }

        let chunks = chunk_text(text, &self.chunking);
        if chunks.is_empty() {
            return Err(Error::Validation(format!(
                "failed to create chunks from document '{}' (text length {})",
                doc.doc_name,
                text.chars().count()
            )));
        }

        let written = self.adapter.upsert(doc, &chunks).await?;
        Ok(IngestReport {
            doc_id: doc.doc_id.clone(),
            chunks: written,
        })
    }

    /// Drop every record of the document, then ingest `text` afresh.
    pub async fn replace_text(&self, doc: &DocumentRef, text: &str) -> Result<IngestReport> {
        self.adapter.delete(&doc.doc_id).await;
        self.ingest_text(doc, text).await
    }

    /// Register, extract and index a file.
    ///
    /// Returns the final registry record (`embedded = true`, `num_chunks`
    /// set). On any failure after the record is created, the record is
    /// deleted again and the original error is returned.
    pub async fn ingest_file(
        &self,
        registry: &dyn DocumentRegistry,
        extractor: &dyn TextExtractor,
        path: &Path,
        name: &str,
        forced_type: Option<FileType>,
    ) -> Result<DocumentRecord> {
        let record = registry
            .create(name, forced_type.unwrap_or(FileType::Txt))
            .await?;
        let doc_id = record.id.clone();

        match self.index_file(registry, extractor, path, record, forced_type).await {
            Ok(record) => {
                info!(
                    doc.id = %record.id,
                    doc.name = %record.name,
                    file_type = %record.file_type,
                    chunks = record.num_chunks,
                    "document ingested"
                );
                Ok(record)
            }
            Err(e) => {
                warn!(doc.id = %doc_id, error = %e, "ingestion failed; rolling back");
                if let Err(rollback) = registry.delete(&doc_id).await {
                    warn!(doc.id = %doc_id, error = %rollback, "failed to delete document record");
                }
                Err(e)
            }
        }
    }

    async fn index_file(
        &self,
        registry: &dyn DocumentRegistry,
        extractor: &dyn TextExtractor,
        path: &Path,
        mut record: DocumentRecord,
        forced_type: Option<FileType>,
    ) -> Result<DocumentRecord> {
        let extracted = extractor.extract(path, forced_type).await?;
        record.file_type = extracted.file_type;

        let report = self.ingest_text(&record.doc_ref(), &extracted.text).await?;
        record.num_chunks = report.chunks;
        record.embedded = true;

        if let Err(e) = registry.update(&record).await {
            self.adapter.delete(&record.id).await;
            return Err(e);
        }
        Ok(record)
    }

    /// Delete a document's vectors and its registry record.
    ///
    /// Vector deletion is best-effort; the registry record is removed even
    /// when the index could not be cleaned.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when the registry has no such document.
    pub async fn remove_document(
        &self,
        registry: &dyn DocumentRegistry,
        doc_id: &str,
    ) -> Result<DocumentRecord> {
        let record = registry
            .get(doc_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("document {}", doc_id)))?;

        self.adapter.delete(doc_id).await;
        registry.delete(doc_id).await?;
        info!(doc.id = doc_id, doc.name = %record.name, "document removed");
        Ok(record)
    }
}
