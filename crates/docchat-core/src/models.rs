//! Core data models that flow through ingestion and question answering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bounded text segment of one document.
///
/// `start` and `end` are character (not byte) offsets into the normalized
/// document text; `text` is the trimmed content of that window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub document_id: String,
    pub chunk_index: usize,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Identity of a document as seen by the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub doc_id: String,
    pub doc_name: String,
}

impl DocumentRef {
    pub fn new(doc_id: impl Into<String>, doc_name: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            doc_name: doc_name.into(),
        }
    }
}

/// Metadata persisted alongside every indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub doc_id: String,
    pub doc_name: String,
    /// 0-based position of the chunk within its document.
    pub chunk_index: usize,
}

/// The persisted unit of the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedRecord {
    /// `{doc_id}::chunk::{chunk_index}`.
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Build the stable record id for a chunk.
pub fn record_id(doc_id: &str, chunk_index: usize) -> String {
    format!("{}::chunk::{}", doc_id, chunk_index)
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance in `[0, 2]`; lower is more similar.
    pub distance: f32,
}

/// Ranked nearest-neighbor results, most similar first.
///
/// An empty result is a normal outcome (nothing indexed yet), not an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub matches: Vec<ScoredChunk>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn documents(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.text.as_str()).collect()
    }

    pub fn metadatas(&self) -> Vec<&ChunkMetadata> {
        self.matches.iter().map(|m| &m.metadata).collect()
    }

    pub fn distances(&self) -> Vec<f32> {
        self.matches.iter().map(|m| m.distance).collect()
    }
}

/// A cited source attached to an [`Answer`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Source {
    /// 1-based citation index, matching `[index]` in the answer text.
    pub index: usize,
    pub doc_name: String,
    pub snippet: String,
    pub distance: f32,
    /// `max(0, (1 - distance / 2) * 100)`.
    pub relevance: f32,
}

/// Terminal state reached while answering a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Blank question; the index was not touched.
    EmptyQuestion,
    /// Nothing is indexed yet.
    EmptyIndex,
    /// At least one chunk cleared the relevance threshold.
    Grounded,
    /// No chunk cleared the threshold; answered from the unfiltered top results.
    LowConfidence,
    /// Retrieval succeeded but the generation call failed.
    GenerationError,
    /// Embedding the question or querying the index failed.
    RetrievalError,
}

/// The result of a question-answering request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
    pub low_confidence: bool,
    pub outcome: AnswerOutcome,
}

/// Detected or forced format of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
    Image,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
            FileType::Image => "image",
        }
    }
}

impl std::str::FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pdf" => Ok(FileType::Pdf),
            "docx" => Ok(FileType::Docx),
            "txt" | "text" => Ok(FileType::Txt),
            "image" | "img" => Ok(FileType::Image),
            other => Err(format!(
                "unknown file type '{}': expected pdf, docx, txt, or image",
                other
            )),
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document as tracked by the external registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: String,
    pub file_type: FileType,
    pub uploaded_at: DateTime<Utc>,
    pub num_chunks: usize,
    pub embedded: bool,
}

impl DocumentRecord {
    pub fn doc_ref(&self) -> DocumentRef {
        DocumentRef::new(&self.id, &self.name)
    }
}

/// Summary of one successful ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub doc_id: String,
    pub chunks: usize,
}
