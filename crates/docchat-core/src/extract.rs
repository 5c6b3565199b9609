//! Text extraction boundary.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::FileType;

/// Plain text pulled out of a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    /// Format the extractor detected (or was told to assume).
    pub file_type: FileType,
}

/// Turns a file on disk into plain text.
///
/// When `forced_type` is set the extractor must treat the file as that
/// format instead of detecting it. Unsupported or unreadable input is an
/// [`Error::Extraction`](crate::error::Error::Extraction).
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path, forced_type: Option<FileType>) -> Result<ExtractedText>;
}
