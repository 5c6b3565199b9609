//! Error taxonomy shared by every core component.
//!
//! Ingestion surfaces these errors to its caller. Question answering never
//! does: the [`RetrievalOrchestrator`](crate::retrieval::RetrievalOrchestrator)
//! turns every failure into a degraded [`Answer`](crate::models::Answer).

use std::fmt;

use thiserror::Error;

/// A single failed attempt against one embedding backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendFailure {
    /// Backend label (e.g. `"gemini"`, `"local"`).
    pub backend: String,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend, self.message)
    }
}

/// Errors produced by the DocChat core.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any side effect (empty text, empty chunk list, empty doc id).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The source document could not be turned into plain text.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Every configured embedding backend failed for the same batch.
    #[error("Embedding error: all backends failed ({})", join_failures(.failures))]
    Embedding {
        /// One entry per attempted backend, in attempt order.
        failures: Vec<BackendFailure>,
    },

    /// The vector index rejected an operation or returned inconsistent data.
    #[error("Vector index error ({backend}): {message}")]
    Index {
        /// Index backend label (e.g. `"sqlite"`, `"memory"`).
        backend: String,
        /// What went wrong.
        message: String,
    },

    /// The generation backend failed.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// Generation backend label.
        provider: String,
        /// What went wrong.
        message: String,
    },

    /// The document registry could not complete an operation.
    #[error("Registry error: {0}")]
    Registry(String),

    /// A registry lookup found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid parameters handed to a component.
    #[error("Configuration error: {0}")]
    Config(String),
}

fn join_failures(failures: &[BackendFailure]) -> String {
    if failures.is_empty() {
        return "no backends configured".to_string();
    }
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    pub fn index(backend: &str, message: impl Into<String>) -> Self {
        Error::Index {
            backend: backend.to_string(),
            message: message.into(),
        }
    }

    pub fn generation(provider: &str, message: impl Into<String>) -> Self {
        Error::Generation {
            provider: provider.to_string(),
            message: message.into(),
        }
    }
}

/// Convenience result alias for the core.
pub type Result<T> = std::result::Result<T, Error>;
