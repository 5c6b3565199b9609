//! Embedding backend trait, the fallback-aware gateway, and vector utilities.
//!
//! Concrete backends (Gemini, OpenAI, Ollama, fastembed, tract) live in the
//! `docchat` app crate. Each one normalizes its own wire format into the
//! fixed contract of [`EmbeddingBackend::embed`]: one vector per input
//! text, in input order.
//!
//! # Fallback
//!
//! [`EmbeddingGateway`] holds an ordered list of backends (primary first).
//! Every call sends the full batch to the first backend; on any failure,
//! including a vector count that differs from the input count, the whole
//! batch is retried on the next one. The first success wins. When every
//! backend fails, the returned [`Error::Embedding`] lists each failure.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::error::{BackendFailure, Error, Result};

/// A source of text embeddings.
///
/// Implementations own their clients and must tolerate concurrent calls.
/// Lazily built clients are expected to initialize exactly once.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Short label used in logs and error messages (e.g. `"gemini"`).
    fn name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `768`).
    ///
    /// The gateway rejects responses whose vectors differ from this size;
    /// `0` leaves the size unchecked.
    fn dims(&self) -> usize;

    /// Embed a non-empty batch of non-blank texts.
    ///
    /// Returns one vector per text in the same order. Any error triggers
    /// fallback in the gateway.
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Ordered, first-success-wins embedding front end.
pub struct EmbeddingGateway {
    backends: Vec<Arc<dyn EmbeddingBackend>>,
}

impl EmbeddingGateway {
    /// Create a gateway from backends in attempt order.
    pub fn new(backends: Vec<Arc<dyn EmbeddingBackend>>) -> Self {
        Self { backends }
    }

    /// Create a gateway from a primary and an optional fallback backend.
    pub fn with_fallback(
        primary: Arc<dyn EmbeddingBackend>,
        fallback: Option<Arc<dyn EmbeddingBackend>>,
    ) -> Self {
        let mut backends = vec![primary];
        backends.extend(fallback);
        Self { backends }
    }

    /// Labels of the configured backends, in attempt order.
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Embed `texts`, preserving length and order.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] if any text is blank after trimming.
    /// - [`Error::Embedding`] if every backend failed; names each failure.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let blank = texts.iter().filter(|t| t.trim().is_empty()).count();
        if blank > 0 {
            return Err(Error::Validation(format!(
                "{} of {} texts are empty after trimming; filter them before embedding",
                blank,
                texts.len()
            )));
        }

        let mut failures = Vec::with_capacity(self.backends.len());

        for backend in &self.backends {
            if let Some(previous) = failures.last() {
                warn!(
                    backend = backend.name(),
                    previous = %previous,
                    "falling back to next embedding backend"
                );
            }

            debug!(backend = backend.name(), batch_size = texts.len(), "embedding batch");

            let dims = backend.dims();
            match backend.embed(texts).await {
                Ok(vectors) if vectors.len() != texts.len() => failures.push(BackendFailure {
                    backend: backend.name().to_string(),
                    message: format!(
                        "returned {} vectors for {} texts",
                        vectors.len(),
                        texts.len()
                    ),
                }),
                Ok(vectors) => match vectors.iter().find(|v| dims > 0 && v.len() != dims) {
                    Some(bad) => failures.push(BackendFailure {
                        backend: backend.name().to_string(),
                        message: format!(
                            "returned {}-dimensional vectors, expected {}",
                            bad.len(),
                            dims
                        ),
                    }),
                    None => return Ok(vectors),
                },
                Err(e) => failures.push(BackendFailure {
                    backend: backend.name().to_string(),
                    message: format!("{:#}", e),
                }),
            }
        }

        let err = Error::Embedding { failures };
        error!(error = %err, "embedding failed on every backend");
        Err(err)
    }

    /// Embed a single text (e.g. a search query).
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::Embedding {
            failures: vec![BackendFailure {
                backend: "gateway".to_string(),
                message: "empty embedding response".to_string(),
            }],
        })
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docchat_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, and zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance `1 - similarity`, clamped to `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    (1.0 - cosine_similarity(a, b)).clamp(0.0, 2.0)
}
