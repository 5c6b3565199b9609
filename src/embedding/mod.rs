//! Concrete [`EmbeddingBackend`]s and the gateway factory.
//!
//! | Config value | Backend | Default model | Dims |
//! |--------------|---------|---------------|------|
//! | `"gemini"` | [`GeminiBackend`] | `text-embedding-004` | 768 |
//! | `"openai"` | [`OpenAIBackend`] | `text-embedding-3-small` | 1536 |
//! | `"ollama"` | [`OllamaBackend`] | required | required |
//! | `"local"` | fastembed or tract (see features) | `all-minilm-l6-v2` | 384 |
//! | `"disabled"` | [`DisabledBackend`] | – | 0 |
//!
//! Each HTTP backend builds its client lazily on first use and reads its
//! API key at call time, so a missing key surfaces as a failed attempt
//! (and triggers fallback) rather than a startup error.
//!
//! ```rust,no_run
//! # use docchat::config::EmbeddingBackendConfig;
//! # use docchat::embedding::create_backend;
//! let backend = create_backend(&EmbeddingBackendConfig::with_provider("disabled")).unwrap();
//! assert_eq!(backend.name(), "disabled");
//! ```

mod gemini;
#[cfg(feature = "local-embeddings-fastembed")]
mod local;
#[cfg(feature = "local-embeddings-tract")]
mod local_tract;
mod ollama;
mod openai;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use docchat_core::embedding::{EmbeddingBackend, EmbeddingGateway};

use crate::config::{EmbeddingBackendConfig, EmbeddingConfig};

pub use gemini::GeminiBackend;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalBackend;
#[cfg(feature = "local-embeddings-tract")]
pub use local_tract::TractBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAIBackend;

/// A backend that refuses every request.
///
/// Used when a slot is configured with `provider = "disabled"`.
pub struct DisabledBackend;

#[async_trait]
impl EmbeddingBackend for DisabledBackend {
    fn name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding provider is disabled")
    }
}

/// Build the gateway: primary first, then the fallback if configured.
pub fn create_gateway(config: &EmbeddingConfig) -> Result<EmbeddingGateway> {
    let primary = create_backend(&config.primary)?;
    let fallback = config.fallback.as_ref().map(create_backend).transpose()?;
    Ok(EmbeddingGateway::with_fallback(primary, fallback))
}

/// Create the backend named by `config.provider`.
///
/// # Errors
///
/// Unknown provider names, or `"local"` without a local-embeddings feature.
pub fn create_backend(config: &EmbeddingBackendConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledBackend)),
        "gemini" => Ok(Arc::new(GeminiBackend::new(config))),
        "openai" => Ok(Arc::new(OpenAIBackend::new(config))),
        "ollama" => Ok(Arc::new(OllamaBackend::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalBackend::new(config)?)),
        #[cfg(all(
            feature = "local-embeddings-tract",
            not(feature = "local-embeddings-fastembed")
        ))]
        "local" => Ok(Arc::new(TractBackend::new(config)?)),
        #[cfg(not(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract")))]
        "local" => bail!(
            "Local embedding provider requires one of: --features local-embeddings-fastembed, --features local-embeddings-tract"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Model name and dimensionality for the local backends.
#[cfg(any(
    feature = "local-embeddings-fastembed",
    feature = "local-embeddings-tract"
))]
fn resolve_local_model(config: &EmbeddingBackendConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| "all-minilm-l6-v2".to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "multilingual-e5-small" => 384,
        "multilingual-e5-base" => 768,
        "multilingual-e5-large" => 1024,
        _ => 384,
    });

    (model_name, dims)
}
