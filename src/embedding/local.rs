//! Local embeddings via fastembed (bundled ONNX Runtime).
//!
//! The model is downloaded from Hugging Face on first use and cached;
//! after that, embedding runs entirely offline.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::info;

use docchat_core::embedding::EmbeddingBackend;

use super::resolve_local_model;
use crate::config::EmbeddingBackendConfig;

type SharedModel = Arc<Mutex<fastembed::TextEmbedding>>;

pub struct LocalBackend {
    model_name: String,
    model: fastembed::EmbeddingModel,
    dims: usize,
    batch_size: usize,
    loaded: OnceCell<SharedModel>,
}

impl LocalBackend {
    /// Validates the model name; loading is deferred to the first
    /// [`embed`](EmbeddingBackend::embed) call.
    pub fn new(config: &EmbeddingBackendConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let model = config_to_fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            model,
            dims,
            batch_size: config.batch_size.max(1),
            loaded: OnceCell::new(),
        })
    }

    async fn model(&self) -> Result<SharedModel> {
        let model = self.model.clone();
        let name = self.model_name.clone();
        self.loaded
            .get_or_try_init(|| async move {
                info!(model = %name, "loading local embedding model");
                let loaded = tokio::task::spawn_blocking(move || {
                    fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(model).with_show_download_progress(false),
                    )
                    .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))
                })
                .await??;
                Ok::<_, anyhow::Error>(Arc::new(Mutex::new(loaded)))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl EmbeddingBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model().await?;
        let texts = texts.to_vec();
        let batch_size = self.batch_size;

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}
