//! Pure-Rust local embeddings: tract-onnx for inference, `tokenizers` for
//! tokenization. For targets where ONNX Runtime is unavailable (musl,
//! Intel Mac).
//!
//! Model files are fetched from Hugging Face into
//! `~/.cache/docchat/models/<model>/` on first use.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::OnceCell;
use tract_onnx::prelude::*;
use tracing::info;

use docchat_core::embedding::EmbeddingBackend;

use super::resolve_local_model;
use crate::config::EmbeddingBackendConfig;

const MAX_SEQ_LEN: usize = 256;

struct ModelFiles {
    repo: &'static str,
    onnx: &'static str,
    tokenizer: &'static str,
}

fn model_files(model_name: &str) -> Result<ModelFiles> {
    match model_name {
        "all-minilm-l6-v2" => Ok(ModelFiles {
            repo: "sentence-transformers/all-MiniLM-L6-v2",
            onnx: "onnx/model.onnx",
            tokenizer: "tokenizer.json",
        }),
        "bge-small-en-v1.5" => Ok(ModelFiles {
            repo: "BAAI/bge-small-en-v1.5",
            onnx: "onnx/model.onnx",
            tokenizer: "tokenizer.json",
        }),
        other => bail!(
            "Tract backend supports all-minilm-l6-v2 and bge-small-en-v1.5. Requested: '{}'",
            other
        ),
    }
}

fn cache_dir() -> PathBuf {
    let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(base)
        .join(".cache")
        .join("docchat")
        .join("models")
}

fn download_to_cache(repo: &str, rel: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Ok(());
    }
    let url = format!("https://huggingface.co/{}/resolve/main/{}", repo, rel);
    info!(%url, "downloading model file");
    let bytes = reqwest::blocking::get(&url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .map_err(|e| anyhow!("Download {}: {}", url, e))?;
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Create cache dir {}: {}", parent.display(), e))?;
    }
    std::fs::write(dest, &bytes).map_err(|e| anyhow!("Write {}: {}", dest.display(), e))?;
    Ok(())
}

type Runnable = TypedRunnableModel<TypedModel>;

struct LoadedModel {
    tokenizer: tokenizers::Tokenizer,
    runnable: Runnable,
}

fn load_model(model_name: &str) -> Result<LoadedModel> {
    let files = model_files(model_name)?;
    let dir = cache_dir().join(model_name);
    let onnx_path = dir.join(files.onnx);
    let tokenizer_path = dir.join(files.tokenizer);
    download_to_cache(files.repo, files.onnx, &onnx_path)?;
    download_to_cache(files.repo, files.tokenizer, &tokenizer_path)?;

    let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Load tokenizer {}: {}", tokenizer_path.display(), e))?;
    let runnable = tract_onnx::onnx()
        .model_for_path(&onnx_path)
        .map_err(|e| anyhow!("Load ONNX: {}", e))?
        .into_optimized()
        .map_err(|e| anyhow!("Optimize: {}", e))?
        .into_runnable()
        .map_err(|e| anyhow!("Build tract runnable: {}", e))?;

    Ok(LoadedModel {
        tokenizer,
        runnable,
    })
}

pub struct TractBackend {
    model_name: String,
    dims: usize,
    batch_size: usize,
    loaded: OnceCell<std::sync::Arc<LoadedModel>>,
}

impl TractBackend {
    pub fn new(config: &EmbeddingBackendConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        model_files(&model_name)?;
        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size.max(1),
            loaded: OnceCell::new(),
        })
    }

    async fn model(&self) -> Result<std::sync::Arc<LoadedModel>> {
        let name = self.model_name.clone();
        self.loaded
            .get_or_try_init(|| async move {
                let loaded = tokio::task::spawn_blocking(move || load_model(&name)).await??;
                Ok::<_, anyhow::Error>(std::sync::Arc::new(loaded))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl EmbeddingBackend for TractBackend {
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
        let dims = self.dims;

        tokio::task::spawn_blocking(move || {
            let mut out = Vec::with_capacity(texts.len());
            for batch in texts.chunks(batch_size) {
                out.extend(embed_batch(&model, batch, dims)?);
            }
            Ok(out)
        })
        .await?
    }
}

fn embed_batch(model: &LoadedModel, batch: &[String], dims: usize) -> Result<Vec<Vec<f32>>> {
    let encodings = batch
        .iter()
        .map(|s| {
            model
                .tokenizer
                .encode(s.as_str(), true)
                .map_err(|e| anyhow!("Tokenize: {}", e))
        })
        .collect::<Result<Vec<_>>>()?;

    let seq_len = encodings
        .iter()
        .map(|e| e.get_ids().len())
        .max()
        .unwrap_or(1)
        .clamp(1, MAX_SEQ_LEN);
    let rows = encodings.len();

    let mut input_ids = vec![0i64; rows * seq_len];
    let mut attention_mask = vec![0i64; rows * seq_len];
    for (i, enc) in encodings.iter().enumerate() {
        for (j, &id) in enc.get_ids().iter().take(seq_len).enumerate() {
            input_ids[i * seq_len + j] = id as i64;
            attention_mask[i * seq_len + j] = 1;
        }
    }

    let ids: Tensor = ndarray::Array2::from_shape_vec((rows, seq_len), input_ids)
        .map_err(|e| anyhow!("Input ids shape: {}", e))?
        .into();
    let mask: Tensor = ndarray::Array2::from_shape_vec((rows, seq_len), attention_mask)
        .map_err(|e| anyhow!("Attention mask shape: {}", e))?
        .into();
    let outputs = model.runnable.run(tvec!(ids.into(), mask.into()))?;

    let output = outputs
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No output tensor"))?;
    let view = output
        .to_array_view::<f32>()
        .map_err(|e| anyhow!("Output to array: {}", e))?;

    let shape = view.shape().to_vec();
    match shape.len() {
        // [batch, dims]: already pooled
        2 => Ok((0..shape[0])
            .map(|i| normalize_l2(view.slice(ndarray::s![i, ..]).iter().copied().collect()))
            .collect()),
        // [batch, seq, dims]: mean-pool over the attended tokens
        3 => Ok(encodings
            .iter()
            .enumerate()
            .map(|(i, enc)| {
                let valid = enc.get_ids().len().min(shape[1]);
                let mut sum = vec![0f32; dims];
                for j in 0..valid {
                    for (k, &v) in view.slice(ndarray::s![i, j, ..]).iter().take(dims).enumerate() {
                        sum[k] += v;
                    }
                }
                if valid > 0 {
                    sum.iter_mut().for_each(|x| *x /= valid as f32);
                }
                normalize_l2(sum)
            })
            .collect()),
        _ => bail!("Unexpected output shape: {:?}", shape),
    }
}

fn normalize_l2(mut v: Vec<f32>) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
