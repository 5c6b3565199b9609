//! Embeddings from a local Ollama instance via `POST /api/embed`.
//!
//! Requires Ollama to be running with an embedding model pulled
//! (e.g. `ollama pull nomic-embed-text`).

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use docchat_core::embedding::EmbeddingBackend;

use crate::config::EmbeddingBackendConfig;
use crate::http::{json_to_vec, post_json, LazyClient};

const DEFAULT_URL: &str = "http://localhost:11434";

pub struct OllamaBackend {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
    client: LazyClient,
}

impl OllamaBackend {
    pub fn new(config: &EmbeddingBackendConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;

        Ok(Self {
            model,
            dims,
            url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: LazyClient::new(config.timeout_secs),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let client = self.client.get().await?;
        let url = format!("{}/api/embed", self.url);

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = post_json(client, &url, &[], &body, self.max_retries, "Ollama API")
                .await
                .map_err(|e| anyhow!("{} (is Ollama running at {}?)", e, self.url))?;
            vectors.extend(parse_ollama_response(&json)?);
        }
        Ok(vectors)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|e| {
            json_to_vec(e).ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not a numeric array"))
        })
        .collect()
}
