//! OpenAI (and OpenAI-compatible) embeddings via `POST /embeddings`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use docchat_core::embedding::EmbeddingBackend;

use crate::config::EmbeddingBackendConfig;
use crate::http::{api_key, json_to_vec, post_json, LazyClient};

const DEFAULT_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_KEY_ENV: &str = "OPENAI_API_KEY";

/// Calls the OpenAI embeddings API with batching, retry, and backoff.
///
/// Requires the API key in `OPENAI_API_KEY` (or the variable named by
/// `api_key_env`).
pub struct OpenAIBackend {
    model: String,
    dims: usize,
    url: String,
    api_key_env: String,
    batch_size: usize,
    max_retries: u32,
    client: LazyClient,
}

impl OpenAIBackend {
    pub fn new(config: &EmbeddingBackendConfig) -> Self {
        Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            dims: config.dims.unwrap_or(1536),
            url: config
                .url
                .as_deref()
                .unwrap_or(DEFAULT_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key_env: config
                .api_key_env
                .clone()
                .unwrap_or_else(|| DEFAULT_KEY_ENV.to_string()),
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client: LazyClient::new(config.timeout_secs),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let key = api_key(&self.api_key_env)?;
        let auth = format!("Bearer {}", key);
        let client = self.client.get().await?;
        let url = format!("{}/embeddings", self.url);

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let body = serde_json::json!({
                "model": self.model,
                "input": batch,
            });
            let json = post_json(
                client,
                &url,
                &[("Authorization", auth.as_str())],
                &body,
                self.max_retries,
                "OpenAI API",
            )
            .await?;
            vectors.extend(parse_openai_response(&json)?);
        }
        Ok(vectors)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let vector = item
            .get("embedding")
            .and_then(json_to_vec)
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}
