//! Google Gemini embeddings via the `batchEmbedContents` REST endpoint.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use docchat_core::embedding::EmbeddingBackend;

use crate::config::EmbeddingBackendConfig;
use crate::http::{api_key, json_to_vec, post_json, LazyClient};

const DEFAULT_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "text-embedding-004";
const DEFAULT_KEY_ENV: &str = "GOOGLE_API_KEY";
const TASK_TYPE: &str = "RETRIEVAL_DOCUMENT";

pub struct GeminiBackend {
    model: String,
    dims: usize,
    url: String,
    api_key_env: String,
    batch_size: usize,
    max_retries: u32,
    client: LazyClient,
}

impl GeminiBackend {
    pub fn new(config: &EmbeddingBackendConfig) -> Self {
        let model = config
            .model
            .as_deref()
            .unwrap_or(DEFAULT_MODEL)
            .trim_start_matches("models/")
            .to_string();
        Self {
            dims: config.dims.unwrap_or(768),
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_URL.to_string())
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

    fn request_body(&self, texts: &[String]) -> serde_json::Value {
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|t| {
                serde_json::json!({
                    "model": format!("models/{}", self.model),
                    "content": { "parts": [{ "text": t }] },
                    "taskType": TASK_TYPE,
                })
            })
            .collect();
        serde_json::json!({ "requests": requests })
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let key = api_key(&self.api_key_env)?;
        let client = self.client.get().await?;
        let url = format!("{}/models/{}:batchEmbedContents", self.url, self.model);

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let json = post_json(
                client,
                &url,
                &[("x-goog-api-key", key.as_str())],
                &self.request_body(batch),
                self.max_retries,
                "Gemini API",
            )
            .await?;
            vectors.extend(parse_gemini_response(&json)?);
        }
        Ok(vectors)
    }
}

/// Accepts the batch shape `{"embeddings": [{"values": [...]}, ...]}` and
/// the single shape `{"embedding": {"values": [...]}}`.
fn parse_gemini_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    if let Some(items) = json.get("embeddings").and_then(|e| e.as_array()) {
        return items
            .iter()
            .map(|item| {
                item.get("values")
                    .and_then(json_to_vec)
                    .ok_or_else(|| anyhow!("Invalid Gemini response: embedding without values"))
            })
            .collect();
    }

    if let Some(values) = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(json_to_vec)
    {
        return Ok(vec![values]);
    }

    Err(anyhow!("Unrecognized Gemini embedding response shape"))
}
