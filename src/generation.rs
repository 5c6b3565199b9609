//! Concrete [`Generator`]s.
//!
//! | Config value | Generator | Endpoint |
//! |--------------|-----------|----------|
//! | `"gemini"` | [`GeminiGenerator`] | `POST {url}/models/{model}:generateContent` |
//! | `"ollama"` | [`OllamaGenerator`] | `POST {url}/api/generate` |
//! | `"disabled"` | [`DisabledGenerator`] | – |

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use docchat_core::generation::{Generator, SamplingParams};

use crate::config::GenerationConfig;
use crate::http::{api_key, post_json, LazyClient};

const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_KEY_ENV: &str = "GOOGLE_API_KEY";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Create the generator named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config))),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config))),
        other => bail!("Unknown generation provider: {}", other),
    }
}

fn base_url(config: &GenerationConfig, default: &str) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

/// Always fails; answers then carry the generation error message.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str, _params: &SamplingParams) -> Result<Option<String>> {
        bail!("generation provider is disabled")
    }
}

/// Google Gemini `generateContent`.
pub struct GeminiGenerator {
    model: String,
    url: String,
    api_key_env: String,
    max_retries: u32,
    client: LazyClient,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.trim_start_matches("models/").to_string(),
            url: base_url(config, GEMINI_URL),
            api_key_env: config
                .api_key_env
                .clone()
                .unwrap_or_else(|| GEMINI_KEY_ENV.to_string()),
            max_retries: config.max_retries,
            client: LazyClient::new(config.timeout_secs),
        }
    }
}

fn gemini_request(prompt: &str, params: &SamplingParams) -> serde_json::Value {
    serde_json::json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
        "generationConfig": {
            "temperature": params.temperature,
            "topP": params.top_p,
            "topK": params.top_k,
            "maxOutputTokens": params.max_output_tokens,
        }
    })
}

/// Pull the answer text out of a `generateContent` response.
///
/// Prefers a top-level `text` field; otherwise concatenates the parts of
/// the first candidate. Blocked or empty candidates yield `None`.
fn parse_gemini_text(json: &serde_json::Value) -> Option<String> {
    if let Some(text) = json.get("text").and_then(|t| t.as_str()) {
        return non_empty(text.to_string());
    }

    let parts = json
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    non_empty(text)
}

fn non_empty(text: String) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Option<String>> {
        let key = api_key(&self.api_key_env)?;
        let client = self.client.get().await?;
        let url = format!("{}/models/{}:generateContent", self.url, self.model);
        let json = post_json(
            client,
            &url,
            &[("x-goog-api-key", key.as_str())],
            &gemini_request(prompt, params),
            self.max_retries,
            "Gemini API",
        )
        .await?;
        Ok(parse_gemini_text(&json))
    }
}

/// Ollama `/api/generate` with streaming off.
pub struct OllamaGenerator {
    model: String,
    url: String,
    max_retries: u32,
    client: LazyClient,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            model: config.model.clone(),
            url: base_url(config, OLLAMA_URL),
            max_retries: config.max_retries,
            client: LazyClient::new(config.timeout_secs),
        }
    }
}

fn ollama_request(model: &str, prompt: &str, params: &SamplingParams) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "prompt": prompt,
        "stream": false,
        "options": {
            "temperature": params.temperature,
            "top_p": params.top_p,
            "top_k": params.top_k,
            "num_predict": params.max_output_tokens,
        }
    })
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, params: &SamplingParams) -> Result<Option<String>> {
        let client = self.client.get().await?;
        let url = format!("{}/api/generate", self.url);
        let json = post_json(
            client,
            &url,
            &[],
            &ollama_request(&self.model, prompt, params),
            self.max_retries,
            "Ollama API",
        )
        .await
        .map_err(|e| anyhow!("{} (is Ollama running at {}?)", e, self.url))?;

        Ok(json
            .get("response")
            .and_then(|r| r.as_str())
            .and_then(|r| non_empty(r.to_string())))
    }
}
