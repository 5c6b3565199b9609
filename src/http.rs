//! Shared HTTP plumbing for the embedding and generation backends.
//!
//! # Retry Strategy
//!
//! [`post_json`] retries transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors (including timeouts) → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

/// A `reqwest::Client` built on first use and reused afterwards.
///
/// Concurrent first callers race on the same cell; exactly one client is
/// constructed.
pub struct LazyClient {
    cell: OnceCell<reqwest::Client>,
    timeout: Duration,
}

impl LazyClient {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            cell: OnceCell::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub async fn get(&self) -> Result<&reqwest::Client> {
        self.cell
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(self.timeout)
                    .build()
                    .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))
            })
            .await
    }
}

/// Read an API key from the named environment variable.
pub fn api_key(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("{} environment variable not set", env_var),
    }
}

/// POST a JSON body and return the parsed JSON response, retrying
/// transient failures up to `max_retries` times.
///
/// `label` prefixes error messages (e.g. `"Gemini API"`).
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &serde_json::Value,
    max_retries: u32,
    label: &str,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            debug!(label, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| anyhow!("{} returned invalid JSON: {}", label, e));
                }

                let body_text = response.text().await.unwrap_or_default();

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} error {}: {}", label, status, body_text));
                    continue;
                }

                bail!("{} error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} request to {} failed: {}", label, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", label)))
}

/// Convert a JSON array of numbers into an `f32` vector.
///
/// Returns `None` unless every element is a number.
pub fn json_to_vec(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}
