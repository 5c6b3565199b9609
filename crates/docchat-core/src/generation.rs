//! Generation trait and sampling parameters.
//!
//! The core never talks to a model directly. A [`Generator`] takes a fully
//! built prompt and returns the model's text, already extracted from
//! whatever response shape the provider uses. Concrete generators live in
//! the `docchat` app crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Bounded sampling controls sent with every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

/// A text-generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Provider label used in logs and error messages.
    fn name(&self) -> &str;

    /// Run one generation.
    ///
    /// Returns `Ok(None)` (or an empty string) when the call succeeded but
    /// the response carried no extractable text. Transport, auth and quota
    /// problems are `Err`.
    async fn generate(&self, prompt: &str, params: &SamplingParams) -> anyhow::Result<Option<String>>;
}
