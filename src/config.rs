//! TOML configuration parsing and validation.
//!
//! Every section except `[index]` is optional and falls back to the
//! defaults below. Secrets never live in the file: HTTP backends read
//! their API key from the environment variable named by `api_key_env`.
//!
//! ```toml
//! [index]
//! path = "./data/docchat.sqlite"
//! collection = "docchat"
//!
//! [chunking]
//! max_chars = 1200
//! overlap = 150
//! min_chunk_size = 20
//!
//! [embedding.primary]
//! provider = "gemini"            # gemini | openai | ollama | local | disabled
//! model = "text-embedding-004"
//! dims = 768
//!
//! [embedding.fallback]           # optional
//! provider = "local"
//!
//! [retrieval]
//! top_k = 8
//! relevance_threshold = 0.6
//! low_confidence_top_n = 3
//! snippet_chars = 160
//!
//! [generation]
//! provider = "gemini"            # gemini | ollama | disabled
//! model = "gemini-2.5-flash"
//! temperature = 0.2
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docchat_core::chunk::ChunkingParams;
use docchat_core::generation::SamplingParams;
use docchat_core::retrieval::RetrievalParams;

pub const EMBEDDING_PROVIDERS: &[&str] = &["gemini", "openai", "ollama", "local", "disabled"];
pub const GENERATION_PROVIDERS: &[&str] = &["gemini", "ollama", "disabled"];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// SQLite file holding the vector index and the document registry.
    pub path: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_collection() -> String {
    "docchat".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap: default_overlap(),
            min_chunk_size: default_min_chunk_size(),
        }
    }
}

fn default_max_chars() -> usize {
    1200
}
fn default_overlap() -> usize {
    150
}
fn default_min_chunk_size() -> usize {
    20
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            max_chars: self.max_chars,
            overlap: self.overlap,
            min_chunk_size: self.min_chunk_size,
        }
    }
}

/// Primary backend plus optional fallback.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub primary: EmbeddingBackendConfig,
    #[serde(default)]
    pub fallback: Option<EmbeddingBackendConfig>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            primary: EmbeddingBackendConfig::with_provider("gemini"),
            fallback: Some(EmbeddingBackendConfig::with_provider("local")),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingBackendConfig {
    pub provider: String,
    /// Provider default when unset (see [`crate::embedding`]).
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama host, OpenAI-compatible proxy, Gemini endpoint).
    #[serde(default)]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl EmbeddingBackendConfig {
    pub fn with_provider(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            batch_size: default_batch_size(),
            max_retries: default_embedding_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_batch_size() -> usize {
    64
}
fn default_embedding_retries() -> u32 {
    2
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,
    #[serde(default = "default_low_confidence_top_n")]
    pub low_confidence_top_n: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            relevance_threshold: default_relevance_threshold(),
            low_confidence_top_n: default_low_confidence_top_n(),
            snippet_chars: default_snippet_chars(),
        }
    }
}

fn default_top_k() -> usize {
    8
}
fn default_relevance_threshold() -> f32 {
    0.6
}
fn default_low_confidence_top_n() -> usize {
    3
}
fn default_snippet_chars() -> usize {
    160
}

impl RetrievalConfig {
    pub fn params(&self) -> RetrievalParams {
        RetrievalParams {
            top_k: self.top_k,
            relevance_threshold: self.relevance_threshold,
            low_confidence_top_n: self.low_confidence_top_n,
            snippet_chars: self.snippet_chars,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    #[serde(default = "default_generation_top_k")]
    pub top_k: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            api_key_env: None,
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_generation_top_k(),
            max_output_tokens: default_max_output_tokens(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_top_p() -> f32 {
    0.8
}
fn default_generation_top_k() -> u32 {
    40
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_generation_retries() -> u32 {
    1
}
fn default_generation_timeout_secs() -> u64 {
    60
}

impl GenerationConfig {
    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.index.collection.trim().is_empty() {
        bail!("index.collection must not be empty");
    }

    // Chunking
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap >= config.chunking.max_chars {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.max_chars ({})",
            config.chunking.overlap,
            config.chunking.max_chars
        );
    }

    // Retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=2.0).contains(&config.retrieval.relevance_threshold) {
        bail!("retrieval.relevance_threshold must be in [0.0, 2.0]");
    }
    if config.retrieval.low_confidence_top_n < 1 {
        bail!("retrieval.low_confidence_top_n must be >= 1");
    }

    // Embedding
    validate_embedding("embedding.primary", &config.embedding.primary)?;
    if let Some(fallback) = &config.embedding.fallback {
        validate_embedding("embedding.fallback", fallback)?;
    }

    // Generation
    let gen = &config.generation;
    if !GENERATION_PROVIDERS.contains(&gen.provider.as_str()) {
        bail!(
            "Unknown generation provider: '{}'. Must be one of: {}.",
            gen.provider,
            GENERATION_PROVIDERS.join(", ")
        );
    }
    if !(0.0..=2.0).contains(&gen.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if !(gen.top_p > 0.0 && gen.top_p <= 1.0) {
        bail!("generation.top_p must be in (0.0, 1.0]");
    }
    if gen.max_output_tokens == 0 {
        bail!("generation.max_output_tokens must be > 0");
    }

    Ok(())
}

fn validate_embedding(section: &str, backend: &EmbeddingBackendConfig) -> Result<()> {
    if !EMBEDDING_PROVIDERS.contains(&backend.provider.as_str()) {
        bail!(
            "Unknown embedding provider in {}: '{}'. Must be one of: {}.",
            section,
            backend.provider,
            EMBEDDING_PROVIDERS.join(", ")
        );
    }
    if backend.dims == Some(0) {
        bail!("{}.dims must be > 0", section);
    }
    if backend.batch_size == 0 {
        bail!("{}.batch_size must be > 0", section);
    }
    if backend.provider == "ollama" {
        if backend.model.is_none() {
            bail!("{}.model must be specified when provider is 'ollama'", section);
        }
        if backend.dims.is_none() {
            bail!("{}.dims must be specified when provider is 'ollama'", section);
        }
    }
    Ok(())
}
