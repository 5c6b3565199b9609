//! Wiring: one place that turns a [`Config`] into live components.
//!
//! Every command builds a [`Services`] and works through it, so the CLI
//! and the tests exercise the same graph:
//!
//! ```text
//! SqlitePool ─┬─ SqliteRegistry
//!             └─ SqliteIndex ─┐
//! EmbeddingGateway ───────────┴─ VectorIndexAdapter ─┬─ IngestionPipeline
//! Generator ─────────────────────────────────────────┴─ RetrievalOrchestrator
//! ```

use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, warn};

use docchat_core::index::VectorIndexAdapter;
use docchat_core::ingest::IngestionPipeline;
use docchat_core::retrieval::RetrievalOrchestrator;

use crate::config::Config;
use crate::documents::SqliteRegistry;
use crate::embedding::create_gateway;
use crate::extract::FileExtractor;
use crate::generation::create_generator;
use crate::sqlite_index::SqliteIndex;
use crate::{db, migrate};

pub struct Services {
    pub pool: SqlitePool,
    pub registry: Arc<SqliteRegistry>,
    pub extractor: FileExtractor,
    pub adapter: Arc<VectorIndexAdapter>,
    pub pipeline: IngestionPipeline,
    pub orchestrator: RetrievalOrchestrator,
}

impl Services {
    /// Connect, make sure the schema exists, and build every component.
    ///
    /// No network calls happen here; backends connect on first use.
    pub async fn build(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;

        let embedding = &config.embedding;
        if !embedding.primary.is_enabled()
            && !embedding.fallback.as_ref().is_some_and(|f| f.is_enabled())
        {
            warn!("every embedding backend is disabled; documents cannot be indexed or searched");
        }

        let gateway = Arc::new(create_gateway(embedding)?);
        let index = Arc::new(SqliteIndex::new(pool.clone(), &config.index.collection));
        let generator = create_generator(&config.generation)?;

        debug!(
            db = %config.index.path.display(),
            collection = index.collection(),
            embedders = ?gateway.backend_names(),
            generator = generator.name(),
            "services ready"
        );

        let adapter = Arc::new(VectorIndexAdapter::new(gateway, index));

        Ok(Self {
            registry: Arc::new(SqliteRegistry::new(pool.clone())),
            extractor: FileExtractor,
            pipeline: IngestionPipeline::new(adapter.clone(), config.chunking.params()),
            orchestrator: RetrievalOrchestrator::new(
                adapter.clone(),
                generator,
                config.retrieval.params(),
                config.generation.sampling(),
            ),
            adapter,
            pool,
        })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
