//! `docchat ingest` and `docchat remove`.

use anyhow::{Context, Result};
use std::path::Path;

use docchat_core::models::FileType;

use crate::config::Config;
use crate::services::Services;

/// Register, extract, chunk, embed and index one file.
///
/// The display name defaults to the file name. On failure nothing is left
/// behind: no registry record and no vectors.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    name: Option<String>,
    file_type: Option<String>,
) -> Result<()> {
    let forced_type = file_type
        .as_deref()
        .map(|t| t.parse::<FileType>())
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot derive a name from {}", path.display()))?,
    };

    let services = Services::build(config).await?;
    let result = services
        .pipeline
        .ingest_file(
            services.registry.as_ref(),
            &services.extractor,
            path,
            &name,
            forced_type,
        )
        .await;
    services.close().await;

    let record = result.with_context(|| format!("Failed to ingest {}", path.display()))?;
    println!(
        "Ingested {} ({}) as {}: {} chunks",
        record.name, record.file_type, record.id, record.num_chunks
    );
    Ok(())
}

/// Delete a document's vectors and its registry record.
pub async fn run_remove(config: &Config, doc_id: &str) -> Result<()> {
    let services = Services::build(config).await?;
    let result = services
        .pipeline
        .remove_document(services.registry.as_ref(), doc_id)
        .await;
    services.close().await;

    let record = result?;
    println!("Removed {} ({})", record.name, record.id);
    Ok(())
}
