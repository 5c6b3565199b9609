//! `docchat docs` and `docchat stats`: what is uploaded and what is indexed.

use anyhow::Result;
use docchat_core::registry::DocumentRegistry;

use crate::config::Config;
use crate::services::Services;

/// List registered documents, newest first.
pub async fn run_docs(config: &Config, json: bool) -> Result<()> {
    let services = Services::build(config).await?;
    let docs = services.registry.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
    } else if docs.is_empty() {
        println!("No documents uploaded.");
    } else {
        println!(
            "{:<36}  {:<6} {:>6}  {:<8} {:<16}  NAME",
            "ID", "TYPE", "CHUNKS", "EMBEDDED", "UPLOADED"
        );
        for doc in &docs {
            println!(
                "{:<36}  {:<6} {:>6}  {:<8} {:<16}  {}",
                doc.id,
                doc.file_type,
                doc.num_chunks,
                if doc.embedded { "yes" } else { "no" },
                doc.uploaded_at.format("%Y-%m-%d %H:%M"),
                doc.name
            );
        }
    }

    services.close().await;
    Ok(())
}

/// Print a summary of the registry and the vector index.
pub async fn run_stats(config: &Config) -> Result<()> {
    let services = Services::build(config).await?;

    let docs = services.registry.list().await?;
    let embedded = docs.iter().filter(|d| d.embedded).count();
    let chunk_count = services.adapter.count().await;
    let indexed = services.adapter.list_documents().await?;
    let db_size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docchat stats");
    println!("=============");
    println!();
    println!("  Database:    {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Collection:  {}", config.index.collection);
    println!(
        "  Embedders:   {}",
        services.adapter.gateway().backend_names().join(" -> ")
    );
    println!();
    println!("  Documents:   {}", docs.len());
    println!("  Embedded:    {} / {}", embedded, docs.len());
    println!("  Chunks:      {}", chunk_count);

    if !indexed.is_empty() {
        println!();
        println!("  By document:");
        println!("  {:<40} {:>8}", "NAME", "CHUNKS");
        println!("  {}", "-".repeat(49));
        for doc in &indexed {
            println!("  {:<40} {:>8}", doc.doc_name, doc.chunks);
        }
    }
    println!();

    services.close().await;
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
