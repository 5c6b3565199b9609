//! # docchat CLI
//!
//! Upload documents, then ask questions answered from their contents with
//! numbered citations.
//!
//! ## Usage
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat init` | Create the SQLite database and schema |
//! | `docchat ingest <path>` | Extract, chunk, embed and index a file |
//! | `docchat ask "<question>"` | Answer from the indexed documents |
//! | `docchat remove <id>` | Delete a document and its vectors |
//! | `docchat docs` | List uploaded documents |
//! | `docchat stats` | Summarize the registry and the index |
//!
//! ## Examples
//!
//! ```bash
//! docchat init
//! docchat ingest ./handbook.txt
//! docchat ask "How long do refunds take?"
//! docchat ask "What is the travel policy?" -k 12 --threshold 0.8 --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use docchat::{ask, config, ingest, logging, migrate, stats};

/// docchat: question answering over your own documents.
#[derive(Parser)]
#[command(
    name = "docchat",
    about = "Question answering over uploaded documents with cited sources",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run more than once.
    Init,

    /// Ingest a file.
    ///
    /// The file is registered, its text extracted and split into
    /// overlapping chunks, and each chunk embedded and indexed. A failed
    /// ingest leaves no record behind.
    Ingest {
        /// Path to the file.
        path: PathBuf,

        /// Display name (defaults to the file name).
        #[arg(long)]
        name: Option<String>,

        /// Force the file type instead of detecting it from the extension:
        /// `txt`, `pdf`, `docx`, or `image`.
        #[arg(long = "type")]
        file_type: Option<String>,
    },

    /// Ask a question.
    Ask {
        /// The question.
        question: String,

        /// Number of nearest chunks to retrieve (defaults to `[retrieval].top_k`).
        #[arg(short, long)]
        k: Option<usize>,

        /// Maximum cosine distance for a chunk to count as relevant
        /// (defaults to `[retrieval].relevance_threshold`).
        #[arg(long)]
        threshold: Option<f32>,

        /// Print the answer and sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Remove a document and its vectors.
    Remove {
        /// Document id (see `docchat docs`).
        doc_id: String,
    },

    /// List uploaded documents.
    Docs {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show registry and index statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            name,
            file_type,
        } => {
            ingest::run_ingest(&cfg, &path, name, file_type).await?;
        }
        Commands::Ask {
            question,
            k,
            threshold,
            json,
        } => {
            ask::run_ask(&cfg, &question, k, threshold, json).await?;
        }
        Commands::Remove { doc_id } => {
            ingest::run_remove(&cfg, &doc_id).await?;
        }
        Commands::Docs { json } => {
            stats::run_docs(&cfg, json).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
