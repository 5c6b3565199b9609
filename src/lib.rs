//! # docchat
//!
//! Question answering over uploaded documents, with numbered citations.
//!
//! The retrieval-augmented core (chunking, the embedding gateway, the vector
//! index adapter, the ingestion pipeline and the retrieval orchestrator)
//! lives in [`docchat_core`]. This crate supplies the concrete pieces around
//! it: SQLite storage, HTTP and local embedding backends, generators,
//! configuration, and the CLI commands.
//!
//! ## Architecture
//!
//! ```text
//! ingest: file ─▶ extract ─▶ chunk ─▶ embed (primary, then fallback) ─▶ SQLite
//!
//! ask:    question ─▶ embed ─▶ nearest k ─▶ threshold ─▶ prompt ─▶ generator
//!                                                                    │
//!                                               answer + sources ◀───┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | Schema setup |
//! | [`sqlite_index`] | SQLite-backed vector index |
//! | [`documents`] | SQLite-backed document registry |
//! | [`extract`] | File type detection and text extraction |
//! | [`http`] | Shared HTTP client and retry loop |
//! | [`embedding`] | Embedding backends and gateway factory |
//! | [`generation`] | Text generators |
//! | [`services`] | Builds the component graph from a config |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`ingest`], [`ask`], [`stats`] | CLI commands |

pub mod ask;
pub mod config;
pub mod db;
pub mod documents;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod services;
pub mod sqlite_index;
pub mod stats;
