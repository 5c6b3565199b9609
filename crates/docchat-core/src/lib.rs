//! # DocChat Core
//!
//! Runtime-agnostic logic for DocChat: data models, chunking, the
//! embedding gateway, the vector index contract, question answering and
//! ingestion.
//!
//! This crate contains no HTTP clients, sqlx, or tokio runtime. Concrete
//! embedding and generation backends, the SQLite index and registry, and
//! the CLI live in the `docchat` crate and plug in through the traits
//! defined here:
//!
//! | Trait | Module |
//! |-------|--------|
//! | [`EmbeddingBackend`](embedding::EmbeddingBackend) | [`embedding`] |
//! | [`VectorIndex`](index::VectorIndex) | [`index`] |
//! | [`Generator`](generation::Generator) | [`generation`] |
//! | [`DocumentRegistry`](registry::DocumentRegistry) | [`registry`] |
//! | [`TextExtractor`](extract::TextExtractor) | [`extract`] |

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod models;
pub mod registry;
pub mod retrieval;

pub use error::{Error, Result};
