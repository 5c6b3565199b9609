//! Ingest-then-ask flows over the in-memory index with fake backends.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docchat_core::chunk::ChunkingParams;
use docchat_core::embedding::{EmbeddingBackend, EmbeddingGateway};
use docchat_core::extract::{ExtractedText, TextExtractor};
use docchat_core::generation::{Generator, SamplingParams};
use docchat_core::index::memory::InMemoryIndex;
use docchat_core::index::VectorIndexAdapter;
use docchat_core::ingest::IngestionPipeline;
use docchat_core::models::{AnswerOutcome, DocumentRef, FileType};
use docchat_core::registry::{DocumentRegistry, InMemoryRegistry};
use docchat_core::retrieval::{RetrievalOrchestrator, RetrievalParams, NO_DOCUMENTS_ANSWER};

const VOCAB: [&str; 4] = ["refund", "vacation", "password", "shipping"];

/// One dimension per vocabulary word, counting occurrences.
struct KeywordBackend;

#[async_trait]
impl EmbeddingBackend for KeywordBackend {
    fn name(&self) -> &str {
        "keywords"
    }
    fn dims(&self) -> usize {
        VOCAB.len()
    }
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                VOCAB
                    .iter()
                    .map(|w| lower.matches(w).count() as f32)
                    .collect()
            })
            .collect())
    }
}

struct OfflineBackend;

#[async_trait]
impl EmbeddingBackend for OfflineBackend {
    fn name(&self) -> &str {
        "offline"
    }
    fn dims(&self) -> usize {
        768
    }
    async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("connection refused")
    }
}

#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn name(&self) -> &str {
        "recording"
    }
    async fn generate(
        &self,
        prompt: &str,
        _params: &SamplingParams,
    ) -> anyhow::Result<Option<String>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(Some("See [1].".to_string()))
    }
}

struct StaticExtractor(&'static str);

#[async_trait]
impl TextExtractor for StaticExtractor {
    async fn extract(
        &self,
        _path: &Path,
        forced_type: Option<FileType>,
    ) -> docchat_core::Result<ExtractedText> {
        Ok(ExtractedText {
            text: self.0.to_string(),
            file_type: forced_type.unwrap_or(FileType::Txt),
        })
    }
}

struct Harness {
    adapter: Arc<VectorIndexAdapter>,
    pipeline: IngestionPipeline,
    orchestrator: RetrievalOrchestrator,
    generator: Arc<RecordingGenerator>,
}

fn harness(chunking: ChunkingParams) -> Harness {
    // Primary is down for the whole run; every vector comes from the fallback.
    let gateway = Arc::new(EmbeddingGateway::with_fallback(
        Arc::new(OfflineBackend),
        Some(Arc::new(KeywordBackend) as Arc<dyn EmbeddingBackend>),
    ));
    let adapter = Arc::new(VectorIndexAdapter::new(
        gateway,
        Arc::new(InMemoryIndex::new()),
    ));
    let generator = Arc::new(RecordingGenerator::default());
    Harness {
        pipeline: IngestionPipeline::new(adapter.clone(), chunking),
        orchestrator: RetrievalOrchestrator::new(
            adapter.clone(),
            generator.clone(),
            RetrievalParams::default(),
            SamplingParams::default(),
        ),
        adapter,
        generator,
    }
}

const REFUND_DOC: &str =
    "Refund requests are handled within five business days. Every refund goes back to the original card.";
const VACATION_DOC: &str =
    "Employees accrue vacation days every month. Unused vacation carries over into the next year.";

#[tokio::test]
async fn grounded_answer_cites_only_relevant_document() {
    let h = harness(ChunkingParams::default());
    h.pipeline
        .ingest_text(&DocumentRef::new("d1", "refund-policy.txt"), REFUND_DOC)
        .await
        .unwrap();
    h.pipeline
        .ingest_text(&DocumentRef::new("d2", "vacation.txt"), VACATION_DOC)
        .await
        .unwrap();
    assert_eq!(h.adapter.count().await, 2);

    let answer = h.orchestrator.ask_with_defaults("How does a refund work?").await;
    assert_eq!(answer.outcome, AnswerOutcome::Grounded);
    assert!(!answer.low_confidence);
    assert_eq!(answer.answer, "See [1].");
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(answer.sources[0].index, 1);
    assert_eq!(answer.sources[0].doc_name, "refund-policy.txt");
    assert!(answer.sources[0].distance < 1e-4);
    assert!((answer.sources[0].relevance - 100.0).abs() < 1e-2);

    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("[1] refund-policy.txt"));
    assert!(!prompts[0].contains("vacation.txt"));
}

#[tokio::test]
async fn unrelated_question_falls_back_to_low_confidence() {
    let h = harness(ChunkingParams::default());
    h.pipeline
        .ingest_text(&DocumentRef::new("d1", "refund-policy.txt"), REFUND_DOC)
        .await
        .unwrap();
    h.pipeline
        .ingest_text(&DocumentRef::new("d2", "vacation.txt"), VACATION_DOC)
        .await
        .unwrap();

    let answer = h.orchestrator.ask_with_defaults("How do I reset my password?").await;
    assert_eq!(answer.outcome, AnswerOutcome::LowConfidence);
    assert!(answer.low_confidence);
    assert_eq!(answer.sources.len(), 2);
    assert!(answer.sources.iter().all(|s| s.distance > 0.6));

    let prompts = h.generator.prompts.lock().unwrap();
    assert!(prompts[0].contains("loosely related"));
}

#[tokio::test]
async fn replace_text_drops_leftover_chunks() {
    let h = harness(ChunkingParams {
        max_chars: 60,
        overlap: 10,
        min_chunk_size: 5,
    });
    let doc = DocumentRef::new("d1", "shipping.txt");
    let long_text = "Shipping takes three to five days for domestic orders. ".repeat(10);

    let first = h.pipeline.ingest_text(&doc, &long_text).await.unwrap();
    assert!(first.chunks > 1);
    assert_eq!(h.adapter.count().await, first.chunks);

    let second = h
        .pipeline
        .replace_text(&doc, "Shipping is free over fifty dollars.")
        .await
        .unwrap();
    assert_eq!(second.chunks, 1);
    assert_eq!(h.adapter.count().await, 1);
}

#[tokio::test]
async fn file_lifecycle_through_registry() {
    let h = harness(ChunkingParams::default());
    let registry = InMemoryRegistry::new();

    let record = h
        .pipeline
        .ingest_file(
            &registry,
            &StaticExtractor(REFUND_DOC),
            Path::new("refund-policy.txt"),
            "refund-policy.txt",
            None,
        )
        .await
        .unwrap();
    assert!(record.embedded);
    assert_eq!(record.num_chunks, 1);
    assert_eq!(registry.list().await.unwrap().len(), 1);

    let listed = h.adapter.list_documents().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].doc_id, record.id);

    h.pipeline
        .remove_document(&registry, &record.id)
        .await
        .unwrap();
    assert!(registry.list().await.unwrap().is_empty());
    assert_eq!(h.adapter.count().await, 0);

    let answer = h.orchestrator.ask_with_defaults("How does a refund work?").await;
    assert_eq!(answer.outcome, AnswerOutcome::EmptyIndex);
    assert_eq!(answer.answer, NO_DOCUMENTS_ANSWER);
    assert!(h.generator.prompts.lock().unwrap().is_empty());
}
