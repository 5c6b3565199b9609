//! Question answering over the vector index.
//!
//! [`RetrievalOrchestrator::ask`] retrieves the nearest chunks, keeps the
//! ones within the relevance threshold, builds a grounded prompt with
//! numbered citations, calls the [`Generator`] and assembles an [`Answer`].
//!
//! # Terminal states
//!
//! | Outcome | Trigger | Generator called |
//! |---------|---------|------------------|
//! | `EmptyQuestion` | blank question | no |
//! | `EmptyIndex` | nothing indexed | no |
//! | `RetrievalError` | embedding or index query failed | no |
//! | `Grounded` | at least one chunk within the threshold | yes |
//! | `LowConfidence` | no chunk within the threshold; top N used | yes |
//! | `GenerationError` | generator returned an error | yes |
//!
//! `ask` never returns an error: every state yields a well-formed answer.
//!
//! # Relevance
//!
//! Cosine distance `d ∈ [0, 2]` is shown as `max(0, (1 - d / 2) × 100)` percent.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::generation::{Generator, SamplingParams};
use crate::index::VectorIndexAdapter;
use crate::models::{Answer, AnswerOutcome, ScoredChunk, Source};

pub const EMPTY_QUESTION_ANSWER: &str = "Please type a question.";

pub const NO_DOCUMENTS_ANSWER: &str =
    "I don't have any documents uploaded yet. Please upload documents first before asking questions.";

pub const NO_RESPONSE_ANSWER: &str =
    "I apologize, but I couldn't generate a response. Please try again.";

const SYSTEM_INSTRUCTION: &str = "You are a careful document assistant. \
Answer the question using only the information in the context below. \
Cite every fact you use with its source number in square brackets, like [1]. \
Be thorough and combine details from all relevant sources. \
If the context does not contain the answer, or only part of it, say so plainly.";

const LOW_CONFIDENCE_CAVEAT: &str = "- The retrieved context is only loosely related to the question. \
Say so at the start of your answer and answer only what the context supports.";

/// Retrieval tuning. Defaults: `top_k = 8`, `relevance_threshold = 0.6`,
/// `low_confidence_top_n = 3`, `snippet_chars = 160`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalParams {
    pub top_k: usize,
    /// Maximum cosine distance a chunk may have to count as relevant.
    pub relevance_threshold: f32,
    /// How many unfiltered chunks to use when none clears the threshold.
    pub low_confidence_top_n: usize,
    pub snippet_chars: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 8,
            relevance_threshold: 0.6,
            low_confidence_top_n: 3,
            snippet_chars: 160,
        }
    }
}

/// Answers questions from indexed documents.
pub struct RetrievalOrchestrator {
    adapter: Arc<VectorIndexAdapter>,
    generator: Arc<dyn Generator>,
    params: RetrievalParams,
    sampling: SamplingParams,
}

impl RetrievalOrchestrator {
    pub fn new(
        adapter: Arc<VectorIndexAdapter>,
        generator: Arc<dyn Generator>,
        params: RetrievalParams,
        sampling: SamplingParams,
    ) -> Self {
        Self {
            adapter,
            generator,
            params,
            sampling,
        }
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// [`ask`](Self::ask) with the configured `top_k` and threshold.
    pub async fn ask_with_defaults(&self, question: &str) -> Answer {
        self.ask(question, self.params.top_k, self.params.relevance_threshold)
            .await
    }

    /// Answer `question` from the `k` nearest chunks.
    pub async fn ask(&self, question: &str, k: usize, relevance_threshold: f32) -> Answer {
        let question = question.trim();
        if question.is_empty() {
            return terminal(EMPTY_QUESTION_ANSWER.to_string(), AnswerOutcome::EmptyQuestion);
        }

        let result = match self.adapter.query(question, k).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "retrieval failed");
                return terminal(
                    format!("Error searching documents: {}", e),
                    AnswerOutcome::RetrievalError,
                );
            }
        };

        if result.is_empty() {
            info!("question asked against an empty index");
            return terminal(NO_DOCUMENTS_ANSWER.to_string(), AnswerOutcome::EmptyIndex);
        }

        let (selected, low_confidence) = select_chunks(
            result.matches,
            relevance_threshold,
            self.params.low_confidence_top_n,
        );
        if low_confidence {
            warn!(
                threshold = relevance_threshold,
                used = selected.len(),
                "no chunk within relevance threshold; answering with low confidence"
            );
        }
        debug!(selected = selected.len(), low_confidence, "context selected");

        let prompt = build_prompt(question, &format_context(&selected), low_confidence);

        let (answer, outcome) = match self.generator.generate(&prompt, &self.sampling).await {
            Ok(Some(text)) if !text.trim().is_empty() => (
                text.trim().to_string(),
                if low_confidence {
                    AnswerOutcome::LowConfidence
                } else {
                    AnswerOutcome::Grounded
                },
            ),
            Ok(_) => {
                warn!(provider = self.generator.name(), "generation returned no text");
                (
                    NO_RESPONSE_ANSWER.to_string(),
                    if low_confidence {
                        AnswerOutcome::LowConfidence
                    } else {
                        AnswerOutcome::Grounded
                    },
                )
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!(provider = self.generator.name(), error = %message, "generation failed");
                (
                    format!("Error generating response: {}", message),
                    AnswerOutcome::GenerationError,
                )
            }
        };

        let sources = selected
            .iter()
            .enumerate()
            .map(|(i, c)| Source {
                index: i + 1,
                doc_name: c.metadata.doc_name.clone(),
                snippet: snippet(&c.text, self.params.snippet_chars),
                distance: c.distance,
                relevance: relevance(c.distance),
            })
            .collect();

        Answer {
            answer,
            sources,
            low_confidence,
            outcome,
        }
    }
}

fn terminal(answer: String, outcome: AnswerOutcome) -> Answer {
    Answer {
        answer,
        sources: Vec::new(),
        low_confidence: false,
        outcome,
    }
}

/// Keep chunks with `distance <= threshold`; if none remain, take the
/// first `top_n` unfiltered and flag low confidence.
///
/// `matches` must already be ascending by distance.
pub fn select_chunks(
    matches: Vec<ScoredChunk>,
    threshold: f32,
    top_n: usize,
) -> (Vec<ScoredChunk>, bool) {
    if matches.iter().any(|m| m.distance <= threshold) {
        let kept = matches
            .into_iter()
            .filter(|m| m.distance <= threshold)
            .collect();
        (kept, false)
    } else {
        let mut fallback = matches;
        fallback.truncate(top_n.max(1));
        (fallback, true)
    }
}

/// Relevance percentage for a cosine distance.
pub fn relevance(distance: f32) -> f32 {
    ((1.0 - distance / 2.0) * 100.0).max(0.0)
}

/// First `max_chars` characters with newlines flattened, plus `...` when cut.
pub fn snippet(text: &str, max_chars: usize) -> String {
    let mut out: String = text
        .chars()
        .take(max_chars)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

/// Numbered context block, one entry per chunk.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                "[{}] {} (section {}, relevance {:.1}%)\n{}\n",
                i + 1,
                c.metadata.doc_name,
                c.metadata.chunk_index + 1,
                relevance(c.distance),
                c.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Full prompt sent to the generator.
pub fn build_prompt(question: &str, context: &str, low_confidence: bool) -> String {
    let mut prompt = format!(
        "{}\n\n# Question:\n{}\n\n# Context:\n{}\n\n# Instructions:\n\
         - Cite sources by their [index] where used.\n\
         - Use short paragraphs or bullet points where they help.\n\
         - Do not add information that is not in the context.\n",
        SYSTEM_INSTRUCTION, question, context
    );
    if low_confidence {
        prompt.push_str(LOW_CONFIDENCE_CAVEAT);
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingBackend, EmbeddingGateway};
    use crate::index::memory::InMemoryIndex;
    use crate::index::VectorIndex;
    use crate::models::{record_id, ChunkMetadata, IndexedRecord};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Embeds every query as the x axis.
    struct XAxis;

    #[async_trait]
    impl EmbeddingBackend for XAxis {
        fn name(&self) -> &str {
            "x-axis"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    struct Offline;

    #[async_trait]
    impl EmbeddingBackend for Offline {
        fn name(&self) -> &str {
            "offline"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
            anyhow::bail!("connection refused")
        }
    }

    enum Reply {
        Text(&'static str),
        Nothing,
        Fail(&'static str),
    }

    struct FakeGenerator {
        reply: Reply,
        calls: AtomicUsize,
        last_prompt: Mutex<Option<String>>,
    }

    impl FakeGenerator {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
                last_prompt: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn prompt(&self) -> String {
            self.last_prompt.lock().unwrap().clone().unwrap_or_default()
        }
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        fn name(&self) -> &str {
            "fake"
        }
        async fn generate(
            &self,
            prompt: &str,
            _params: &SamplingParams,
        ) -> anyhow::Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            match self.reply {
                Reply::Text(t) => Ok(Some(t.to_string())),
                Reply::Nothing => Ok(None),
                Reply::Fail(msg) => anyhow::bail!("{}", msg),
            }
        }
    }

    fn record(doc: &str, i: usize, vector: Vec<f32>, text: &str) -> IndexedRecord {
        IndexedRecord {
            id: record_id(doc, i),
            vector,
            text: text.to_string(),
            metadata: ChunkMetadata {
                doc_id: doc.to_string(),
                doc_name: format!("{}.txt", doc),
                chunk_index: i,
            },
        }
    }

    async fn orchestrator(
        backend: Arc<dyn EmbeddingBackend>,
        records: Vec<IndexedRecord>,
        generator: Arc<FakeGenerator>,
    ) -> RetrievalOrchestrator {
        let index = Arc::new(InMemoryIndex::new());
        if !records.is_empty() {
            index.upsert(&records).await.unwrap();
        }
        let adapter = Arc::new(VectorIndexAdapter::new(
            Arc::new(EmbeddingGateway::new(vec![backend])),
            index,
        ));
        RetrievalOrchestrator::new(
            adapter,
            generator,
            RetrievalParams::default(),
            SamplingParams::default(),
        )
    }

    #[tokio::test]
    async fn test_blank_question_short_circuits() {
        let gen = FakeGenerator::new(Reply::Text("unused"));
        let orch = orchestrator(Arc::new(XAxis), vec![], gen.clone()).await;
        let answer = orch.ask("   ", 8, 0.6).await;
        assert_eq!(answer.answer, EMPTY_QUESTION_ANSWER);
        assert_eq!(answer.outcome, AnswerOutcome::EmptyQuestion);
        assert_eq!(gen.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_index_returns_fixed_answer_without_generation() {
        let gen = FakeGenerator::new(Reply::Text("unused"));
        let orch = orchestrator(Arc::new(XAxis), vec![], gen.clone()).await;
        let answer = orch.ask_with_defaults("What is in my files?").await;
        assert_eq!(answer.answer, NO_DOCUMENTS_ANSWER);
        assert!(answer.sources.is_empty());
        assert_eq!(answer.outcome, AnswerOutcome::EmptyIndex);
        assert_eq!(gen.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_index_needs_no_embedding_backend() {
        let gen = FakeGenerator::new(Reply::Text("unused"));
        let orch = orchestrator(Arc::new(Offline), vec![], gen.clone()).await;
        let answer = orch.ask("anything?", 8, 0.6).await;
        assert_eq!(answer.outcome, AnswerOutcome::EmptyIndex);
    }

    #[tokio::test]
    async fn test_grounded_answer_filters_by_threshold() {
        let gen = FakeGenerator::new(Reply::Text("  Apples are red [1].  "));
        let orch = orchestrator(
            Arc::new(XAxis),
            vec![
                record("fruit", 0, vec![1.0, 0.0], "Apples are red."),
                record("fruit", 1, vec![0.0, 1.0], "Unrelated text."),
            ],
            gen.clone(),
        )
        .await;

        let answer = orch.ask("What colour are apples?", 8, 0.6).await;
        assert_eq!(answer.answer, "Apples are red [1].");
        assert_eq!(answer.outcome, AnswerOutcome::Grounded);
        assert!(!answer.low_confidence);
        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].index, 1);
        assert_eq!(answer.sources[0].doc_name, "fruit.txt");
        assert!((answer.sources[0].relevance - 100.0).abs() < 1e-3);

        let prompt = gen.prompt();
        assert!(prompt.contains("[1] fruit.txt (section 1, relevance 100.0%)"));
        assert!(prompt.contains("What colour are apples?"));
        assert!(!prompt.contains("Unrelated text."));
        assert!(!prompt.contains("loosely related"));
    }

    #[tokio::test]
    async fn test_low_confidence_uses_top_three() {
        let gen = FakeGenerator::new(Reply::Text("Not sure."));
        let records = (0..5)
            .map(|i| record("far", i, vec![0.0, 1.0], "Far away text."))
            .collect();
        let orch = orchestrator(Arc::new(XAxis), records, gen.clone()).await;

        let answer = orch.ask("question", 8, 0.6).await;
        assert!(answer.low_confidence);
        assert_eq!(answer.outcome, AnswerOutcome::LowConfidence);
        assert_eq!(answer.sources.len(), 3);
        assert!(gen.prompt().contains("loosely related"));
        assert_eq!(gen.calls(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_becomes_answer() {
        let gen = FakeGenerator::new(Reply::Fail("quota exceeded"));
        let orch = orchestrator(
            Arc::new(XAxis),
            vec![record("doc", 0, vec![1.0, 0.0], "Content.")],
            gen.clone(),
        )
        .await;

        let answer = orch.ask("question", 8, 0.6).await;
        assert_eq!(answer.answer, "Error generating response: quota exceeded");
        assert_eq!(answer.outcome, AnswerOutcome::GenerationError);
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_generation_becomes_apology() {
        let gen = FakeGenerator::new(Reply::Nothing);
        let orch = orchestrator(
            Arc::new(XAxis),
            vec![record("doc", 0, vec![1.0, 0.0], "Content.")],
            gen.clone(),
        )
        .await;

        let answer = orch.ask("question", 8, 0.6).await;
        assert_eq!(answer.answer, NO_RESPONSE_ANSWER);
        assert_eq!(answer.outcome, AnswerOutcome::Grounded);
    }

    #[tokio::test]
    async fn test_embedding_failure_becomes_retrieval_error() {
        let gen = FakeGenerator::new(Reply::Text("unused"));
        let orch = orchestrator(
            Arc::new(Offline),
            vec![record("doc", 0, vec![1.0, 0.0], "Content.")],
            gen.clone(),
        )
        .await;

        let answer = orch.ask("question", 8, 0.6).await;
        assert_eq!(answer.outcome, AnswerOutcome::RetrievalError);
        assert!(answer.answer.starts_with("Error searching documents:"));
        assert!(answer.answer.contains("connection refused"));
        assert!(answer.sources.is_empty());
        assert_eq!(gen.calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_k_on_populated_index_is_not_empty_index() {
        let gen = FakeGenerator::new(Reply::Text("unused"));
        let orch = orchestrator(
            Arc::new(XAxis),
            vec![record("fruit", 0, vec![1.0, 0.0], "Apples are red.")],
            gen.clone(),
        )
        .await;

        let answer = orch.ask("apples?", 0, 0.6).await;
        assert_ne!(answer.outcome, AnswerOutcome::EmptyIndex);
        assert_eq!(answer.outcome, AnswerOutcome::RetrievalError);
        assert!(answer.answer.contains("k must be at least 1"));
        assert_eq!(gen.calls(), 0);
    }

    #[test]
    fn test_relevance_formula() {
        assert!((relevance(0.0) - 100.0).abs() < 1e-4);
        assert!((relevance(0.5) - 75.0).abs() < 1e-4);
        assert_eq!(relevance(2.0), 0.0);
        assert_eq!(relevance(2.5), 0.0);
    }

    #[test]
    fn test_snippet_truncates_and_flattens() {
        assert_eq!(snippet("line one\nline two", 160), "line one line two");
        assert_eq!(snippet("abcdef", 3), "abc...");
        assert_eq!(snippet("abc", 3), "abc");
        assert_eq!(snippet("ééééé", 2), "éé...");
    }

    #[test]
    fn test_select_chunks_keeps_order() {
        let chunk = |d: f32| ScoredChunk {
            text: String::new(),
            metadata: ChunkMetadata {
                doc_id: "d".into(),
                doc_name: "d".into(),
                chunk_index: 0,
            },
            distance: d,
        };
        let (kept, low) = select_chunks(vec![chunk(0.1), chunk(0.6), chunk(0.9)], 0.6, 3);
        assert!(!low);
        assert_eq!(kept.len(), 2);

        let (kept, low) = select_chunks(vec![chunk(0.7), chunk(0.8)], 0.6, 3);
        assert!(low);
        assert_eq!(kept.len(), 2);
    }
}
