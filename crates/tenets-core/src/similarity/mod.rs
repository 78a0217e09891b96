//! Similarity Engine (spec.md §4.1).
//!
//! Single public operation, `compute`, walking the embedding→LLM→Jaccard
//! fallback chain. Every terminal return invokes the Decision Logger
//! (Testable Property 8) with both ids, the score, the method, the
//! threshold in effect, and `is_duplicate`.

mod deadline;
mod jaccard;

use crate::behavior::{Behavior, SimilarityMethod};
use crate::decision_log::{DecisionLogger, SimilarityEvent};
use crate::embedding_cache::EmbeddingCache;
use crate::llm::{EmbeddingCapable, LlmClient};

pub use jaccard::{tag_jaccard, token_jaccard, when_overlap};

use deadline::call_with_deadline;

/// Per-call configuration (spec.md §6 `SimilarityConfig`).
pub struct SimilarityConfig<'a> {
    pub use_llm: bool,
    pub llm_client: Option<&'a dyn LlmClient>,
    pub embedding_client: Option<&'a dyn EmbeddingCapable>,
    pub similarity_threshold: f64,
    pub embedding_threshold: f64,
    pub logger: Option<&'a dyn DecisionLogger>,
    pub embedding_cache: Option<&'a EmbeddingCache>,
}

impl<'a> SimilarityConfig<'a> {
    /// A config with the LLM/embedding branches disabled — Jaccard-only,
    /// used by Testable Property 1 (identity-of-identity).
    pub fn jaccard_only(similarity_threshold: f64) -> Self {
        Self {
            use_llm: false,
            llm_client: None,
            embedding_client: None,
            similarity_threshold,
            embedding_threshold: 0.0,
            logger: None,
            embedding_cache: None,
        }
    }
}

/// Weight given to when-overlap in the Jaccard-fallback composite score.
const WHEN_WEIGHT: f64 = 0.40;
/// Weight given to content (canonical) Jaccard when no tag signal exists.
const CONTENT_WEIGHT_NO_TAGS: f64 = 0.60;
/// When tags are present, the 60% content slice is reapportioned:
/// content keeps the bulk, tags get a small share (DESIGN.md's Open
/// Question decision).
const CONTENT_WEIGHT_WITH_TAGS: f64 = 0.45;
const TAG_WEIGHT: f64 = 0.15;

/// Compute the similarity of two behaviors, returning the score and the
/// method that produced it. Evaluates the decision tree in spec.md §4.1 and
/// always emits exactly one `similarity_computed` event when `config.logger`
/// is supplied.
pub fn compute(a: &Behavior, b: &Behavior, config: &SimilarityConfig<'_>) -> (f64, SimilarityMethod) {
    let result = compute_inner(a, b, config);
    emit_log(a, b, result, config);
    result
}

fn compute_inner(a: &Behavior, b: &Behavior, config: &SimilarityConfig<'_>) -> (f64, SimilarityMethod) {
    if config.use_llm {
        if let Some(client) = config.llm_client {
            if client.available() {
                if let Some(embedder) = config.embedding_client {
                    if let Some(score) = try_embedding(a, b, embedder, config.embedding_cache) {
                        return (score, SimilarityMethod::Embedding);
                    }
                }
                if let Some(score) = try_llm(a, b, client) {
                    return (score, SimilarityMethod::Llm);
                }
            }
        }
    }
    (jaccard_fallback(a, b), SimilarityMethod::Jaccard)
}

fn try_embedding(
    a: &Behavior,
    b: &Behavior,
    embedder: &dyn EmbeddingCapable,
    cache: Option<&EmbeddingCache>,
) -> Option<f64> {
    let fetch = |text: &str| -> Option<Vec<f32>> {
        call_with_deadline(|| match cache {
            Some(cache) => cache.get_or_compute(text, embedder).ok(),
            None => embedder.embed(text).ok(),
        })
        .flatten()
    };

    let va = fetch(&a.content.canonical)?;
    let vb = fetch(&b.content.canonical)?;
    call_with_deadline(|| embedder.compare_embeddings(&normalize(&va), &normalize(&vb)))
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

fn try_llm(a: &Behavior, b: &Behavior, client: &dyn LlmClient) -> Option<f64> {
    call_with_deadline(|| client.compare_behaviors(a, b).ok())
        .flatten()
        .map(|r| r.semantic_similarity)
}

fn jaccard_fallback(a: &Behavior, b: &Behavior) -> f64 {
    let content = token_jaccard(&a.content.canonical, &b.content.canonical);
    let when = when_overlap(&a.when, &b.when);
    let tags = tag_jaccard(&a.content.tags, &b.content.tags);

    match tags {
        Some(tag_score) => WHEN_WEIGHT * when + CONTENT_WEIGHT_WITH_TAGS * content + TAG_WEIGHT * tag_score,
        None => WHEN_WEIGHT * when + CONTENT_WEIGHT_NO_TAGS * content,
    }
}

fn emit_log(a: &Behavior, b: &Behavior, result: (f64, SimilarityMethod), config: &SimilarityConfig<'_>) {
    let Some(logger) = config.logger else {
        return;
    };
    let (score, method) = result;
    let threshold = if method == SimilarityMethod::Embedding && config.embedding_threshold > 0.0 {
        config.embedding_threshold
    } else {
        config.similarity_threshold
    };
    logger.log_similarity(&SimilarityEvent {
        behavior_a: a.id.clone(),
        behavior_b: b.id.clone(),
        score,
        method,
        threshold,
        is_duplicate: score >= threshold,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use crate::llm::{ComparisonResult, MergeResult};
    use std::cell::Cell;

    fn behavior(id: &str, canonical: &str) -> Behavior {
        Behavior::new(id, "name", canonical)
    }

    #[test]
    fn identity_of_identity_is_one_via_jaccard() {
        let a = behavior("a", "use pathlib for file paths");
        let cfg = SimilarityConfig::jaccard_only(0.9);
        let (score, method) = compute(&a, &a, &cfg);
        assert_eq!(score, 1.0);
        assert_eq!(method, SimilarityMethod::Jaccard);
    }

    #[test]
    fn jaccard_symmetric() {
        let a = behavior("a", "use pathlib for file paths");
        let b = behavior("b", "use pathlib when touching paths");
        let cfg = SimilarityConfig::jaccard_only(0.9);
        let (s1, _) = compute(&a, &b, &cfg);
        let (s2, _) = compute(&b, &a, &cfg);
        assert!((s1 - s2).abs() < 1e-9);
    }

    struct FailingLlm;
    impl LlmClient for FailingLlm {
        fn available(&self) -> bool {
            true
        }
        fn compare_behaviors(&self, _a: &Behavior, _b: &Behavior) -> Result<ComparisonResult, crate::error::TenetsError> {
            Err(crate::error::TenetsError::Llm("boom".into()))
        }
        fn merge_behaviors(&self, _b: &[Behavior]) -> Result<MergeResult, crate::error::TenetsError> {
            unreachable!()
        }
    }

    #[test]
    fn llm_failure_falls_through_to_jaccard() {
        let a = behavior("a", "use pathlib for file paths");
        let client = FailingLlm;
        let cfg = SimilarityConfig {
            use_llm: true,
            llm_client: Some(&client),
            embedding_client: None,
            similarity_threshold: 0.9,
            embedding_threshold: 0.0,
            logger: None,
            embedding_cache: None,
        };
        let (score, method) = compute(&a, &a, &cfg);
        assert_eq!(method, SimilarityMethod::Jaccard);
        assert_eq!(score, 1.0);
    }

    struct WorkingLlm {
        score: f64,
    }
    impl LlmClient for WorkingLlm {
        fn available(&self) -> bool {
            true
        }
        fn compare_behaviors(&self, _a: &Behavior, _b: &Behavior) -> Result<ComparisonResult, crate::error::TenetsError> {
            Ok(ComparisonResult {
                semantic_similarity: self.score,
            })
        }
        fn merge_behaviors(&self, _b: &[Behavior]) -> Result<MergeResult, crate::error::TenetsError> {
            unreachable!()
        }
    }

    #[test]
    fn llm_success_uses_llm_method() {
        let a = behavior("a", "x");
        let b = behavior("b", "y");
        let client = WorkingLlm { score: 0.77 };
        let cfg = SimilarityConfig {
            use_llm: true,
            llm_client: Some(&client),
            embedding_client: None,
            similarity_threshold: 0.9,
            embedding_threshold: 0.0,
            logger: None,
            embedding_cache: None,
        };
        let (score, method) = compute(&a, &b, &cfg);
        assert_eq!(method, SimilarityMethod::Llm);
        assert_eq!(score, 0.77);
    }

    struct EmbedClient {
        calls: Cell<u32>,
    }
    impl EmbeddingCapable for EmbedClient {
        fn embed(&self, text: &str) -> Result<Vec<f32>, crate::error::TenetsError> {
            self.calls.set(self.calls.get() + 1);
            Ok(vec![text.len() as f32, 1.0])
        }
        fn compare_embeddings(&self, _a: &[f32], _b: &[f32]) -> f64 {
            0.85
        }
    }

    #[test]
    fn embedding_branch_preferred_and_logs_embedding_threshold() {
        let a = behavior("a", "x");
        let b = behavior("b", "y");
        let llm = WorkingLlm { score: 0.1 };
        let embedder = EmbedClient { calls: Cell::new(0) };
        let cfg = SimilarityConfig {
            use_llm: true,
            llm_client: Some(&llm),
            embedding_client: Some(&embedder),
            similarity_threshold: 0.9,
            embedding_threshold: 0.8,
            logger: None,
            embedding_cache: None,
        };
        let (score, method) = compute(&a, &b, &cfg);
        assert_eq!(method, SimilarityMethod::Embedding);
        assert_eq!(score, 0.85);
    }

    struct CountingLogger {
        calls: Cell<u32>,
    }
    impl DecisionLogger for CountingLogger {
        fn log_similarity(&self, event: &SimilarityEvent) {
            self.calls.set(self.calls.get() + 1);
            assert_eq!(event.is_duplicate, event.score >= event.threshold);
        }
        fn log_merge_triggered(&self, _e: &crate::decision_log::MergeEvent) {}
        fn log_merge_skipped(&self, _e: &crate::decision_log::MergeEvent) {}
    }

    #[test]
    fn exactly_one_log_event_per_compute_call() {
        let a = behavior("a", "x y z");
        let b = behavior("b", "x y z");
        let logger = CountingLogger { calls: Cell::new(0) };
        let cfg = SimilarityConfig {
            logger: Some(&logger),
            ..SimilarityConfig::jaccard_only(0.9)
        };
        compute(&a, &b, &cfg);
        assert_eq!(logger.calls.get(), 1);
    }
}
