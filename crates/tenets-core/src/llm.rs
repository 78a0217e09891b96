//! LLM Client Port (spec.md §4.8).
//!
//! The core depends on collaborator-owned LLM clients only through this
//! trait plus two optional capabilities, detected the way the teacher
//! gates optional subsystems behind Cargo features (`embeddings`,
//! `vector-search` in `vestige-core`) — here, by the caller supplying
//! `Option<&dyn EmbeddingCapable>` rather than a runtime type query, since
//! Rust trait objects don't support capability probing without an explicit
//! accessor.

use crate::behavior::Behavior;
use crate::error::TenetsError;

/// Result of comparing two behaviors wholesale (spec.md §4.1 step 3).
#[derive(Debug, Clone)]
pub struct ComparisonResult {
    pub semantic_similarity: f64,
}

/// Result of an LLM-driven merge (spec.md §4.4).
///
/// `merged` is `None` when the client declines to merge (e.g. it judged the
/// sources too dissimilar) — the Behavior Merger treats that the same as an
/// error and falls through to the rule-based merger.
#[derive(Debug, Clone)]
pub struct MergeResult {
    pub merged: Option<Behavior>,
}

/// Required capability of any LLM client the core is configured with.
pub trait LlmClient: Send + Sync {
    fn available(&self) -> bool;
    fn compare_behaviors(&self, a: &Behavior, b: &Behavior) -> Result<ComparisonResult, TenetsError>;
    fn merge_behaviors(&self, behaviors: &[Behavior]) -> Result<MergeResult, TenetsError>;
}

/// Optional capability: clients that can produce embeddings directly.
pub trait EmbeddingCapable: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, TenetsError>;
    fn compare_embeddings(&self, a: &[f32], b: &[f32]) -> f64;
}

/// Optional capability: clients that hold a resource needing explicit
/// teardown (a subprocess, a connection pool).
pub trait Closeable {
    fn close(&self) -> Result<(), TenetsError>;
}

/// Test double used by `tenets-core`'s own test suite and by
/// `tenets-cli --offline`. Returns canned responses so the similarity and
/// merge fallback chains are exercisable without a networked LLM.
pub struct StubLlmClient {
    pub is_available: bool,
    pub comparison: Option<f64>,
    pub merge_error: bool,
}

impl Default for StubLlmClient {
    fn default() -> Self {
        Self {
            is_available: true,
            comparison: None,
            merge_error: false,
        }
    }
}

impl LlmClient for StubLlmClient {
    fn available(&self) -> bool {
        self.is_available
    }

    fn compare_behaviors(&self, _a: &Behavior, _b: &Behavior) -> Result<ComparisonResult, TenetsError> {
        match self.comparison {
            Some(score) => Ok(ComparisonResult {
                semantic_similarity: score,
            }),
            None => Err(TenetsError::Llm("stub: no comparison configured".into())),
        }
    }

    fn merge_behaviors(&self, _behaviors: &[Behavior]) -> Result<MergeResult, TenetsError> {
        if self.merge_error {
            Err(TenetsError::Llm("stub: merge failed".into()))
        } else {
            Ok(MergeResult { merged: None })
        }
    }
}
