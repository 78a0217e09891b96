//! Embedding Cache (spec.md §4.2).
//!
//! Memoizes per-text embedding vectors during a batch pairwise scan so
//! each distinct canonical text is embedded at most once despite O(N²)
//! pair comparisons. One instance per dedup run — it is not shared across
//! runs and has no eviction policy (spec.md §5).

use crate::error::TenetsError;
use crate::llm::EmbeddingCapable;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct EmbeddingCache {
    vectors: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the embedding for `text`, computing and storing it on miss.
    ///
    /// The critical section covers only the map lookup and insert — the
    /// embedder call itself runs with the lock released, per spec.md §5's
    /// concurrency model.
    pub fn get_or_compute(
        &self,
        text: &str,
        embedder: &dyn EmbeddingCapable,
    ) -> Result<Vec<f32>, TenetsError> {
        if let Some(v) = self.vectors.lock().unwrap().get(text) {
            return Ok(v.clone());
        }

        let computed = embedder.embed(text)?;

        let mut guard = self.vectors.lock().unwrap();
        Ok(guard.entry(text.to_string()).or_insert(computed).clone())
    }

    pub fn len(&self) -> usize {
        self.vectors.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
