//! Cross-Store Deduplicator (spec.md §4.6).

use super::DeduplicatorConfig;
use crate::behavior::{Behavior, DedupAction, DeduplicationResult};
use crate::decision_log::{DecisionLogger, MergeEvent};
use crate::embedding_cache::EmbeddingCache;
use crate::error::TenetsError;
use crate::llm::{EmbeddingCapable, LlmClient};
use crate::merger::{self, MergerConfig};
use crate::similarity::{self, SimilarityConfig};
use crate::store::{Edge, EdgeDirection, GraphStore, Node, NodeQuery};
use chrono::Utc;
use std::collections::HashMap;

/// Compares a local store against a shared global store, skipping id
/// collisions, merging the single best semantic match above threshold, and
/// redirecting edges off the two merged-away ids onto the merged id.
pub struct CrossStoreDeduplicator<'a> {
    pub local: &'a dyn GraphStore,
    pub global: &'a dyn GraphStore,
    pub config: DeduplicatorConfig,
    pub llm_client: Option<&'a dyn LlmClient>,
    pub embedding_client: Option<&'a dyn EmbeddingCapable>,
    pub logger: Option<&'a dyn DecisionLogger>,
}

impl<'a> CrossStoreDeduplicator<'a> {
    pub fn deduplicate_across(&self) -> Result<Vec<DeduplicationResult>, TenetsError> {
        let local_nodes = self.local.query_nodes(&NodeQuery::behaviors())?;
        let global_nodes = self.global.query_nodes(&NodeQuery::behaviors())?;

        let local_behaviors: Vec<Behavior> = local_nodes.iter().filter_map(Behavior::from_node).collect();
        let global_behaviors: Vec<Behavior> = global_nodes.iter().filter_map(Behavior::from_node).collect();
        let global_by_id: HashMap<&str, &Behavior> =
            global_behaviors.iter().map(|b| (b.id.as_str(), b)).collect();

        let cache = self.llm_client.is_some().then(EmbeddingCache::new);
        let mut results = Vec::with_capacity(local_behaviors.len());

        for local in &local_behaviors {
            if let Some(&existing) = global_by_id.get(local.id.as_str()) {
                results.push(DeduplicationResult {
                    local: local.clone(),
                    action: DedupAction::Skip,
                    global_match: Some(existing.clone()),
                    merged: None,
                    similarity: None,
                    error: None,
                });
                continue;
            }

            let best = self.best_match(local, &global_behaviors, cache.as_ref());
            match best {
                Some((global_match, score)) if score >= self.config.similarity_threshold => {
                    results.push(self.merge_and_redirect(local, global_match, score));
                }
                _ => {
                    results.push(DeduplicationResult {
                        local: local.clone(),
                        action: DedupAction::None,
                        global_match: None,
                        merged: None,
                        similarity: None,
                        error: None,
                    });
                }
            }
        }

        Ok(results)
    }

    fn best_match<'b>(
        &'b self,
        local: &Behavior,
        globals: &'b [Behavior],
        cache: Option<&'b EmbeddingCache>,
    ) -> Option<(&'b Behavior, f64)> {
        globals
            .iter()
            .map(|g| {
                let cfg = SimilarityConfig {
                    use_llm: self.config.use_llm,
                    llm_client: self.llm_client,
                    embedding_client: self.embedding_client,
                    similarity_threshold: self.config.similarity_threshold,
                    embedding_threshold: self.config.embedding_threshold,
                    logger: self.logger,
                    embedding_cache: cache,
                };
                let (score, _method) = similarity::compute(local, g, &cfg);
                (g, score)
            })
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    }

    fn merge_and_redirect(&self, local: &Behavior, global: &Behavior, similarity: f64) -> DeduplicationResult {
        if !self.config.auto_merge {
            if let Some(logger) = self.logger {
                logger.log_merge_skipped(&MergeEvent {
                    behavior_id: local.id.clone(),
                    merge_target: global.id.clone(),
                    similarity,
                    threshold: self.config.similarity_threshold,
                    reason: Some("auto_merge disabled".to_string()),
                });
            }
            return DeduplicationResult {
                local: local.clone(),
                action: DedupAction::Merge,
                global_match: Some(global.clone()),
                merged: None,
                similarity: Some(similarity),
                error: None,
            };
        }

        let merge_result = merger::merge(
            &[local.clone(), global.clone()],
            &MergerConfig {
                llm_client: self.llm_client,
                use_llm: self.config.use_llm,
            },
        );

        match merge_result {
            Ok(merged) => {
                let mut error = None;
                if let Err(e) = self.redirect_edges(&local.id, &global.id, &merged.id) {
                    error = Some(e.to_string());
                }
                if let Some(logger) = self.logger {
                    logger.log_merge_triggered(&MergeEvent {
                        behavior_id: local.id.clone(),
                        merge_target: merged.id.clone(),
                        similarity,
                        threshold: self.config.similarity_threshold,
                        reason: None,
                    });
                }
                DeduplicationResult {
                    local: local.clone(),
                    action: DedupAction::Merge,
                    global_match: Some(global.clone()),
                    merged: Some(merged),
                    similarity: Some(similarity),
                    error,
                }
            }
            Err(e) => DeduplicationResult {
                local: local.clone(),
                action: DedupAction::Merge,
                global_match: Some(global.clone()),
                merged: None,
                similarity: Some(similarity),
                error: Some(e.to_string()),
            },
        }
    }

    /// Redirects every edge touching `local_id` (in the local store) and
    /// `global_id` (in the global store) onto `merged_id`. Best-effort:
    /// collects the first error it hits but keeps going, since the
    /// "no dangling edges" invariant is convergent, not immediate
    /// (spec.md §5).
    fn redirect_edges(&self, local_id: &str, global_id: &str, merged_id: &str) -> Result<(), TenetsError> {
        let mut first_error = None;
        if let Err(e) = redirect_in_store(self.local, local_id, merged_id) {
            first_error.get_or_insert(e);
        }
        if let Err(e) = redirect_in_store(self.global, global_id, merged_id) {
            first_error.get_or_insert(e);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn redirect_in_store(store: &dyn GraphStore, old_id: &str, merged_id: &str) -> Result<(), TenetsError> {
    let mut last_error = None;

    for edge in store.get_edges(old_id, EdgeDirection::Inbound, None)? {
        if let Err(e) = store.remove_edge(&edge.source, &edge.target, &edge.kind) {
            last_error = Some(e);
            continue;
        }
        let mut redirected = edge.clone();
        redirected.target = merged_id.to_string();
        fill_defaults(&mut redirected);
        if let Err(e) = store.add_edge(&redirected) {
            last_error = Some(e);
        }
    }

    for edge in store.get_edges(old_id, EdgeDirection::Outbound, None)? {
        if let Err(e) = store.remove_edge(&edge.source, &edge.target, &edge.kind) {
            last_error = Some(e);
            continue;
        }
        let mut redirected = edge.clone();
        redirected.source = merged_id.to_string();
        fill_defaults(&mut redirected);
        if let Err(e) = store.add_edge(&redirected) {
            last_error = Some(e);
        }
    }

    match last_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn fill_defaults(edge: &mut Edge) {
    if edge.weight <= 0.0 {
        edge.weight = 1.0;
    }
    // created_at always carries forward from the original edge; the only
    // case needing a fresh value is one newly synthesized with no prior
    // timestamp, which `Edge::new` already defaults to `Utc::now()`. Kept
    // here for the degenerate case of a zero-value timestamp slipping in
    // from an untrusted collaborator store.
    if edge.created_at.timestamp() == 0 {
        edge.created_at = Utc::now();
    }
}
