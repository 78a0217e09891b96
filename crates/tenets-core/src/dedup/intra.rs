//! Intra-Store Deduplicator (spec.md §4.5).

use super::DeduplicatorConfig;
use crate::behavior::{Behavior, DeduplicationReport, DuplicateMatch, SimilarityMethod};
use crate::cancellation::Cancellation;
use crate::decision_log::{DecisionLogger, MergeEvent};
use crate::embedding_cache::EmbeddingCache;
use crate::error::{StoreError, TenetsError};
use crate::llm::{EmbeddingCapable, LlmClient};
use crate::merger::{self, MergerConfig};
use crate::similarity::{self, SimilarityConfig};
use crate::store::{GraphStore, Node, NodeId, NodeQuery, Scope, ScopedNodeAdder};
use std::collections::HashSet;

/// Scans a single store for near-duplicate behaviors and merges them in
/// place.
pub struct IntraStoreDeduplicator<'a> {
    pub store: &'a dyn GraphStore,
    /// Present when the store partitions nodes by scope; write-back routes
    /// through this instead of the plain `add_node` when set.
    pub scoped_store: Option<&'a dyn ScopedNodeAdder>,
    pub config: DeduplicatorConfig,
    pub llm_client: Option<&'a dyn LlmClient>,
    pub embedding_client: Option<&'a dyn EmbeddingCapable>,
    pub logger: Option<&'a dyn DecisionLogger>,
}

impl<'a> IntraStoreDeduplicator<'a> {
    /// Finds every other behavior node at or above the effective
    /// similarity threshold with `behavior`. Creates its own short-lived
    /// Embedding Cache — callers that want one cache shared across many
    /// `find_duplicates` calls should use `deduplicate_store` instead.
    pub fn find_duplicates(&self, behavior: &Behavior) -> Result<Vec<DuplicateMatch>, TenetsError> {
        let nodes = self.store.query_nodes(&NodeQuery::behaviors())?;
        let cache = EmbeddingCache::new();

        let mut matches: Vec<DuplicateMatch> = nodes
            .iter()
            .filter_map(Behavior::from_node)
            .filter(|other| other.id != behavior.id)
            .filter_map(|other| {
                let cfg = self.similarity_config(Some(&cache));
                let (score, method) = similarity::compute(behavior, &other, &cfg);
                let threshold = self.effective_threshold(method);
                (score >= threshold).then(|| DuplicateMatch {
                    behavior: other,
                    similarity: score,
                    method,
                    merge_recommended: score >= 0.95,
                })
            })
            .collect();

        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches)
    }

    /// Merges `primary` with each matched duplicate. No-ops (returns
    /// `primary` unchanged) when `matches` is empty. Deletes every source
    /// node — `primary` and each matched duplicate — from the store, since
    /// the merged behavior is written back under a freshly derived id, not
    /// `primary.id`; individual delete failures are tolerated and logged,
    /// not propagated. Does not write the merged behavior back — that is
    /// the caller's responsibility (`deduplicate_store` does it).
    pub fn merge_duplicates(&self, matches: &[DuplicateMatch], primary: &Behavior) -> Result<Behavior, TenetsError> {
        if matches.is_empty() {
            return Ok(primary.clone());
        }

        let mut all = vec![primary.clone()];
        all.extend(matches.iter().map(|m| m.behavior.clone()));
        let merged = merger::merge(
            &all,
            &MergerConfig {
                llm_client: self.llm_client,
                use_llm: self.config.use_llm,
            },
        )?;

        for source_id in std::iter::once(&primary.id).chain(matches.iter().map(|m| &m.behavior.id)) {
            if let Err(e) = self.store.delete_node(source_id) {
                tracing::warn!(behavior_id = %source_id, error = %e, "failed to delete merged source node");
            }
        }

        Ok(merged)
    }

    /// Scans every behavior node in the store, clusters near-duplicates,
    /// and (when `auto_merge` is on) merges and writes each cluster back.
    /// Re-checks `cancellation` between every pair and returns a partial,
    /// well-formed report on cancellation rather than panicking.
    pub fn deduplicate_store(&self, cancellation: &dyn Cancellation) -> DeduplicationReport {
        let mut report = DeduplicationReport::default();

        let nodes = match self.store.query_nodes(&NodeQuery::behaviors()) {
            Ok(nodes) => nodes,
            Err(e) => {
                report.errors.push(e.to_string());
                return report;
            }
        };
        let behaviors: Vec<Behavior> = nodes.iter().filter_map(Behavior::from_node).collect();
        report.total_behaviors = behaviors.len();

        let cache = self.llm_client.is_some().then(EmbeddingCache::new);
        let mut processed: HashSet<String> = HashSet::new();

        'outer: for i in 0..behaviors.len() {
            if cancellation.is_cancelled() {
                break;
            }
            if processed.contains(&behaviors[i].id) {
                continue;
            }

            let mut cluster = Vec::new();
            for j in (i + 1)..behaviors.len() {
                if cancellation.is_cancelled() {
                    break 'outer;
                }
                if processed.contains(&behaviors[j].id) {
                    continue;
                }
                let cfg = self.similarity_config(cache.as_ref());
                let (score, method) = similarity::compute(&behaviors[i], &behaviors[j], &cfg);
                let threshold = self.effective_threshold(method);
                if score >= threshold {
                    cluster.push(DuplicateMatch {
                        behavior: behaviors[j].clone(),
                        similarity: score,
                        method,
                        merge_recommended: score >= 0.95,
                    });
                    processed.insert(behaviors[j].id.clone());
                }
            }

            if cluster.is_empty() {
                continue;
            }
            report.duplicates_found += cluster.len();
            processed.insert(behaviors[i].id.clone());

            if self.config.auto_merge {
                let best_similarity = cluster.iter().map(|m| m.similarity).fold(0.0, f64::max);
                match self.merge_duplicates(&cluster, &behaviors[i]) {
                    Ok(merged) => match self.write_back(&merged) {
                        Ok(_) => {
                            report.merges_performed += 1;
                            if let Some(logger) = self.logger {
                                logger.log_merge_triggered(&MergeEvent {
                                    behavior_id: behaviors[i].id.clone(),
                                    merge_target: merged.id.clone(),
                                    similarity: best_similarity,
                                    threshold: self.config.similarity_threshold,
                                    reason: None,
                                });
                            }
                            report.merged_behavior_ids.push(merged.id);
                        }
                        Err(e) => report.errors.push(e.to_string()),
                    },
                    Err(e) => report.errors.push(e.to_string()),
                }
            } else if let Some(logger) = self.logger {
                let best = cluster.iter().max_by(|a, b| a.similarity.partial_cmp(&b.similarity).unwrap_or(std::cmp::Ordering::Equal));
                if let Some(best) = best {
                    logger.log_merge_skipped(&MergeEvent {
                        behavior_id: behaviors[i].id.clone(),
                        merge_target: best.behavior.id.clone(),
                        similarity: best.similarity,
                        threshold: self.config.similarity_threshold,
                        reason: Some("auto_merge disabled".to_string()),
                    });
                }
            }
        }

        report
    }

    fn write_back(&self, behavior: &Behavior) -> Result<NodeId, StoreError> {
        let node: Node = behavior.to_node();
        match self.scoped_store {
            Some(scoped) => scoped.add_node_to_scope(&node, classify_scope(behavior)),
            None => self.store.add_node(&node),
        }
    }

    fn similarity_config<'b>(&'b self, cache: Option<&'b EmbeddingCache>) -> SimilarityConfig<'b> {
        SimilarityConfig {
            use_llm: self.config.use_llm,
            llm_client: self.llm_client,
            embedding_client: self.embedding_client,
            similarity_threshold: self.config.similarity_threshold,
            embedding_threshold: self.config.embedding_threshold,
            logger: self.logger,
            embedding_cache: cache,
        }
    }

    fn effective_threshold(&self, method: SimilarityMethod) -> f64 {
        if method == SimilarityMethod::Embedding && self.config.embedding_threshold > 0.0 {
            self.config.embedding_threshold
        } else {
            self.config.similarity_threshold
        }
    }
}

/// A behavior is local-scoped iff its `when` map carries a `file_path` key;
/// otherwise it's global (spec.md §4.5).
pub fn classify_scope(behavior: &Behavior) -> Scope {
    if behavior.when.contains_key("file_path") {
        Scope::Local
    } else {
        Scope::Global
    }
}
