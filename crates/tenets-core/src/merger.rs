//! Behavior Merger (spec.md §4.4).
//!
//! LLM-merge-first, rule-based-fallback. The rule-based path is grounded on
//! the teacher pack's node-merge helpers (tag/metadata union, max-importance
//! survivor, first-seen-order set union) adapted to behaviors' richer
//! `when`/`kind`/`provenance` shape.

use crate::behavior::{Behavior, BehaviorKind, Provenance, SourceType, WhenMap, WhenValue};
use crate::error::TenetsError;
use crate::llm::LlmClient;
use crate::sanitizer::{sanitize_content, sanitize_name, sanitize_when_entry};
use chrono::Utc;

/// Per-merge configuration (spec.md §6 `MergerConfig`).
pub struct MergerConfig<'a> {
    pub llm_client: Option<&'a dyn LlmClient>,
    pub use_llm: bool,
}

impl<'a> MergerConfig<'a> {
    pub fn rule_based_only() -> Self {
        Self {
            llm_client: None,
            use_llm: false,
        }
    }
}

/// Merges an ordered, non-empty list of behaviors into one. Empty input is
/// an `InputError`; a single element is returned unchanged (identity).
pub fn merge(behaviors: &[Behavior], config: &MergerConfig<'_>) -> Result<Behavior, TenetsError> {
    let Some(first) = behaviors.first() else {
        return Err(TenetsError::Input("no behaviors to merge".into()));
    };
    if behaviors.len() == 1 {
        return Ok(first.clone());
    }

    let merged = if config.use_llm {
        try_llm_merge(behaviors, config).unwrap_or_else(|| rule_based_merge(behaviors))
    } else {
        rule_based_merge(behaviors)
    };

    Ok(sanitize_merged(merged))
}

fn try_llm_merge(behaviors: &[Behavior], config: &MergerConfig<'_>) -> Option<Behavior> {
    let client = config.llm_client?;
    if !client.available() {
        return None;
    }
    let result = client.merge_behaviors(behaviors).ok()?;
    let mut merged = result.merged?;

    merged.content.canonical = sanitize_content(&merged.content.canonical);
    merged.content.expanded = sanitize_content(&merged.content.expanded);
    merged.content.summary = sanitize_content(&merged.content.summary);
    merged.name = sanitize_name(&merged.name);
    merged.content.tags = merged.content.tags.iter().map(|t| sanitize_name(t)).collect();

    merged.id = new_merged_id(behaviors.first());
    merged.provenance = merge_provenance();
    merged.similar_to = similar_to_backlinks(behaviors);

    Some(merged)
}

fn rule_based_merge(behaviors: &[Behavior]) -> Behavior {
    let first = &behaviors[0];

    let id = new_merged_id(Some(first));
    let name = merged_name(behaviors);
    let kind = merged_kind(behaviors);
    let when = merged_when(behaviors);
    let canonical = join_unique_trimmed(behaviors.iter().map(|b| b.content.canonical.as_str()), "; ");
    let expanded = join_unique_trimmed(behaviors.iter().map(|b| b.content.expanded.as_str()), "\n\n");
    let summary = behaviors
        .iter()
        .map(|b| b.content.summary.as_str())
        .find(|s| !s.trim().is_empty())
        .unwrap_or_default()
        .to_string();
    let tags = merged_tags(behaviors);

    let confidence = behaviors.iter().map(|b| b.confidence).sum::<f64>() / behaviors.len() as f64;
    let priority = behaviors.iter().map(|b| b.priority).max().unwrap_or_default();

    let mut merged = Behavior::new(id.clone(), name, canonical);
    merged.kind = kind;
    merged.when = when;
    merged.content.expanded = expanded;
    merged.content.summary = summary;
    merged.content.tags = tags;
    merged.confidence = confidence;
    merged.priority = priority;
    merged.provenance = merge_provenance();
    merged.similar_to = similar_to_backlinks(behaviors);
    merged
}

fn new_merged_id(first: Option<&Behavior>) -> String {
    match first {
        Some(b) if !b.id.is_empty() => format!("{}-merged", b.id),
        _ => format!("merged-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default()),
    }
}

fn merged_name(behaviors: &[Behavior]) -> String {
    behaviors
        .iter()
        .map(|b| b.name.as_str())
        .find(|n| !n.trim().is_empty())
        .map(|n| format!("{n} (merged)"))
        .unwrap_or_else(|| "Merged Behavior".to_string())
}

fn merged_kind(behaviors: &[Behavior]) -> BehaviorKind {
    behaviors
        .iter()
        .max_by_key(|b| b.kind.rank())
        .map(|b| b.kind)
        .unwrap_or_default()
}

fn merged_when(behaviors: &[Behavior]) -> WhenMap {
    let mut result = WhenMap::new();
    for b in behaviors {
        for (key, value) in &b.when {
            match result.get(key) {
                None => {
                    result.insert(key.clone(), value.clone());
                }
                Some(existing) => {
                    let combined = union_when_value(existing, value);
                    result.insert(key.clone(), combined);
                }
            }
        }
    }

    result
        .into_iter()
        .filter_map(|(k, v)| sanitize_when_entry(&k, &v))
        .collect()
}

/// Collision rule for two `when` values sharing a key (spec.md §4.4):
/// equal collapses; unequal strings promote to a two-element list; list/list
/// is a set-union preserving first-seen order; list/string appends the
/// string if absent.
fn union_when_value(a: &WhenValue, b: &WhenValue) -> WhenValue {
    if a == b {
        return a.clone();
    }
    match (a, b) {
        (WhenValue::String(sa), WhenValue::String(sb)) => WhenValue::List(vec![sa.clone(), sb.clone()]),
        (WhenValue::List(la), WhenValue::List(lb)) => {
            let mut merged = la.clone();
            for item in lb {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            WhenValue::List(merged)
        }
        (WhenValue::List(la), WhenValue::String(sb)) => {
            let mut merged = la.clone();
            if !merged.contains(sb) {
                merged.push(sb.clone());
            }
            WhenValue::List(merged)
        }
        (WhenValue::String(sa), WhenValue::List(lb)) => {
            let mut merged = vec![sa.clone()];
            for item in lb {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            WhenValue::List(merged)
        }
        _ => b.clone(),
    }
}

fn join_unique_trimmed<'a>(parts: impl Iterator<Item = &'a str>, sep: &str) -> String {
    let mut seen = Vec::new();
    for part in parts {
        let trimmed = part.trim();
        if !trimmed.is_empty() && !seen.contains(&trimmed) {
            seen.push(trimmed);
        }
    }
    seen.join(sep)
}

fn merged_tags(behaviors: &[Behavior]) -> Vec<String> {
    let mut tags = Vec::new();
    for b in behaviors {
        for tag in &b.content.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
    }
    tags
}

fn merge_provenance() -> Provenance {
    Provenance {
        source_type: SourceType::Learned,
        created_at: Utc::now(),
        author: Some("merge".to_string()),
        correction_id: None,
        package: None,
        package_version: None,
    }
}

/// One entry per source id, excluding the primary's own id (the first
/// element of `behaviors`) — it is the survivor's own lineage, not a
/// separate duplicate it links to.
fn similar_to_backlinks(behaviors: &[Behavior]) -> Vec<(String, f64)> {
    let primary_id = behaviors.first().map(|b| b.id.as_str()).unwrap_or_default();
    behaviors
        .iter()
        .map(|b| b.id.clone())
        .filter(|id| id != primary_id)
        .map(|id| (id, 1.0))
        .collect()
}

fn sanitize_merged(mut b: Behavior) -> Behavior {
    b.name = sanitize_name(&b.name);
    b.content.canonical = sanitize_content(&b.content.canonical);
    b.content.expanded = sanitize_content(&b.content.expanded);
    b.content.summary = sanitize_content(&b.content.summary);
    b.content.tags = b.content.tags.iter().map(|t| sanitize_name(t)).collect();
    b
}
