//! Behavior — the fundamental entity (spec.md §3).
//!
//! Modeled the way the teacher's `KnowledgeNode` models a memory: a plain
//! data struct with a `Default` impl, camelCase-on-the-wire fields, and a
//! conversion to/from the generic store `Node` representation. The
//! `when`-map's "mapping from context key to string/list/scalar" is modeled
//! as a tagged enum (`WhenValue`) rather than a dynamic map-of-any, per the
//! design note in spec.md §9.

use crate::store::Node;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// One of the four guidance kinds spec.md §3 enumerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorKind {
    #[default]
    Directive,
    Constraint,
    Procedure,
    Preference,
}

impl BehaviorKind {
    /// Ranking used by the rule-based merger to pick a survivor kind
    /// (spec.md §4.4: `procedure(4) > constraint(3) > directive(2) > preference(1)`).
    pub fn rank(self) -> u8 {
        match self {
            BehaviorKind::Procedure => 4,
            BehaviorKind::Constraint => 3,
            BehaviorKind::Directive => 2,
            BehaviorKind::Preference => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BehaviorKind::Directive => "directive",
            BehaviorKind::Constraint => "constraint",
            BehaviorKind::Procedure => "procedure",
            BehaviorKind::Preference => "preference",
        }
    }

    pub fn parse_name(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "constraint" => BehaviorKind::Constraint,
            "procedure" => BehaviorKind::Procedure,
            "preference" => BehaviorKind::Preference,
            _ => BehaviorKind::Directive,
        }
    }
}

/// A when-condition value: string, list-of-string, or an opaque scalar
/// (number/bool). Unknown context keys carry an arbitrary scalar through
/// untouched (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhenValue {
    String(String),
    List(Vec<String>),
    Scalar(Json),
}

impl WhenValue {
    /// Does `self` "match" `other` per spec.md §4.1 step 5: string
    /// equality, list/list overlap of at least one element, or
    /// list/string inclusion.
    pub fn overlaps(&self, other: &WhenValue) -> bool {
        match (self, other) {
            (WhenValue::String(a), WhenValue::String(b)) => a == b,
            (WhenValue::List(a), WhenValue::List(b)) => a.iter().any(|x| b.contains(x)),
            (WhenValue::List(a), WhenValue::String(b)) | (WhenValue::String(b), WhenValue::List(a)) => {
                a.contains(b)
            }
            (WhenValue::Scalar(a), WhenValue::Scalar(b)) => a == b,
            _ => false,
        }
    }
}

/// `when`: a mapping from context key to expected value.
pub type WhenMap = BTreeMap<String, WhenValue>;

/// Content payload of a Behavior (spec.md §3).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub canonical: String,
    pub expanded: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub structured: BTreeMap<String, Json>,
}

/// Where a Behavior came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Authored,
    Learned,
    Imported,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provenance {
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
    pub author: Option<String>,
    pub correction_id: Option<String>,
    pub package: Option<String>,
    pub package_version: Option<String>,
}

/// Usage counters (spec.md §3, "stats").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    pub times_activated: u64,
    pub times_followed: u64,
    pub times_confirmed: u64,
    pub times_overridden: u64,
    pub last_activated: Option<DateTime<Utc>>,
}

/// The fundamental entity curated by the dedup/merge core (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Behavior {
    pub id: String,
    pub name: String,
    pub kind: BehaviorKind,
    pub when: WhenMap,
    pub content: Content,
    pub provenance: Provenance,
    pub confidence: f64,
    pub priority: u32,
    pub requires: Vec<String>,
    pub overrides: Vec<String>,
    pub conflicts: Vec<String>,
    pub similar_to: Vec<(String, f64)>,
    pub stats: Stats,
}

impl Behavior {
    pub fn new(id: impl Into<String>, name: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: BehaviorKind::default(),
            when: WhenMap::new(),
            content: Content {
                canonical: canonical.into(),
                ..Default::default()
            },
            provenance: Provenance::default(),
            confidence: 1.0,
            priority: 0,
            requires: Vec::new(),
            overrides: Vec::new(),
            conflicts: Vec::new(),
            similar_to: Vec::new(),
            stats: Stats::default(),
        }
    }

    /// Serialize this Behavior into the generic store representation
    /// (spec.md §6: kind="behavior", content keys `name/kind/when/content`,
    /// metadata keys `confidence/priority/provenance`). Invariant 1: every
    /// field named here must round-trip through `from_node`.
    pub fn to_node(&self) -> Node {
        let mut node = Node::new(self.id.clone(), "behavior");
        node.content.insert("name".into(), Json::String(self.name.clone()));
        node.content
            .insert("kind".into(), Json::String(self.kind.as_str().to_string()));
        node.content
            .insert("when".into(), serde_json::to_value(&self.when).unwrap_or(Json::Null));
        node.content.insert(
            "content".into(),
            serde_json::to_value(&self.content).unwrap_or(Json::Null),
        );
        node.content.insert(
            "requires".into(),
            serde_json::to_value(&self.requires).unwrap_or(Json::Null),
        );
        node.content.insert(
            "overrides".into(),
            serde_json::to_value(&self.overrides).unwrap_or(Json::Null),
        );
        node.content.insert(
            "conflicts".into(),
            serde_json::to_value(&self.conflicts).unwrap_or(Json::Null),
        );
        node.content.insert(
            "similar_to".into(),
            serde_json::to_value(&self.similar_to).unwrap_or(Json::Null),
        );
        node.content.insert(
            "stats".into(),
            serde_json::to_value(&self.stats).unwrap_or(Json::Null),
        );
        node.metadata
            .insert("confidence".into(), Json::from(self.confidence));
        node.metadata
            .insert("priority".into(), Json::from(self.priority));
        node.metadata.insert(
            "provenance".into(),
            serde_json::to_value(&self.provenance).unwrap_or(Json::Null),
        );
        node
    }

    /// Deserialize a store `Node` back into a Behavior. Tolerates `content`
    /// stored either as a nested map or as an embedded content record, and
    /// timestamps as either a native time value or an RFC3339 string
    /// (spec.md §6).
    pub fn from_node(node: &Node) -> Option<Self> {
        let name = node
            .content
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let kind = node
            .content
            .get("kind")
            .and_then(|v| v.as_str())
            .map(BehaviorKind::parse_name)
            .unwrap_or_default();
        let when: WhenMap = node
            .content
            .get("when")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let content: Content = node
            .content
            .get("content")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let requires = node
            .content
            .get("requires")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let overrides = node
            .content
            .get("overrides")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let conflicts = node
            .content
            .get("conflicts")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let similar_to = node
            .content
            .get("similar_to")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let stats = node
            .content
            .get("stats")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let confidence = node
            .metadata
            .get("confidence")
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0);
        let priority = node
            .metadata
            .get("priority")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;
        let provenance = node
            .metadata
            .get("provenance")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        Some(Self {
            id: node.id.clone(),
            name,
            kind,
            when,
            content,
            provenance,
            confidence,
            priority,
            requires,
            overrides,
            conflicts,
            similar_to,
            stats,
        })
    }
}

/// Similarity computation method (spec.md §3, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMethod {
    Embedding,
    Llm,
    Jaccard,
}

impl SimilarityMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SimilarityMethod::Embedding => "embedding",
            SimilarityMethod::Llm => "llm",
            SimilarityMethod::Jaccard => "jaccard",
        }
    }
}

/// A (behavior, similarity, method, merge_recommended) tuple (spec.md §3).
#[derive(Debug, Clone)]
pub struct DuplicateMatch {
    pub behavior: Behavior,
    pub similarity: f64,
    pub method: SimilarityMethod,
    /// True when `similarity >= 0.95`.
    pub merge_recommended: bool,
}

/// Totals for one intra-store dedup run (spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeduplicationReport {
    pub total_behaviors: usize,
    pub duplicates_found: usize,
    pub merges_performed: usize,
    pub merged_behavior_ids: Vec<String>,
    pub errors: Vec<String>,
}

/// Outcome for one cross-store comparison (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupAction {
    None,
    Skip,
    Merge,
}

#[derive(Debug, Clone)]
pub struct DeduplicationResult {
    pub local: Behavior,
    pub action: DedupAction,
    pub global_match: Option<Behavior>,
    pub merged: Option<Behavior>,
    pub similarity: Option<f64>,
    pub error: Option<String>,
}
