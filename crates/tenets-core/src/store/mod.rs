//! Graph Store Port
//!
//! Implements spec.md §4.7 / §6: the minimal interface the dedup/merge core
//! requires of any backing store. Collaborators may implement just
//! `GraphStore`, or additionally `ScopedNodeAdder` when the store partitions
//! nodes by scope (local vs global, spec.md's Scope concept).

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::InMemoryGraphStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteGraphStore;

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use std::collections::BTreeMap;

pub type NodeId = String;

/// A generic graph node. Behaviors serialize into one of these with
/// `kind == "behavior"` (spec.md §3, "Store nodes and edges").
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub kind: String,
    pub content: BTreeMap<String, Json>,
    pub metadata: BTreeMap<String, Json>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            content: BTreeMap::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Direction filter for `GraphStore::get_edges`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Inbound,
    Outbound,
    Both,
}

/// A graph edge. Invariant 3 (spec.md §3): every edge added during
/// redirection has `weight > 0` and a `created_at`; legacy edges missing
/// these are defaulted to 1.0 / now by whoever constructs them (the
/// Cross-Store Deduplicator does this explicitly, see `dedup::cross`).
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: String,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub last_activated: Option<DateTime<Utc>>,
    pub metadata: BTreeMap<String, Json>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: kind.into(),
            weight: 1.0,
            created_at: Utc::now(),
            last_activated: None,
            metadata: BTreeMap::new(),
        }
    }
}

/// A predicate over nodes. The core only ever issues `{ kind: "behavior" }`
/// (spec.md §4.7), but the type is kept open for collaborators that want to
/// reuse the same store for other node kinds.
#[derive(Debug, Clone, Default)]
pub struct NodeQuery {
    pub kind: Option<String>,
}

impl NodeQuery {
    pub fn behaviors() -> Self {
        Self {
            kind: Some("behavior".to_string()),
        }
    }
}

/// The interface the dedup/merge core requires of any backing store.
pub trait GraphStore: Send + Sync {
    fn add_node(&self, node: &Node) -> Result<NodeId, StoreError>;
    fn delete_node(&self, id: &str) -> Result<(), StoreError>;
    fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>, StoreError>;
    fn get_edges(
        &self,
        node_id: &str,
        direction: EdgeDirection,
        kind_filter: Option<&str>,
    ) -> Result<Vec<Edge>, StoreError>;
    fn add_edge(&self, edge: &Edge) -> Result<(), StoreError>;
    fn remove_edge(&self, source: &str, target: &str, kind: &str) -> Result<(), StoreError>;
    /// Durability flush. Stores without a write-behind buffer may no-op.
    fn sync(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Optional capability: stores that partition nodes by scope (local
/// project-specific vs. global user-wide, spec.md's Scope concept) can
/// implement this so the Intra-Store Deduplicator routes writes through
/// the right partition instead of the plain `add_node`.
pub trait ScopedNodeAdder: GraphStore {
    fn add_node_to_scope(&self, node: &Node, scope: Scope) -> Result<NodeId, StoreError>;
}

/// Local (project-specific) vs global (user-wide) classification of where
/// a behavior is stored (spec.md GLOSSARY, "Scope").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Local,
    Global,
}
