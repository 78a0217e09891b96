//! In-memory `GraphStore` for unit tests and doctests.
//!
//! Grounded on the `Arc<RwLock<V>>` guarded-map pattern used throughout the
//! cortex `linker` module's scanner/store collaborators.

use super::{Edge, EdgeDirection, GraphStore, Node, NodeId, NodeQuery, Scope, ScopedNodeAdder};
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    nodes: HashMap<NodeId, Node>,
    /// Scope is tracked separately from the node content so tests can
    /// assert on it without the node payload needing to carry it.
    scopes: HashMap<NodeId, Scope>,
    edges: Vec<Edge>,
}

/// Thread-safe in-memory store. No persistence; lives for the process.
pub struct InMemoryGraphStore {
    inner: RwLock<Inner>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for InMemoryGraphStore {
    fn add_node(&self, node: &Node) -> Result<NodeId, StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.nodes.insert(node.id.clone(), node.clone());
        Ok(node.id.clone())
    }

    fn delete_node(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.nodes.remove(id);
        inner.scopes.remove(id);
        Ok(())
    }

    fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .nodes
            .values()
            .filter(|n| query.kind.as_deref().is_none_or(|k| k == n.kind))
            .cloned()
            .collect())
    }

    fn get_edges(
        &self,
        node_id: &str,
        direction: EdgeDirection,
        kind_filter: Option<&str>,
    ) -> Result<Vec<Edge>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .edges
            .iter()
            .filter(|e| match direction {
                EdgeDirection::Inbound => e.target == node_id,
                EdgeDirection::Outbound => e.source == node_id,
                EdgeDirection::Both => e.source == node_id || e.target == node_id,
            })
            .filter(|e| kind_filter.is_none_or(|k| k == e.kind))
            .cloned()
            .collect())
    }

    fn add_edge(&self, edge: &Edge) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner.edges.push(edge.clone());
        Ok(())
    }

    fn remove_edge(&self, source: &str, target: &str, kind: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        inner
            .edges
            .retain(|e| !(e.source == source && e.target == target && e.kind == kind));
        Ok(())
    }
}

impl ScopedNodeAdder for InMemoryGraphStore {
    fn add_node_to_scope(&self, node: &Node, scope: Scope) -> Result<NodeId, StoreError> {
        let id = self.add_node(node)?;
        self.inner.write().unwrap().scopes.insert(id.clone(), scope);
        Ok(id)
    }
}
