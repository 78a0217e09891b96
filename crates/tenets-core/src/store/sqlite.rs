//! SQLite-backed `GraphStore`.
//!
//! Reference implementation: spec.md treats the Graph Store Port as an
//! external collaborator and specifies no backend, but a runnable repo
//! needs at least one. Grounded on the teacher's `storage::sqlite` module —
//! separate reader/writer connections guarded by their own mutexes so
//! `SqliteGraphStore` is `Send + Sync` without wrapping the whole struct in
//! a single lock, WAL journal mode, and `directories` for a default state
//! path.

use super::{Edge, EdgeDirection, GraphStore, Node, NodeId, NodeQuery, Scope, ScopedNodeAdder};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS nodes (
    id       TEXT PRIMARY KEY,
    kind     TEXT NOT NULL,
    content  TEXT NOT NULL,
    metadata TEXT NOT NULL,
    scope    TEXT
);

CREATE TABLE IF NOT EXISTS edges (
    rowid          INTEGER PRIMARY KEY AUTOINCREMENT,
    source         TEXT NOT NULL,
    target         TEXT NOT NULL,
    kind           TEXT NOT NULL,
    weight         REAL NOT NULL,
    created_at     TEXT NOT NULL,
    last_activated TEXT,
    metadata       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source);
CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target);
CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind);
";

pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(StoreError::from)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database, mainly for tests that want the SQLite
    /// code path exercised without a file on disk.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::from)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(StoreError::from)?;
        conn.execute_batch(SCHEMA).map_err(StoreError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Default on-disk path under the platform state directory, matching
    /// the teacher's `ProjectDirs`-based default location.
    pub fn default_path() -> Option<std::path::PathBuf> {
        directories::ProjectDirs::from("dev", "tenets", "tenets")
            .map(|dirs| dirs.data_dir().join("graph.sqlite3"))
    }

    fn json_to_map(text: &str) -> BTreeMap<String, serde_json::Value> {
        serde_json::from_str(text).unwrap_or_default()
    }
}

fn row_to_node(
    id: String,
    kind: String,
    content: String,
    metadata: String,
) -> Node {
    Node {
        id,
        kind,
        content: SqliteGraphStore::json_to_map(&content),
        metadata: SqliteGraphStore::json_to_map(&metadata),
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl GraphStore for SqliteGraphStore {
    fn add_node(&self, node: &Node) -> Result<NodeId, StoreError> {
        let conn = self.conn.lock().unwrap();
        let content = serde_json::to_string(&node.content).map_err(|e| StoreError::Database(e.to_string()))?;
        let metadata = serde_json::to_string(&node.metadata).map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO nodes (id, kind, content, metadata) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET kind = excluded.kind, content = excluded.content, metadata = excluded.metadata",
            params![node.id, node.kind, content, metadata],
        )?;
        Ok(node.id.clone())
    }

    fn delete_node(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn query_nodes(&self, query: &NodeQuery) -> Result<Vec<Node>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = match &query.kind {
            Some(kind) => {
                let mut stmt = conn.prepare("SELECT id, kind, content, metadata FROM nodes WHERE kind = ?1")?;
                let rows = stmt
                    .query_map(params![kind], |row| {
                        Ok(row_to_node(
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                return Ok(rows);
            }
            None => conn.prepare("SELECT id, kind, content, metadata FROM nodes")?,
        };
        let rows = stmt
            .query_map([], |row| {
                Ok(row_to_node(row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_edges(
        &self,
        node_id: &str,
        direction: EdgeDirection,
        kind_filter: Option<&str>,
    ) -> Result<Vec<Edge>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let base = "SELECT source, target, kind, weight, created_at, last_activated, metadata FROM edges WHERE ";
        let clause = match direction {
            EdgeDirection::Inbound => "target = ?1",
            EdgeDirection::Outbound => "source = ?1",
            EdgeDirection::Both => "(source = ?1 OR target = ?1)",
        };
        let sql = if let Some(_k) = kind_filter {
            format!("{base}{clause} AND kind = ?2")
        } else {
            format!("{base}{clause}")
        };
        let mut stmt = conn.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<Edge> {
            let created_at: String = row.get(4)?;
            let last_activated: Option<String> = row.get(5)?;
            let metadata: String = row.get(6)?;
            Ok(Edge {
                source: row.get(0)?,
                target: row.get(1)?,
                kind: row.get(2)?,
                weight: row.get(3)?,
                created_at: parse_timestamp(&created_at),
                last_activated: last_activated.map(|s| parse_timestamp(&s)),
                metadata: SqliteGraphStore::json_to_map(&metadata),
            })
        };
        let rows = if let Some(k) = kind_filter {
            stmt.query_map(params![node_id, k], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt.query_map(params![node_id], map_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
    }

    fn add_edge(&self, edge: &Edge) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let metadata = serde_json::to_string(&edge.metadata).map_err(|e| StoreError::Database(e.to_string()))?;
        conn.execute(
            "INSERT INTO edges (source, target, kind, weight, created_at, last_activated, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                edge.source,
                edge.target,
                edge.kind,
                edge.weight,
                edge.created_at.to_rfc3339(),
                edge.last_activated.map(|t| t.to_rfc3339()),
                metadata,
            ],
        )?;
        Ok(())
    }

    fn remove_edge(&self, source: &str, target: &str, kind: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM edges WHERE source = ?1 AND target = ?2 AND kind = ?3",
            params![source, target, kind],
        )?;
        Ok(())
    }

    fn sync(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
            .optional()?;
        Ok(())
    }
}

impl ScopedNodeAdder for SqliteGraphStore {
    fn add_node_to_scope(&self, node: &Node, scope: Scope) -> Result<NodeId, StoreError> {
        self.add_node(node)?;
        let conn = self.conn.lock().unwrap();
        let scope_str = match scope {
            Scope::Local => "local",
            Scope::Global => "global",
        };
        conn.execute(
            "UPDATE nodes SET scope = ?1 WHERE id = ?2",
            params![scope_str, node.id],
        )?;
        Ok(node.id.clone())
    }
}
