//! # Tenets Core
//!
//! Deduplication and merge engine for a curated graph of learned agent
//! behaviors — directives, constraints, procedures, and preferences that
//! accumulate as an agent is corrected over time.
//!
//! The core owns three collaborations with the host application:
//!
//! - A [`store::GraphStore`] the host supplies (an in-memory store for
//!   tests, or the bundled [`store::SqliteGraphStore`] behind the `sqlite`
//!   feature).
//! - An optional [`llm::LlmClient`], with optional [`llm::EmbeddingCapable`]
//!   and [`llm::Closeable`] capabilities, for semantic comparison and
//!   merging beyond lexical Jaccard.
//! - An optional [`decision_log::DecisionLogger`] that records every
//!   similarity computation and auto-merge decision as an append-only
//!   JSONL audit trail.
//!
//! ## Quick start
//!
//! ```rust
//! use tenets_core::behavior::Behavior;
//! use tenets_core::dedup::{DeduplicatorConfig, IntraStoreDeduplicator};
//! use tenets_core::cancellation::NeverCancelled;
//! use tenets_core::store::{GraphStore, InMemoryGraphStore, NodeQuery};
//!
//! let store = InMemoryGraphStore::new();
//! store.add_node(&Behavior::new("b1", "pathlib", "use pathlib for file paths").to_node())?;
//! store.add_node(&Behavior::new("b2", "pathlib-2", "use pathlib for file paths").to_node())?;
//!
//! let dedup = IntraStoreDeduplicator {
//!     store: &store,
//!     scoped_store: Some(&store),
//!     config: DeduplicatorConfig {
//!         auto_merge: true,
//!         ..Default::default()
//!     },
//!     llm_client: None,
//!     embedding_client: None,
//!     logger: None,
//! };
//!
//! let report = dedup.deduplicate_store(&NeverCancelled);
//! assert_eq!(report.merges_performed, 1);
//! let remaining = store.query_nodes(&NodeQuery::behaviors())?;
//! assert_eq!(remaining.len(), 1);
//! # Ok::<(), tenets_core::error::TenetsError>(())
//! ```
//!
//! ## Feature flags
//!
//! - `sqlite` (default): bundled [`store::SqliteGraphStore`] reference
//!   implementation via `rusqlite`.

pub mod behavior;
pub mod cancellation;
pub mod decision_log;
pub mod dedup;
pub mod embedding_cache;
pub mod error;
pub mod llm;
pub mod merger;
pub mod sanitizer;
pub mod similarity;
pub mod store;

pub use behavior::{Behavior, BehaviorKind, DeduplicationReport, DuplicateMatch, SimilarityMethod};
pub use dedup::{CrossStoreDeduplicator, DeduplicatorConfig, IntraStoreDeduplicator};
pub use error::{Result, TenetsError};
pub use merger::{merge, MergerConfig};
pub use similarity::{compute, SimilarityConfig};
pub use store::{GraphStore, InMemoryGraphStore, Node, NodeId};

#[cfg(feature = "sqlite")]
pub use store::SqliteGraphStore;
