//! End-to-end cross-store scenarios against the SQLite backend (spec.md §8, S5-S6).

use tenets_core::behavior::Behavior;
use tenets_core::dedup::{CrossStoreDeduplicator, DeduplicatorConfig};
use tenets_core::store::{Edge, EdgeDirection, GraphStore, SqliteGraphStore};

fn engine<'a>(
    local: &'a SqliteGraphStore,
    global: &'a SqliteGraphStore,
    auto_merge: bool,
) -> CrossStoreDeduplicator<'a> {
    CrossStoreDeduplicator {
        local,
        global,
        config: DeduplicatorConfig {
            similarity_threshold: 0.9,
            embedding_threshold: 0.0,
            auto_merge,
            use_llm: false,
            max_batch_size: 100,
        },
        llm_client: None,
        embedding_client: None,
        logger: None,
    }
}

/// S5 Cross-store id win: both stores carry `b1`, the action is a skip, and
/// no write occurs to either store.
#[test]
fn s5_cross_store_id_collision_is_skipped() {
    let local = SqliteGraphStore::open_in_memory().unwrap();
    let global = SqliteGraphStore::open_in_memory().unwrap();

    local.add_node(&Behavior::new("b1", "local-name", "local wording of the same idea").to_node()).unwrap();
    global.add_node(&Behavior::new("b1", "global-name", "global wording, totally different text").to_node()).unwrap();

    let results = engine(&local, &global, true).deduplicate_across().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].action, tenets_core::behavior::DedupAction::Skip);
    assert!(results[0].merged.is_none());
    assert!(results[0].similarity.is_none());

    // No write: the local node is exactly as seeded, nothing new appeared.
    let local_nodes = local.query_nodes(&tenets_core::store::NodeQuery::behaviors()).unwrap();
    assert_eq!(local_nodes.len(), 1);
    assert_eq!(local_nodes[0].id, "b1");
}

/// S6 Cross-store semantic merge + redirect: local `Lx` and global `Gy` have
/// no id collision but match above threshold; auto_merge writes the merged
/// behavior and every edge that used to touch Lx or Gy now targets the
/// merged id, with no edge left referencing either old id anywhere.
#[test]
fn s6_cross_store_semantic_merge_redirects_edges() {
    let local = SqliteGraphStore::open_in_memory().unwrap();
    let global = SqliteGraphStore::open_in_memory().unwrap();

    local.add_node(&Behavior::new("Lx", "pathlib-local", "use pathlib for file paths").to_node()).unwrap();
    global.add_node(&Behavior::new("Gy", "pathlib-global", "use pathlib for file paths").to_node()).unwrap();

    local.add_edge(&Edge::new("caller", "Lx", "requires")).unwrap();
    global.add_edge(&Edge::new("Gy", "dependent", "enables")).unwrap();

    let results = engine(&local, &global, true).deduplicate_across().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].action, tenets_core::behavior::DedupAction::Merge);
    let merged = results[0].merged.as_ref().expect("S6 requires auto_merge to actually write a merge");
    assert!(results[0].similarity.unwrap() >= 0.9);

    let merged_id = merged.id.as_str();

    let local_edges = local.get_edges(merged_id, EdgeDirection::Both, None).unwrap();
    assert!(local_edges.iter().any(|e| e.source == "caller" && e.target == merged_id));
    assert!(local_edges.iter().all(|e| e.weight > 0.0));

    let global_edges = global.get_edges(merged_id, EdgeDirection::Both, None).unwrap();
    assert!(global_edges.iter().any(|e| e.source == merged_id && e.target == "dependent"));
    assert!(global_edges.iter().all(|e| e.weight > 0.0));

    for store in [&local, &global] {
        let edges_touching_lx = store.get_edges("Lx", EdgeDirection::Both, None).unwrap();
        let edges_touching_gy = store.get_edges("Gy", EdgeDirection::Both, None).unwrap();
        assert!(edges_touching_lx.iter().all(|e| e.source != "Lx" && e.target != "Lx"));
        assert!(edges_touching_gy.iter().all(|e| e.source != "Gy" && e.target != "Gy"));
    }
}
