use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use textvar_engine::memory::{CollectionRecord, StoredVariable};
use textvar_engine::{
    DocumentSnapshot, EngineConfig, GhostReconciler, MemoryHost, MemoryPreferences, NodeKind,
    NodeRecord, NullProgress, TextVarEngine, VariableType,
};
use textvar_protocol::{GhostEvidence, Request, Response};

fn engine(host: &Arc<MemoryHost>) -> TextVarEngine {
    TextVarEngine::new(
        host.clone(),
        host.clone(),
        Arc::new(MemoryPreferences::new()),
        EngineConfig::headless(),
    )
    .expect("engine")
}

fn variable(id: &str, collection_id: &str) -> StoredVariable {
    StoredVariable {
        id: id.to_string(),
        name: id.replace(':', "_"),
        collection_id: collection_id.to_string(),
        resolved_type: VariableType::String,
        values: BTreeMap::new(),
    }
}

fn local_collection() -> CollectionRecord {
    CollectionRecord {
        id: "VariableCollectionId:1".to_string(),
        name: "Text Variables".to_string(),
        default_mode_id: "ModeId:1".to_string(),
    }
}

#[tokio::test]
async fn deleted_variable_is_found_and_cleared_once() {
    let host = Arc::new(MemoryHost::from_snapshot(DocumentSnapshot {
        nodes: vec![NodeRecord::text("1:1", "Title", "Pricing")],
        ..Default::default()
    }));
    let engine = engine(&host);
    let collection = engine.create_collection("").await.expect("collection");
    engine
        .process_batch(&collection.id, None, &NullProgress)
        .await
        .expect("process");
    let ghosts = engine.scan_ghosts().await.expect("scan");
    assert!(ghosts.is_empty());

    let variable_id = host.snapshot().variables[0].id.clone();
    host.delete_variable(&variable_id);

    let ghosts = engine.scan_ghosts().await.expect("scan");
    assert_eq!(ghosts.len(), 1);
    assert_eq!(ghosts[0].variable_id, variable_id);
    assert_eq!(ghosts[0].evidence, GhostEvidence::Missing);

    let ids = vec!["1:1".to_string()];
    let first = engine.clear_ghosts(&ids).await;
    assert_eq!(first.successfully_cleared, 1);
    assert_eq!(first.failed, 0);

    let second = engine.clear_ghosts(&ids).await;
    assert_eq!(second.successfully_cleared, 0);
    assert_eq!(second.failed, 1);
    assert_eq!(second.failures[0].reason, "no ghost bindings found");
}

#[tokio::test]
async fn library_variables_that_resolve_are_not_ghosts() {
    let host = Arc::new(MemoryHost::from_snapshot(DocumentSnapshot {
        nodes: vec![
            NodeRecord::text("1:1", "Shared", "Docs").bound("VariableID:lib"),
            NodeRecord::text("1:2", "Draft", "Old").bound("VariableID:gone").hidden(),
        ],
        collections: vec![local_collection()],
        variables: vec![variable("VariableID:lib", "LibraryCollection:7")],
    }));

    let ghosts = engine(&host).scan_ghosts().await.expect("scan");
    assert!(ghosts.is_empty(), "hidden nodes and library variables: {ghosts:?}");
}

#[tokio::test]
async fn failing_lookup_is_reported_as_resolution_error() {
    let host = Arc::new(MemoryHost::from_snapshot(DocumentSnapshot {
        nodes: vec![NodeRecord::text("1:1", "Title", "Hi").bound("VariableID:flaky")],
        collections: vec![local_collection()],
        variables: vec![variable("VariableID:flaky", "LibraryCollection:7")],
    }));
    host.fail_variable_reads_of("VariableID:flaky", usize::MAX);

    let response = engine(&host).handle(Request::ScanGhosts, &NullProgress).await;
    match response {
        Response::Ghosts { ghosts } => {
            assert_eq!(ghosts.len(), 1);
            assert!(matches!(
                ghosts[0].evidence,
                GhostEvidence::ResolutionError { .. }
            ));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn clear_handles_each_node_independently() {
    let mut removed = NodeRecord::text("1:3", "Gone", "x").bound("VariableID:gone");
    removed.removed = true;
    let host = Arc::new(MemoryHost::from_snapshot(DocumentSnapshot {
        nodes: vec![
            NodeRecord::text("1:1", "Ghost", "a").bound("VariableID:gone"),
            NodeRecord::container("1:2", "Frame", NodeKind::Frame),
            removed,
        ],
        collections: vec![local_collection()],
        ..Default::default()
    }));

    let ids: Vec<String> = ["1:2", "1:3", "1:1", "9:9"]
        .iter()
        .map(|id| id.to_string())
        .collect();
    let result = engine(&host).clear_ghosts(&ids).await;
    assert_eq!(result.requested, 4);
    assert_eq!(result.successfully_cleared, 1);
    let reasons: Vec<&str> = result.failures.iter().map(|f| f.reason.as_str()).collect();
    assert_eq!(
        reasons,
        vec!["not a text node", "node was deleted", "node not found"]
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn proptest_scan_never_reports_valid_ids(
        bindings in prop::collection::vec((0usize..6, any::<bool>()), 1..12),
    ) {
        // Variables 0..3 exist locally; 3..6 are dangling.
        let variables: Vec<StoredVariable> = (0..3)
            .map(|i| variable(&format!("VariableID:{i}"), "VariableCollectionId:1"))
            .collect();
        let nodes: Vec<NodeRecord> = bindings
            .iter()
            .enumerate()
            .map(|(n, (target, visible))| {
                let node = NodeRecord::text(format!("1:{n}"), "Text", "t")
                    .bound(format!("VariableID:{target}"));
                if *visible { node } else { node.hidden() }
            })
            .collect();
        let host = MemoryHost::from_snapshot(DocumentSnapshot {
            nodes,
            collections: vec![local_collection()],
            variables,
        });

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        let (valid, ghosts) = runtime.block_on(async {
            let reconciler = GhostReconciler::new(&host, &host, 1);
            let valid = reconciler.valid_variable_ids().await.expect("valid ids");
            let ghosts = reconciler.scan().await.expect("scan");
            (valid, ghosts)
        });

        let expected: HashSet<String> = bindings
            .iter()
            .enumerate()
            .filter(|(_, (target, visible))| *visible && *target >= 3)
            .map(|(n, _)| format!("1:{n}"))
            .collect();
        let reported: HashSet<String> = ghosts.iter().map(|g| g.node_id.clone()).collect();
        prop_assert_eq!(reported, expected);
        for ghost in &ghosts {
            prop_assert!(!valid.contains(&ghost.variable_id));
        }
    }
}
