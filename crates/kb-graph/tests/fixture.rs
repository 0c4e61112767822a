//! Projection of the two-collection fixture under every collapse combination.

use kb_graph::{diagnose, edit, project, Diagnostic, InMemoryKnowledgeBase, KnowledgeStore, Snapshot, ViewModel};
use serde_json::json;
use std::sync::Arc;

const FIXTURE: &str = include_str!("fixtures/knowledge_base.json");
const T: i64 = 1503389225848;

fn fixture() -> Snapshot {
    serde_json::from_str(FIXTURE).unwrap()
}

fn with_expanded(ids: &[&str]) -> Snapshot {
    let mut snap = fixture();
    for id in ids {
        edit::set_collapsed(&mut snap, id, false).unwrap();
    }
    snap
}

fn viewed() -> Vec<String> {
    vec!["TEST__RootParent".to_string(), "TEST__Root".to_string()]
}

fn edges(view: &ViewModel) -> Vec<(&str, &str, &str)> {
    view.edges
        .iter()
        .map(|e| (e.id.as_str(), e.start.as_str(), e.end.as_str()))
        .collect()
}

fn crumbs(view: &ViewModel) -> Vec<&str> {
    view.collection_chain.iter().map(|n| n.id.as_str()).collect()
}

#[test]
fn fixture_diagnostics_name_the_misspelled_parent_and_stale_index_key() {
    assert_eq!(
        diagnose(&fixture()),
        vec![
            Diagnostic::MissingReference {
                owner: "TEST__B_x".to_string(),
                missing: "TEST_B".to_string(),
            },
            Diagnostic::MissingReference {
                owner: "nodesByCollectionId".to_string(),
                missing: "TEST__RootCollection".to_string(),
            },
        ]
    );
}

#[test]
fn both_collapsed_matches_full_view() {
    let view = project(&fixture(), "TEST__Root", &viewed());
    let actual = serde_json::to_value(&view).unwrap();
    let expected = json!({
        "nodes": [{
            "created": T, "name": "Root_x", "modified": T,
            "id": "TEST__Root_x", "type": "node",
            "collectionChains": [["TEST__RootParent", "TEST__Root"]]
        }],
        "collections": [
            {
                "created": T, "name": "B", "modified": T,
                "id": "TEST__B", "type": "collection",
                "collectionChains": [["TEST__RootParent", "TEST__Root"]],
                "collapsed": true
            },
            {
                "created": T, "name": "A", "modified": T,
                "id": "TEST__A", "type": "collection",
                "collectionChains": [
                    ["TEST__RootParent", "TEST__Root"],
                    ["TEST__RootParent", "TEST__Root", "TEST__B"]
                ],
                "collapsed": true
            }
        ],
        "visibleCollections": [
            {
                "created": T, "name": "B", "modified": T,
                "id": "TEST__B", "type": "collection",
                "collectionChains": [["TEST__RootParent", "TEST__Root"]],
                "collapsed": true,
                "count": 1
            },
            {
                "created": T, "name": "A", "modified": T,
                "id": "TEST__A", "type": "collection",
                "collectionChains": [
                    ["TEST__RootParent", "TEST__Root"],
                    ["TEST__RootParent", "TEST__Root", "TEST__B"]
                ],
                "collapsed": true,
                "count": 2
            }
        ],
        "edges": [
            { "end": "TEST__B", "start": "TEST__A", "id": "TEST__A_y-B" },
            { "end": "TEST__B", "start": "TEST__A", "id": "TEST__A_x-B_x" }
        ],
        "collectionChain": [
            {
                "isRootCollection": true,
                "created": T, "name": "My Knowledge Base", "modified": T,
                "id": "TEST__RootParent", "type": "root",
                "collectionChains": []
            },
            {
                "created": T, "name": "My Knowledge Base", "modified": T,
                "id": "TEST__Root", "type": "collection",
                "collectionChains": [["TEST__RootParent"]]
            }
        ]
    });
    assert_eq!(actual, expected);
}

#[test]
fn expanding_a_inlines_its_leaves() {
    let view = project(&with_expanded(&["TEST__A"]), "TEST__Root", &viewed());
    assert_eq!(view.node_ids(), vec!["TEST__Root_x", "TEST__A_x", "TEST__A_y"]);
    assert_eq!(view.collection_ids(), vec!["TEST__B", "TEST__A"]);
    assert_eq!(view.collections[1].collapsed, Some(false));
    assert_eq!(view.visible_collection_ids(), vec!["TEST__B"]);
    assert_eq!(view.visible_collections[0].count, 1);
    assert_eq!(
        edges(&view),
        vec![
            ("TEST__A_y-B", "TEST__A_y", "TEST__B"),
            ("TEST__A_x-B_x", "TEST__A_x", "TEST__B"),
        ]
    );
    assert_eq!(crumbs(&view), vec!["TEST__RootParent", "TEST__Root"]);
}

#[test]
fn expanding_b_drops_edges_into_b_itself() {
    let view = project(&with_expanded(&["TEST__B"]), "TEST__Root", &viewed());
    assert_eq!(view.node_ids(), vec!["TEST__Root_x", "TEST__B_x"]);
    assert_eq!(view.collection_ids(), vec!["TEST__B", "TEST__A"]);
    assert_eq!(view.visible_collection_ids(), vec!["TEST__A"]);
    assert_eq!(view.visible_collections[0].count, 2);
    assert_eq!(
        edges(&view),
        vec![("TEST__A_x-B_x", "TEST__A", "TEST__B_x")]
    );
    assert_eq!(crumbs(&view), vec!["TEST__RootParent", "TEST__Root"]);
}

#[test]
fn expanding_both_shows_every_leaf_once() {
    let view = project(
        &with_expanded(&["TEST__A", "TEST__B"]),
        "TEST__Root",
        &viewed(),
    );
    assert_eq!(
        view.node_ids(),
        vec!["TEST__Root_x", "TEST__A_x", "TEST__A_y", "TEST__B_x"]
    );
    assert_eq!(view.collection_ids(), vec!["TEST__B", "TEST__A"]);
    assert!(view.visible_collections.is_empty());
    assert_eq!(
        edges(&view),
        vec![("TEST__A_x-B_x", "TEST__A_x", "TEST__B_x")]
    );
}

#[test]
fn viewing_b_directly_uses_the_nested_route() {
    let chain = vec![
        "TEST__RootParent".to_string(),
        "TEST__Root".to_string(),
        "TEST__B".to_string(),
    ];
    let view = project(&fixture(), "TEST__B", &chain);
    assert_eq!(view.node_ids(), vec!["TEST__B_x"]);
    assert_eq!(view.visible_collection_ids(), vec!["TEST__A"]);
    // A_x is reached through B/A here, A_y-B ends at the focus itself
    assert_eq!(
        edges(&view),
        vec![("TEST__A_x-B_x", "TEST__A", "TEST__B_x")]
    );
    assert_eq!(crumbs(&view).len(), chain.len());
}

fn with_corrected_parent(mut snap: Snapshot) -> Snapshot {
    if let Some(b_x) = snap.entities.nodes.get_mut("TEST__B_x") {
        b_x.collection_chains = vec![vec![
            "TEST__RootParent".to_string(),
            "TEST__Root".to_string(),
            "TEST__B".to_string(),
        ]];
    }
    snap
}

#[test]
fn misspelled_parent_is_placed_like_the_corrected_chain() {
    let cases: [&[&str]; 4] = [&[], &["TEST__A"], &["TEST__B"], &["TEST__A", "TEST__B"]];
    for expanded in cases {
        let misspelled = project(&with_expanded(expanded), "TEST__Root", &viewed());
        let corrected = project(
            &with_corrected_parent(with_expanded(expanded)),
            "TEST__Root",
            &viewed(),
        );
        assert_eq!(misspelled.node_ids(), corrected.node_ids(), "{:?}", expanded);
        assert_eq!(misspelled.collections, corrected.collections);
        assert_eq!(misspelled.visible_collections, corrected.visible_collections);
        assert_eq!(misspelled.edges, corrected.edges, "{:?}", expanded);
    }
}

#[test]
fn misspelled_parent_missing_from_index_is_left_out() {
    let mut snap = fixture();
    snap.nodes_by_collection_id.remove("TEST__B");
    let view = project(&snap, "TEST__Root", &viewed());
    assert_eq!(edges(&view), vec![("TEST__A_y-B", "TEST__A", "TEST__B")]);
    // count comes from the index entry, which is gone
    assert_eq!(view.visible_collections[0].count, 0);

    let mut expanded = snap;
    edit::set_collapsed(&mut expanded, "TEST__B", false).unwrap();
    let view = project(&expanded, "TEST__Root", &viewed());
    assert_eq!(view.node_ids(), vec!["TEST__Root_x"]);
}

#[test]
fn unknown_focus_yields_only_breadcrumbs() {
    let view = project(&fixture(), "TEST__Nope", &viewed());
    assert!(view.nodes.is_empty() && view.collections.is_empty() && view.edges.is_empty());
    assert_eq!(crumbs(&view), vec!["TEST__RootParent", "TEST__Root"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_projections_agree() {
    let kb = Arc::new(InMemoryKnowledgeBase::from_snapshot(fixture()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let kb = Arc::clone(&kb);
        handles.push(tokio::spawn(async move {
            kb.project("TEST__Root", &viewed()).await
        }));
    }
    let mut views = Vec::new();
    for h in handles {
        views.push(h.await.unwrap());
    }
    let direct = project(&fixture(), "TEST__Root", &viewed());
    for view in views {
        assert_eq!(*view, direct);
    }

    assert_eq!(kb.toggle_collapsed("TEST__A").await, Ok(false));
    let after = kb.project("TEST__Root", &viewed()).await;
    assert_eq!(*after, project(&with_expanded(&["TEST__A"]), "TEST__Root", &viewed()));
}
