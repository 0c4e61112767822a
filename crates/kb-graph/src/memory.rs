//! In-memory knowledge base: versioned copy-on-write snapshot plus a
//! projection cache keyed by version.

use crate::{diagnose, edit, project};
use kb_types::{
    CollectionChain, Diagnostic, Edge, KnowledgeStore, Node, NodeKind, Snapshot, StoreError,
    ViewModel,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

struct State {
    snapshot: Arc<Snapshot>,
    version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ViewKey {
    version: u64,
    focus: String,
    ancestor_chain: Vec<String>,
}

/// In-memory implementation of KnowledgeStore.
/// Mutations never touch a published snapshot; they publish a new one.
pub struct InMemoryKnowledgeBase {
    state: Arc<RwLock<State>>,
    /// (version, focus, ancestor_chain) -> projected view.
    views: Arc<RwLock<HashMap<ViewKey, Arc<ViewModel>>>>,
}

impl InMemoryKnowledgeBase {
    pub fn new() -> Self {
        Self::from_snapshot(Snapshot::default())
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                snapshot: Arc::new(snapshot),
                version: 0,
            })),
            views: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of memoized views (current version only after a mutation).
    pub async fn cached_views(&self) -> usize {
        self.views.read().await.len()
    }

    async fn apply<T, F>(&self, op: &'static str, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Snapshot) -> Result<T, StoreError> + Send,
        T: Send,
    {
        let (version, out) = {
            let mut state = self.state.write().await;
            let mut next = Snapshot::clone(&state.snapshot);
            let out = f(&mut next)
                .inspect_err(|e| tracing::debug!(op, error = %e, "edit rejected"))?;
            state.snapshot = Arc::new(next);
            state.version += 1;
            tracing::debug!(op, version = state.version, "snapshot published");
            (state.version, out)
        };
        self.views.write().await.retain(|k, _| k.version == version);
        Ok(out)
    }
}

impl Default for InMemoryKnowledgeBase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KnowledgeStore for InMemoryKnowledgeBase {
    async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.state.read().await.snapshot)
    }

    async fn version(&self) -> u64 {
        self.state.read().await.version
    }

    async fn create_node(
        &self,
        kind: NodeKind,
        name: &str,
        chains: Vec<CollectionChain>,
    ) -> Result<Node, StoreError> {
        let node = edit::new_node(kind, name, chains);
        let created = node.clone();
        self.apply("create_node", move |s| edit::insert_node(s, node))
            .await?;
        Ok(created)
    }

    async fn remove_node(&self, id: &str) -> Result<Node, StoreError> {
        self.apply("remove_node", |s| edit::remove_node(s, id)).await
    }

    async fn connect(&self, start: &str, end: &str) -> Result<Edge, StoreError> {
        let id = edit::new_edge_id();
        self.apply("connect", |s| edit::connect(s, &id, start, end))
            .await
    }

    async fn remove_edge(&self, id: &str) -> Result<Edge, StoreError> {
        self.apply("remove_edge", |s| edit::remove_edge(s, id)).await
    }

    async fn set_collapsed(&self, id: &str, collapsed: bool) -> Result<(), StoreError> {
        self.apply("set_collapsed", |s| edit::set_collapsed(s, id, collapsed))
            .await
    }

    async fn toggle_collapsed(&self, id: &str) -> Result<bool, StoreError> {
        self.apply("toggle_collapsed", |s| edit::toggle_collapsed(s, id))
            .await
    }

    async fn rename(&self, id: &str, name: &str) -> Result<(), StoreError> {
        self.apply("rename", |s| edit::rename(s, id, name)).await
    }

    async fn attach(&self, id: &str, chain: CollectionChain) -> Result<(), StoreError> {
        self.apply("attach", move |s| edit::attach(s, id, chain))
            .await
    }

    async fn detach(&self, id: &str, chain: &[String]) -> Result<(), StoreError> {
        self.apply("detach", |s| edit::detach(s, id, chain)).await
    }

    async fn project(&self, focus: &str, ancestor_chain: &[String]) -> Arc<ViewModel> {
        let (snapshot, version) = {
            let state = self.state.read().await;
            (Arc::clone(&state.snapshot), state.version)
        };
        let key = ViewKey {
            version,
            focus: focus.to_string(),
            ancestor_chain: ancestor_chain.to_vec(),
        };
        if let Some(view) = self.views.read().await.get(&key) {
            return Arc::clone(view);
        }

        let view = Arc::new(project(&snapshot, focus, ancestor_chain));
        let mut views = self.views.write().await;
        // a mutation published since the read would never evict this entry
        if self.state.read().await.version == version {
            views.insert(key, Arc::clone(&view));
        }
        view
    }

    async fn diagnostics(&self) -> Vec<Diagnostic> {
        let snapshot = self.snapshot().await;
        diagnose(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SnapshotBuilder;

    fn chain(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn seeded() -> InMemoryKnowledgeBase {
        InMemoryKnowledgeBase::from_snapshot(
            SnapshotBuilder::new()
                .root("kb", "KB")
                .collection("c", "C", &[&["kb"]], Some(true))
                .node("n", "N", &[&["kb", "c"]])
                .build(),
        )
    }

    #[tokio::test]
    async fn mutations_publish_new_snapshots() {
        let kb = seeded();
        let before = kb.snapshot().await;
        assert_eq!(kb.version().await, 0);

        assert_eq!(kb.toggle_collapsed("c").await, Ok(false));
        assert_eq!(kb.version().await, 1);
        assert_eq!(before.node("c").and_then(|n| n.collapsed), Some(true));
        assert_eq!(
            kb.snapshot().await.node("c").and_then(|n| n.collapsed),
            Some(false)
        );

        // rejected edits leave the version alone
        assert!(kb.toggle_collapsed("n").await.is_err());
        assert_eq!(kb.version().await, 1);
    }

    #[tokio::test]
    async fn created_entities_get_ids_and_edges_connect() {
        let kb = seeded();
        let leaf = kb
            .create_node(NodeKind::Node, "Leaf", vec![chain(&["kb", "c"])])
            .await
            .unwrap();
        assert!(!leaf.id.is_empty());
        assert_eq!(leaf.created, leaf.modified);

        let edge = kb.connect(&leaf.id, "n").await.unwrap();
        let snap = kb.snapshot().await;
        assert_eq!(snap.edge_list_map[&leaf.id].from, vec![edge.id.clone()]);
        assert_eq!(snap.nodes_by_collection_id["c"], vec!["n".to_string(), leaf.id.clone()]);
        assert!(kb.diagnostics().await.is_empty());

        kb.remove_node(&leaf.id).await.unwrap();
        assert!(kb.snapshot().await.entities.edges.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cache_holds_only_current_version_after_racing_edits() {
        let kb = Arc::new(seeded());
        let root = chain(&["kb"]);
        let mut handles = Vec::new();
        for i in 0..32 {
            let kb = Arc::clone(&kb);
            let root = root.clone();
            handles.push(tokio::spawn(async move {
                if i % 4 == 0 {
                    kb.toggle_collapsed("c").await.unwrap();
                } else {
                    kb.project("kb", &root).await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let version = kb.version().await;
        assert_eq!(version, 8);
        assert!(kb.views.read().await.keys().all(|k| k.version == version));
    }

    #[tokio::test]
    async fn projection_is_cached_per_version() {
        let kb = seeded();
        let root = chain(&["kb"]);
        let first = kb.project("kb", &root).await;
        let again = kb.project("kb", &root).await;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.visible_collections[0].count, 1);

        kb.set_collapsed("c", false).await.unwrap();
        assert_eq!(kb.cached_views().await, 0);
        let expanded = kb.project("kb", &root).await;
        assert_eq!(expanded.node_ids(), vec!["n"]);
        assert!(expanded.visible_collections.is_empty());
    }
}
