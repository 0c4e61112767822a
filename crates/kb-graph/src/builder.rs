//! Fluent snapshot construction for fixtures and seeding.

use crate::edit;
use kb_types::{CollectionChain, Edge, EntityMap, Node, NodeKind, Snapshot};

/// Builds a [`Snapshot`] in insertion order without route validation, so
/// fixtures can also describe inconsistent stores.
///
/// `build` derives `edgeListMap` from the edges and `nodesByCollectionId`
/// from the chains; [`SnapshotBuilder::members`] overrides one collection's
/// membership entry.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    nodes: EntityMap<Node>,
    edges: EntityMap<Edge>,
    members: Vec<(String, Vec<String>)>,
    at: i64,
}

fn to_chains(chains: &[&[&str]]) -> Vec<CollectionChain> {
    chains
        .iter()
        .map(|c| c.iter().map(|s| s.to_string()).collect())
        .collect()
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `created`/`modified` for records added after this call.
    pub fn timestamp(mut self, at: i64) -> Self {
        self.at = at;
        self
    }

    pub fn root(mut self, id: &str, name: &str) -> Self {
        self.nodes
            .insert(id, Node::new(id, NodeKind::Root, name, self.at));
        self
    }

    pub fn collection(
        mut self,
        id: &str,
        name: &str,
        chains: &[&[&str]],
        collapsed: Option<bool>,
    ) -> Self {
        let mut node = Node::new(id, NodeKind::Collection, name, self.at);
        node.collection_chains = to_chains(chains);
        node.collapsed = collapsed;
        self.nodes.insert(id, node);
        self
    }

    pub fn node(mut self, id: &str, name: &str, chains: &[&[&str]]) -> Self {
        let mut node = Node::new(id, NodeKind::Node, name, self.at);
        node.collection_chains = to_chains(chains);
        self.nodes.insert(id, node);
        self
    }

    /// Add a record as-is.
    pub fn record(mut self, node: Node) -> Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn edge(mut self, id: &str, start: &str, end: &str) -> Self {
        self.edges.insert(id, Edge::new(id, start, end));
        self
    }

    /// Replace the derived membership entry for `collection`.
    pub fn members(mut self, collection: &str, ids: &[&str]) -> Self {
        self.members.push((
            collection.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    pub fn build(self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        snapshot.entities.nodes = self.nodes;
        snapshot.entities.edges = self.edges;
        edit::rebuild_edge_index(&mut snapshot);
        edit::rebuild_membership_index(&mut snapshot);
        for (collection, ids) in self.members {
            snapshot.nodes_by_collection_id.insert(collection, ids);
        }
        snapshot
    }
}
