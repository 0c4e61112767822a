//! Normalized store records: nodes, collections, edges and the two indexes.

use crate::EntityMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of entity. Serialized as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Leaf knowledge node.
    Node,
    /// Folder that holds nodes and other collections.
    Collection,
    /// Top-level sentinel; has no parent.
    Root,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Node => "node",
            NodeKind::Collection => "collection",
            NodeKind::Root => "root",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One membership route: collection ids from the root down to the direct parent.
pub type CollectionChain = Vec<String>;

/// Entity record (leaf node, collection or root sentinel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    /// Epoch milliseconds.
    pub created: i64,
    /// Epoch milliseconds.
    pub modified: i64,
    /// Every route by which this entity is a member; one per parent.
    #[serde(default)]
    pub collection_chains: Vec<CollectionChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collapsed: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_root_collection: bool,
}

fn is_false(v: &bool) -> bool {
    !*v
}

impl Node {
    /// Record with no memberships and `created == modified == at`.
    pub fn new(id: impl Into<String>, kind: NodeKind, name: impl Into<String>, at: i64) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            created: at,
            modified: at,
            collection_chains: Vec::new(),
            collapsed: None,
            is_root_collection: kind == NodeKind::Root,
        }
    }

    /// Collections and the root sentinel can hold members.
    pub fn is_collection(&self) -> bool {
        matches!(self.kind, NodeKind::Collection | NodeKind::Root)
    }

    /// Only an explicit `collapsed: true` hides members.
    pub fn is_collapsed(&self) -> bool {
        self.collapsed == Some(true)
    }

    pub fn is_root(&self) -> bool {
        self.kind == NodeKind::Root || self.is_root_collection
    }

    /// True when `path` is one of this entity's membership routes.
    pub fn has_chain(&self, path: &[String]) -> bool {
        self.collection_chains.iter().any(|c| c.as_slice() == path)
    }
}

/// Directed edge `start -> end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub start: String,
    pub end: String,
}

impl Edge {
    pub fn new(id: impl Into<String>, start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Edge ids touching one entity: `from` where it is the start, `to` where it is the end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeLinks {
    #[serde(default)]
    pub from: Vec<String>,
    #[serde(default)]
    pub to: Vec<String>,
}

impl EdgeLinks {
    pub fn is_empty(&self) -> bool {
        self.from.is_empty() && self.to.is_empty()
    }
}

/// Entity tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub nodes: EntityMap<Node>,
    #[serde(default)]
    pub edges: EntityMap<Edge>,
}

/// Immutable store snapshot handed to the projection engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub entities: Entities,
    /// entity_id -> edges it starts / ends.
    #[serde(default)]
    pub edge_list_map: BTreeMap<String, EdgeLinks>,
    /// collection_id -> direct and transitive member ids.
    #[serde(default)]
    pub nodes_by_collection_id: BTreeMap<String, Vec<String>>,
}

impl Snapshot {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.entities.nodes.get(id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.entities.edges.get(id)
    }

    /// First root sentinel in scan order.
    pub fn root(&self) -> Option<&Node> {
        self.entities.nodes.values().find(|n| n.is_root())
    }
}
