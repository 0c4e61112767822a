//! Projection output and snapshot diagnostics.

use crate::{CollectionChain, Edge, Node};
use serde::{Deserialize, Serialize};

/// Collapsed collection shown as a single entity with a member count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleCollection {
    #[serde(flatten)]
    pub collection: Node,
    pub count: usize,
}

/// Flattened view of one focus collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewModel {
    /// Leaf nodes shown individually.
    pub nodes: Vec<Node>,
    /// Every child collection reached, collapsed or expanded.
    pub collections: Vec<Node>,
    /// The collapsed subset of `collections`, with counts.
    pub visible_collections: Vec<VisibleCollection>,
    /// Edges with endpoints rewritten to their visible representatives.
    pub edges: Vec<Edge>,
    /// Breadcrumb records, root first.
    pub collection_chain: Vec<Node>,
}

impl ViewModel {
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn collection_ids(&self) -> Vec<&str> {
        self.collections.iter().map(|n| n.id.as_str()).collect()
    }

    pub fn visible_collection_ids(&self) -> Vec<&str> {
        self.visible_collections
            .iter()
            .map(|v| v.collection.id.as_str())
            .collect()
    }
}

/// Inconsistency found in a snapshot. Reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// `owner` refers to `missing`, which is not in the entity tables.
    MissingReference { owner: String, missing: String },
    /// Route whose prefix is not one of its parent's own routes.
    MalformedChain { id: String, chain: CollectionChain },
    /// Route that passes through its owner or repeats an id.
    Cycle { id: String, chain: CollectionChain },
    /// Edge table and `edgeListMap` disagree about `edge`.
    EdgeIndexMismatch { entity: String, edge: String },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::MissingReference { owner, missing } => {
                write!(f, "{} references missing entity {}", owner, missing)
            }
            Diagnostic::MalformedChain { id, chain } => {
                write!(f, "{} has malformed chain [{}]", id, chain.join(", "))
            }
            Diagnostic::Cycle { id, chain } => {
                write!(f, "{} has cyclic chain [{}]", id, chain.join(", "))
            }
            Diagnostic::EdgeIndexMismatch { entity, edge } => {
                write!(f, "edge index for {} disagrees about edge {}", entity, edge)
            }
        }
    }
}
