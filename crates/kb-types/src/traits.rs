//! Store trait and errors.

use crate::{CollectionChain, Diagnostic, Edge, Node, NodeKind, Snapshot, ViewModel};
use async_trait::async_trait;
use std::sync::Arc;

/// Versioned holder of the current snapshot. Every mutation publishes a new
/// snapshot; readers keep whatever `Arc<Snapshot>` they already hold.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Current snapshot.
    async fn snapshot(&self) -> Arc<Snapshot>;

    /// Bumped once per successful mutation.
    async fn version(&self) -> u64;

    /// Create a node or collection under the given routes; returns the new record.
    async fn create_node(
        &self,
        kind: NodeKind,
        name: &str,
        chains: Vec<CollectionChain>,
    ) -> Result<Node, StoreError>;

    /// Remove an entity and its incident edges.
    async fn remove_node(&self, id: &str) -> Result<Node, StoreError>;

    /// Create an edge `start -> end` with a generated id.
    async fn connect(&self, start: &str, end: &str) -> Result<Edge, StoreError>;

    async fn remove_edge(&self, id: &str) -> Result<Edge, StoreError>;

    async fn set_collapsed(&self, id: &str, collapsed: bool) -> Result<(), StoreError>;

    /// Flip a collection's collapse flag; returns the new value.
    async fn toggle_collapsed(&self, id: &str) -> Result<bool, StoreError>;

    async fn rename(&self, id: &str, name: &str) -> Result<(), StoreError>;

    /// Add a membership route (multi-parent).
    async fn attach(&self, id: &str, chain: CollectionChain) -> Result<(), StoreError>;

    /// Remove a membership route.
    async fn detach(&self, id: &str, chain: &[String]) -> Result<(), StoreError>;

    /// Flattened view of `focus` along `ancestor_chain`.
    async fn project(&self, focus: &str, ancestor_chain: &[String]) -> Arc<ViewModel>;

    /// Consistency report for the current snapshot.
    async fn diagnostics(&self) -> Vec<Diagnostic>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    Duplicate(String),
    #[error("{id} is a {kind}, expected a collection")]
    InvalidKind { id: String, kind: NodeKind },
    #[error("invalid chain for {id}: {reason}")]
    InvalidChain { id: String, reason: String },
    #[error("collection {0} still has members")]
    NotEmpty(String),
    #[error("{0} would be left without any membership route")]
    Orphaned(String),
}
