//! Collection projection engine, snapshot editing and in-memory knowledge base.

pub mod builder;
pub mod edit;
mod memory;
mod projection;
mod validate;

pub use builder::SnapshotBuilder;
pub use kb_types::{
    CollectionChain, Diagnostic, Edge, EdgeLinks, KnowledgeStore, Node, NodeKind, Snapshot,
    StoreError, ViewModel, VisibleCollection,
};
pub use memory::InMemoryKnowledgeBase;
pub use projection::project;
pub use validate::diagnose;
