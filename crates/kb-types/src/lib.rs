//! Core types and traits for the knowledge-base collection graph.
//!
//! JSON field names follow the client store shape (`collectionChains`,
//! `edgeListMap`, `nodesByCollectionId`) so snapshots round-trip unchanged.

mod entity_map;
mod model;
mod traits;
mod view;

pub use entity_map::EntityMap;
pub use model::*;
pub use traits::*;
pub use view::*;
