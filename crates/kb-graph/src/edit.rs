//! Snapshot editing that keeps `edgeListMap` and `nodesByCollectionId`
//! consistent with the entity tables.
//!
//! Every operation validates before it mutates, so an `Err` leaves the
//! snapshot untouched.

use kb_types::{CollectionChain, Edge, EdgeLinks, Node, NodeKind, Snapshot, StoreError};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

type EdgeIndex = BTreeMap<String, EdgeLinks>;
type MemberIndex = BTreeMap<String, Vec<String>>;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fresh record with a generated id and `created == modified == now`.
pub fn new_node(kind: NodeKind, name: &str, chains: Vec<CollectionChain>) -> Node {
    let mut node = Node::new(Uuid::new_v4().to_string(), kind, name, now_millis());
    node.collection_chains = chains;
    node
}

pub fn new_edge_id() -> String {
    Uuid::new_v4().to_string()
}

fn lookup<'a>(snapshot: &'a Snapshot, id: &str) -> Result<&'a Node, StoreError> {
    snapshot
        .node(id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

fn lookup_collection<'a>(snapshot: &'a Snapshot, id: &str) -> Result<&'a Node, StoreError> {
    let node = lookup(snapshot, id)?;
    if !node.is_collection() {
        return Err(StoreError::InvalidKind {
            id: id.to_string(),
            kind: node.kind,
        });
    }
    Ok(node)
}

fn invalid_chain(id: &str, reason: &str) -> StoreError {
    StoreError::InvalidChain {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

/// `chain` must name existing collections, avoid `id` and repeats, and be a
/// real route: its last element is the root (for a one-element chain) or
/// already lives at `chain[..n-1]`.
fn check_route(snapshot: &Snapshot, id: &str, chain: &[String]) -> Result<(), StoreError> {
    let Some((parent_id, prefix)) = chain.split_last() else {
        return Err(invalid_chain(id, "empty chain"));
    };
    if chain.iter().any(|c| c == id) {
        return Err(invalid_chain(id, "chain passes through the entity itself"));
    }
    let mut seen = HashSet::new();
    if !chain.iter().all(|c| seen.insert(c.as_str())) {
        return Err(invalid_chain(id, "chain repeats a collection"));
    }
    for cid in chain {
        lookup_collection(snapshot, cid)?;
    }
    let parent = lookup_collection(snapshot, parent_id)?;
    let routed = if prefix.is_empty() {
        parent.is_root()
    } else {
        parent.has_chain(prefix)
    };
    if !routed {
        return Err(invalid_chain(
            id,
            &format!("{} is not reachable by that route", parent_id),
        ));
    }
    Ok(())
}

fn index_memberships(index: &mut MemberIndex, node: &Node) {
    for chain in &node.collection_chains {
        for cid in chain {
            let members = index.entry(cid.clone()).or_default();
            if !members.contains(&node.id) {
                members.push(node.id.clone());
            }
        }
    }
}

fn add_edge_to_index(index: &mut EdgeIndex, edge: &Edge) {
    index
        .entry(edge.start.clone())
        .or_default()
        .from
        .push(edge.id.clone());
    index
        .entry(edge.end.clone())
        .or_default()
        .to
        .push(edge.id.clone());
}

fn remove_edge_from_index(index: &mut EdgeIndex, edge: &Edge) {
    for entity in [&edge.start, &edge.end] {
        if let Some(links) = index.get_mut(entity.as_str()) {
            links.from.retain(|x| x != &edge.id);
            links.to.retain(|x| x != &edge.id);
            if links.is_empty() {
                index.remove(entity.as_str());
            }
        }
    }
}

/// Derive `edgeListMap` from the edge table.
pub fn rebuild_edge_index(snapshot: &mut Snapshot) {
    let mut index = EdgeIndex::new();
    for edge in snapshot.entities.edges.values() {
        add_edge_to_index(&mut index, edge);
    }
    snapshot.edge_list_map = index;
}

/// Derive `nodesByCollectionId` from the chains: every collection on any of
/// an entity's chains lists that entity once.
pub fn rebuild_membership_index(snapshot: &mut Snapshot) {
    let mut index = MemberIndex::new();
    for node in snapshot.entities.nodes.values() {
        index_memberships(&mut index, node);
    }
    snapshot.nodes_by_collection_id = index;
}

/// Insert a new record. A route into a multi-parent collection is completed
/// with the collection's other routes, so the record is reachable however
/// its parent is reached.
pub fn insert_node(snapshot: &mut Snapshot, mut node: Node) -> Result<(), StoreError> {
    if snapshot.entities.nodes.contains_key(&node.id) {
        return Err(StoreError::Duplicate(node.id));
    }
    if node.kind == NodeKind::Root {
        if !node.collection_chains.is_empty() {
            return Err(invalid_chain(&node.id, "root cannot have a parent"));
        }
    } else if node.collection_chains.is_empty() {
        return Err(StoreError::Orphaned(node.id));
    }
    let mut routes = HashSet::new();
    for chain in &node.collection_chains {
        check_route(snapshot, &node.id, chain)?;
        if !routes.insert(chain.as_slice()) {
            return Err(invalid_chain(&node.id, "route listed twice"));
        }
    }
    node.collection_chains = complete_routes(snapshot, &node.id, &node.collection_chains);

    index_memberships(&mut snapshot.nodes_by_collection_id, &node);
    tracing::debug!(id = %node.id, kind = %node.kind, "insert node");
    snapshot.entities.nodes.insert(node.id.clone(), node);
    Ok(())
}

/// `chains` plus every other route into each chain's parent, in order.
fn complete_routes(snapshot: &Snapshot, id: &str, chains: &[CollectionChain]) -> Vec<CollectionChain> {
    let mut out: Vec<CollectionChain> = Vec::new();
    for chain in chains {
        if !out.contains(chain) {
            out.push(chain.clone());
        }
        let Some(parent) = chain.last().and_then(|p| snapshot.node(p)) else {
            continue;
        };
        for route in &parent.collection_chains {
            let mut next = route.clone();
            next.push(parent.id.clone());
            if !next.iter().any(|c| c == id) && !out.contains(&next) {
                out.push(next);
            }
        }
    }
    out
}

/// Create edge `id` from `start` to `end`.
pub fn connect(snapshot: &mut Snapshot, id: &str, start: &str, end: &str) -> Result<Edge, StoreError> {
    if snapshot.entities.edges.contains_key(id) {
        return Err(StoreError::Duplicate(id.to_string()));
    }
    lookup(snapshot, start)?;
    lookup(snapshot, end)?;

    let edge = Edge::new(id, start, end);
    add_edge_to_index(&mut snapshot.edge_list_map, &edge);
    snapshot.entities.edges.insert(id, edge.clone());
    tracing::debug!(edge = id, start, end, "connect");
    Ok(edge)
}

pub fn remove_edge(snapshot: &mut Snapshot, id: &str) -> Result<Edge, StoreError> {
    let edge = snapshot
        .entities
        .edges
        .remove(id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    remove_edge_from_index(&mut snapshot.edge_list_map, &edge);
    Ok(edge)
}

/// Remove an entity with its incident edges. Collections must be empty.
pub fn remove_node(snapshot: &mut Snapshot, id: &str) -> Result<Node, StoreError> {
    let node = lookup(snapshot, id)?;
    if node.is_collection() {
        let has_members = snapshot
            .entities
            .nodes
            .values()
            .any(|n| n.collection_chains.iter().any(|c| c.iter().any(|x| x == id)));
        if has_members {
            return Err(StoreError::NotEmpty(id.to_string()));
        }
    }

    let incident: Vec<String> = snapshot
        .entities
        .edges
        .values()
        .filter(|e| e.start == id || e.end == id)
        .map(|e| e.id.clone())
        .collect();
    for edge_id in &incident {
        remove_edge(snapshot, edge_id)?;
    }
    snapshot.edge_list_map.remove(id);
    snapshot.nodes_by_collection_id.remove(id);
    for members in snapshot.nodes_by_collection_id.values_mut() {
        members.retain(|m| m != id);
    }
    snapshot.nodes_by_collection_id.retain(|_, m| !m.is_empty());

    let removed = snapshot
        .entities
        .nodes
        .remove(id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    tracing::debug!(id, edges = incident.len(), "remove node");
    Ok(removed)
}

pub fn set_collapsed(snapshot: &mut Snapshot, id: &str, collapsed: bool) -> Result<(), StoreError> {
    lookup_collection(snapshot, id)?;
    if let Some(node) = snapshot.entities.nodes.get_mut(id) {
        node.collapsed = Some(collapsed);
    }
    Ok(())
}

/// Returns the new collapse state.
pub fn toggle_collapsed(snapshot: &mut Snapshot, id: &str) -> Result<bool, StoreError> {
    let next = !lookup_collection(snapshot, id)?.is_collapsed();
    set_collapsed(snapshot, id, next)?;
    Ok(next)
}

pub fn rename(snapshot: &mut Snapshot, id: &str, name: &str) -> Result<(), StoreError> {
    let node = snapshot
        .entities
        .nodes
        .get_mut(id)
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    node.name = name.to_string();
    node.modified = now_millis().max(node.created);
    Ok(())
}

/// True when `chain` runs through `id` reached by `route`, i.e. starts with `route + [id]`.
fn passes_through(chain: &[String], route: &[String], id: &str) -> bool {
    chain.len() > route.len() && chain.starts_with(route) && chain[route.len()] == id
}

/// Add membership route `chain` to `id`. Descendants of a collection gain the
/// same sub-routes under the new parent.
pub fn attach(snapshot: &mut Snapshot, id: &str, chain: CollectionChain) -> Result<(), StoreError> {
    let node = lookup(snapshot, id)?;
    if node.kind == NodeKind::Root {
        return Err(invalid_chain(id, "root cannot have a parent"));
    }
    if node.has_chain(&chain) {
        return Err(invalid_chain(id, "route already present"));
    }
    check_route(snapshot, id, &chain)?;

    let existing = node.collection_chains.clone();
    let mut mirrored: Vec<(String, CollectionChain)> = Vec::new();
    for other in snapshot.entities.nodes.values() {
        for c in &other.collection_chains {
            for route in &existing {
                if !passes_through(c, route, id) {
                    continue;
                }
                let mut next = chain.clone();
                next.extend_from_slice(&c[route.len()..]);
                if !other.has_chain(&next) && !mirrored.contains(&(other.id.clone(), next.clone())) {
                    mirrored.push((other.id.clone(), next));
                }
            }
        }
    }

    for (other, next) in mirrored {
        if let Some(n) = snapshot.entities.nodes.get_mut(&other) {
            n.collection_chains.push(next);
        }
    }
    if let Some(n) = snapshot.entities.nodes.get_mut(id) {
        n.collection_chains.push(chain);
    }
    rebuild_membership_index(snapshot);
    Ok(())
}

/// Remove membership route `chain` from `id` and the descendant routes that ran through it.
pub fn detach(snapshot: &mut Snapshot, id: &str, chain: &[String]) -> Result<(), StoreError> {
    let node = lookup(snapshot, id)?;
    if !node.has_chain(chain) {
        return Err(invalid_chain(id, "route not present"));
    }
    if node.collection_chains.len() == 1 {
        return Err(StoreError::Orphaned(id.to_string()));
    }
    let stranded = snapshot.entities.nodes.values().find(|other| {
        other.id != id
            && !other.collection_chains.is_empty()
            && other
                .collection_chains
                .iter()
                .all(|c| passes_through(c, chain, id))
    });
    if let Some(other) = stranded {
        return Err(StoreError::Orphaned(other.id.clone()));
    }

    if let Some(n) = snapshot.entities.nodes.get_mut(id) {
        n.collection_chains.retain(|c| c.as_slice() != chain);
    }
    for other in snapshot.entities.nodes.values_mut() {
        if other.id == id {
            continue;
        }
        other
            .collection_chains
            .retain(|c| !passes_through(c, chain, id));
    }
    rebuild_membership_index(snapshot);
    Ok(())
}
