//! Collection projection: flatten one focus collection into a view model.
//!
//! Expanded sub-collections are inlined, collapsed ones stop the inlining and
//! stand in for everything beneath them, and edges are re-pointed at whatever
//! currently represents their endpoints.
//!
//! Nodes come out in scan order; collections and edges come out in reverse
//! scan order.

use kb_types::{CollectionChain, Edge, Node, Snapshot, ViewModel, VisibleCollection};
use std::collections::{HashMap, HashSet};

/// Project `focus` as seen along `ancestor_chain` (root first).
///
/// `ancestor_chain` may or may not already end with `focus`. Never fails:
/// unknown ids, dangling edges and malformed chains are left out of the result.
pub fn project(snapshot: &Snapshot, focus: &str, ancestor_chain: &[String]) -> ViewModel {
    let collection_chain: Vec<Node> = ancestor_chain
        .iter()
        .filter_map(|id| snapshot.node(id).cloned())
        .collect();

    if snapshot.node(focus).is_none() {
        tracing::debug!(focus, "focus collection not in snapshot");
        return ViewModel {
            collection_chain,
            ..ViewModel::default()
        };
    }

    let mut viewed: Vec<String> = ancestor_chain.to_vec();
    if viewed.last().map(String::as_str) != Some(focus) {
        viewed.push(focus.to_string());
    }

    let memberships = Memberships::build(snapshot);
    let routes = RouteIndex::build(snapshot, &memberships);
    let open = routes.open_paths(viewed.clone());
    let on_path: HashSet<&str> = viewed.iter().map(String::as_str).collect();

    let mut view = ViewModel {
        collection_chain,
        ..ViewModel::default()
    };
    let mut visibility = Visibility {
        open: &open,
        memberships: &memberships,
        shown: HashSet::new(),
        collapsed: HashSet::new(),
    };

    for node in snapshot.entities.nodes.values() {
        if on_path.contains(node.id.as_str()) {
            continue;
        }
        if !memberships.of(node).iter().any(|c| open.contains(c)) {
            continue;
        }
        if node.is_collection() {
            view.collections.push(node.clone());
            if node.is_collapsed() {
                visibility.shown.insert(node.id.as_str());
                visibility.collapsed.insert(node.id.as_str());
                view.visible_collections.push(VisibleCollection {
                    collection: node.clone(),
                    count: member_count(snapshot, &node.id),
                });
            }
        } else {
            visibility.shown.insert(node.id.as_str());
            view.nodes.push(node.clone());
        }
    }
    view.collections.reverse();
    view.visible_collections.reverse();

    for edge in snapshot.entities.edges.values() {
        match (
            visibility.representative(snapshot, &edge.start),
            visibility.representative(snapshot, &edge.end),
        ) {
            (Some(start), Some(end)) => view.edges.push(Edge::new(edge.id.as_str(), start, end)),
            _ => tracing::trace!(edge = %edge.id, "edge endpoint not visible from {}", focus),
        }
    }
    view.edges.reverse();

    tracing::debug!(
        focus,
        open_paths = open.len(),
        recovered = memberships.recovered.len(),
        nodes = view.nodes.len(),
        collections = view.collections.len(),
        collapsed = view.visible_collections.len(),
        edges = view.edges.len(),
        "projected collection"
    );
    view
}

/// Distinct ids listed for `collection` in the membership index.
fn member_count(snapshot: &Snapshot, collection: &str) -> usize {
    snapshot
        .nodes_by_collection_id
        .get(collection)
        .map(|members| members.iter().collect::<HashSet<_>>().len())
        .unwrap_or(0)
}

/// Every route into `collection`: one per route of its own, or just
/// `[collection]` for a parentless one.
fn routes_into(collection: &Node) -> Vec<CollectionChain> {
    if collection.collection_chains.is_empty() {
        return vec![vec![collection.id.clone()]];
    }
    collection
        .collection_chains
        .iter()
        .map(|c| {
            let mut route = c.clone();
            route.push(collection.id.clone());
            route
        })
        .collect()
}

/// Routes used to place each entity.
///
/// An entity none of whose chains names only known ids is placed through
/// `nodesByCollectionId` instead: under the deepest collections listing it
/// that its own chains do not already mention.
struct Memberships<'a> {
    recovered: HashMap<&'a str, Vec<CollectionChain>>,
}

impl<'a> Memberships<'a> {
    fn build(snapshot: &'a Snapshot) -> Self {
        let mut listed: HashMap<&'a str, Vec<&'a Node>> = HashMap::new();
        for (cid, members) in &snapshot.nodes_by_collection_id {
            let Some(collection) = snapshot.node(cid).filter(|c| c.is_collection()) else {
                continue;
            };
            for member in members {
                let parents = listed.entry(member.as_str()).or_default();
                if !parents.iter().any(|p| p.id == collection.id) {
                    parents.push(collection);
                }
            }
        }

        let mut recovered = HashMap::new();
        for node in snapshot.entities.nodes.values() {
            let chains = &node.collection_chains;
            if chains.is_empty()
                || chains
                    .iter()
                    .any(|c| c.iter().all(|id| snapshot.node(id).is_some()))
            {
                continue;
            }
            let Some(parents) = listed.get(node.id.as_str()) else {
                continue;
            };
            let named = |p: &&Node| !chains.iter().any(|c| c.contains(&p.id));
            let candidates: Vec<&Node> = parents.iter().copied().filter(named).collect();
            let deepest = candidates.iter().filter(|p| {
                !candidates
                    .iter()
                    .any(|q| q.collection_chains.iter().any(|c| c.contains(&p.id)))
            });
            let routes: Vec<CollectionChain> = deepest
                .flat_map(|p| routes_into(p))
                .filter(|r| !r.contains(&node.id))
                .collect();
            if !routes.is_empty() {
                tracing::trace!(id = %node.id, routes = routes.len(), "placed through membership index");
                recovered.insert(node.id.as_str(), routes);
            }
        }
        Self { recovered }
    }

    fn of<'r>(&'r self, node: &'r Node) -> &'r [CollectionChain] {
        self.recovered
            .get(node.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(node.collection_chains.as_slice())
    }
}

/// route -> entities that have exactly that route among their chains, in scan order.
struct RouteIndex<'a> {
    members: HashMap<&'a [String], Vec<&'a Node>>,
}

impl<'a> RouteIndex<'a> {
    fn build(snapshot: &'a Snapshot, memberships: &'a Memberships<'a>) -> Self {
        let mut members: HashMap<&'a [String], Vec<&'a Node>> = HashMap::new();
        for node in snapshot.entities.nodes.values() {
            for chain in memberships.of(node) {
                let list = members.entry(chain.as_slice()).or_default();
                if !list.iter().any(|m| m.id == node.id) {
                    list.push(node);
                }
            }
        }
        Self { members }
    }

    /// The viewed path plus every path reached by stepping into an expanded
    /// collection. Paths only grow by ids not already on them, so the walk
    /// ends even when chains mention their own owner.
    fn open_paths(&self, viewed: Vec<String>) -> HashSet<Vec<String>> {
        let mut open: HashSet<Vec<String>> = HashSet::new();
        let mut pending = vec![viewed];
        while let Some(path) = pending.pop() {
            if open.contains(&path) {
                continue;
            }
            if let Some(members) = self.members.get(path.as_slice()) {
                for member in members {
                    if !member.is_collection() || member.is_collapsed() {
                        continue;
                    }
                    if path.contains(&member.id) {
                        continue;
                    }
                    let mut inner = path.clone();
                    inner.push(member.id.clone());
                    pending.push(inner);
                }
            }
            open.insert(path);
        }
        open
    }
}

struct Visibility<'a> {
    open: &'a HashSet<Vec<String>>,
    memberships: &'a Memberships<'a>,
    /// Entities drawn as themselves: leaves and collapsed collections.
    shown: HashSet<&'a str>,
    collapsed: HashSet<&'a str>,
}

impl<'a> Visibility<'a> {
    /// The entity drawn in place of `id`: itself when shown, otherwise the
    /// nearest collapsed ancestor reached through an open route. Chains are
    /// tried in stored order.
    fn representative(&self, snapshot: &'a Snapshot, id: &str) -> Option<&'a str> {
        let node = snapshot.node(id)?;
        if self.shown.contains(id) {
            return Some(node.id.as_str());
        }
        for chain in self.memberships.of(node) {
            for (depth, ancestor) in chain.iter().enumerate().rev() {
                if self.collapsed.contains(ancestor.as_str()) && self.open.contains(&chain[..depth])
                {
                    return Some(ancestor.as_str());
                }
            }
        }
        None
    }
}
