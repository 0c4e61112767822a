//! Snapshot consistency report.

use kb_types::{Diagnostic, Node, Snapshot};
use std::collections::HashSet;

const EDGE_INDEX: &str = "edgeListMap";
const MEMBER_INDEX: &str = "nodesByCollectionId";

/// Everything in `snapshot` the projection would silently skip over.
/// Entities first (scan order), then edges, then the two indexes.
pub fn diagnose(snapshot: &Snapshot) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for node in snapshot.entities.nodes.values() {
        check_chains(snapshot, node, &mut out);
    }
    check_edges(snapshot, &mut out);
    check_membership_index(snapshot, &mut out);
    if !out.is_empty() {
        tracing::debug!(count = out.len(), "snapshot diagnostics");
    }
    out
}

fn check_chains(snapshot: &Snapshot, node: &Node, out: &mut Vec<Diagnostic>) {
    for chain in &node.collection_chains {
        let mut seen = HashSet::new();
        let repeats = !chain.iter().all(|c| seen.insert(c.as_str()));
        if repeats || chain.iter().any(|c| c == &node.id) {
            out.push(Diagnostic::Cycle {
                id: node.id.clone(),
                chain: chain.clone(),
            });
            continue;
        }

        let missing: Vec<&String> = chain
            .iter()
            .filter(|c| snapshot.node(c).is_none())
            .collect();
        if !missing.is_empty() {
            for m in missing {
                out.push(Diagnostic::MissingReference {
                    owner: node.id.clone(),
                    missing: m.clone(),
                });
            }
            continue;
        }

        let Some((parent_id, prefix)) = chain.split_last() else {
            out.push(Diagnostic::MalformedChain {
                id: node.id.clone(),
                chain: chain.clone(),
            });
            continue;
        };
        let routed = snapshot.node(parent_id).is_some_and(|parent| {
            parent.is_collection()
                && if prefix.is_empty() {
                    parent.is_root()
                } else {
                    parent.has_chain(prefix)
                }
        });
        if !routed {
            out.push(Diagnostic::MalformedChain {
                id: node.id.clone(),
                chain: chain.clone(),
            });
        }
    }
}

fn check_edges(snapshot: &Snapshot, out: &mut Vec<Diagnostic>) {
    for edge in snapshot.entities.edges.values() {
        for endpoint in [&edge.start, &edge.end] {
            if snapshot.node(endpoint).is_none() {
                out.push(Diagnostic::MissingReference {
                    owner: edge.id.clone(),
                    missing: endpoint.clone(),
                });
            }
        }
        let listed_from = snapshot
            .edge_list_map
            .get(&edge.start)
            .is_some_and(|l| l.from.contains(&edge.id));
        if !listed_from {
            out.push(Diagnostic::EdgeIndexMismatch {
                entity: edge.start.clone(),
                edge: edge.id.clone(),
            });
        }
        let listed_to = snapshot
            .edge_list_map
            .get(&edge.end)
            .is_some_and(|l| l.to.contains(&edge.id));
        if !listed_to {
            out.push(Diagnostic::EdgeIndexMismatch {
                entity: edge.end.clone(),
                edge: edge.id.clone(),
            });
        }
    }

    for (entity, links) in &snapshot.edge_list_map {
        if snapshot.node(entity).is_none() {
            out.push(Diagnostic::MissingReference {
                owner: EDGE_INDEX.to_string(),
                missing: entity.clone(),
            });
        }
        let stale_from = links
            .from
            .iter()
            .filter(|id| snapshot.edge(id).map_or(true, |e| &e.start != entity));
        let stale_to = links
            .to
            .iter()
            .filter(|id| snapshot.edge(id).map_or(true, |e| &e.end != entity));
        for id in stale_from.chain(stale_to) {
            out.push(Diagnostic::EdgeIndexMismatch {
                entity: entity.clone(),
                edge: id.clone(),
            });
        }
    }
}

fn check_membership_index(snapshot: &Snapshot, out: &mut Vec<Diagnostic>) {
    for (collection, members) in &snapshot.nodes_by_collection_id {
        if snapshot.node(collection).is_none() {
            out.push(Diagnostic::MissingReference {
                owner: MEMBER_INDEX.to_string(),
                missing: collection.clone(),
            });
        }
        for member in members {
            if snapshot.node(member).is_none() {
                out.push(Diagnostic::MissingReference {
                    owner: collection.clone(),
                    missing: member.clone(),
                });
            }
        }
    }
}
