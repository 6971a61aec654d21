//! Hiding nodes and columns.
//!
//! Each operation takes a snapshot and returns a reduced one. Edges are
//! always re-filtered against the surviving node set at the end, so no
//! operation can leave a dangling edge behind.

use crate::graph::GraphSnapshot;
use crate::topology::Topology;
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Result of a hide operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PruneOutcome {
    /// The reduced snapshot.
    pub snapshot: GraphSnapshot,
    /// Ids of the nodes that were dropped.
    pub removed_nodes: Vec<String>,
    /// Number of edges that were dropped.
    pub removed_edges: usize,
}

impl PruneOutcome {
    fn finish(before: &GraphSnapshot, mut snapshot: GraphSnapshot, op: &str) -> Self {
        snapshot.retain_connected_edges();

        let kept: HashSet<&str> = snapshot.nodes.iter().map(|n| n.id.as_str()).collect();
        let removed_nodes: Vec<String> = before
            .nodes
            .iter()
            .filter(|n| !kept.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        let removed_edges = before.edges.len() - snapshot.edges.len();

        debug!(
            "{}: removed {} nodes and {} edges",
            op,
            removed_nodes.len(),
            removed_edges
        );

        Self {
            snapshot,
            removed_nodes,
            removed_edges,
        }
    }
}

/// Removes nodes and the subgraphs that depend on them.
pub struct VisibilityPruner;

impl VisibilityPruner {
    /// Removes exactly one node and the edges touching it.
    pub fn hide_node(snapshot: &GraphSnapshot, node_id: &str) -> PruneOutcome {
        let mut reduced = snapshot.clone();
        reduced.nodes.retain(|node| node.id != node_id);
        PruneOutcome::finish(snapshot, reduced, "hide node")
    }

    /// Closes one column of the anchor and everything derived from it.
    ///
    /// The clicked column and every column reached from it lose their
    /// edges and are removed from their nodes. A reached node left with no
    /// columns is dropped unless it still touches a pinned edge. The anchor
    /// itself always stays, as do nodes outside the closure.
    pub fn hide_column(snapshot: &GraphSnapshot, anchor: &str, column: &str) -> PruneOutcome {
        let topology = Topology::new(snapshot);
        let descendants = topology.column_descendants(anchor, column);

        let mut reduced = snapshot.clone();

        for node in &mut reduced.nodes {
            if let Some(removed) = descendants.removed_columns.get(&node.id) {
                node.data.columns.retain(|c| !removed.contains(c));
            }
        }

        reduced.edges.retain(|edge| {
            let leaves_marked =
                descendants.is_marked(&edge.source_node_id, edge.source_column());
            let enters_marked =
                descendants.is_marked(&edge.target_node_id, edge.target_column());
            !(leaves_marked || enters_marked)
        });

        let pinned_endpoints: HashSet<&str> = reduced
            .edges
            .iter()
            .filter(|edge| edge.pinned)
            .flat_map(|edge| [edge.source_node_id.as_str(), edge.target_node_id.as_str()])
            .collect();
        let dropped: HashSet<String> = reduced
            .nodes
            .iter()
            .filter(|node| {
                node.id != anchor
                    && descendants.contains(&node.id)
                    && node.columns().is_empty()
                    && !pinned_endpoints.contains(node.id.as_str())
            })
            .map(|node| node.id.clone())
            .collect();
        reduced.nodes.retain(|node| !dropped.contains(&node.id));

        PruneOutcome::finish(snapshot, reduced, "hide column")
    }

    /// Removes every table-mode descendant of the anchor.
    pub fn hide_table(snapshot: &GraphSnapshot, anchor: &str) -> PruneOutcome {
        let topology = Topology::new(snapshot);
        let descendants: HashSet<String> = topology
            .table_descendants(anchor)
            .into_iter()
            .filter(|id| id != anchor)
            .collect();

        let mut reduced = snapshot.clone();
        reduced.nodes.retain(|node| !descendants.contains(&node.id));
        PruneOutcome::finish(snapshot, reduced, "hide table")
    }
}
