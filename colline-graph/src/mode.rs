//! Switching between column and table display.
//!
//! Table mode is a coarser view of the same lineage. Going there collapses
//! column edges to one edge per table pair and throws the column detail
//! away, except for pinned edges, which are set aside and come back on the
//! return trip. Coming back pins every table edge that survived so the next
//! round trip keeps it too.

use crate::graph::GraphSnapshot;
use crate::merge::merge_edges;
use colline_core::LineageEdge;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Edge sets produced by a switch to table mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableModeEdges {
    /// Edges to display in table mode.
    pub table_edges: Vec<LineageEdge>,
    /// Pinned edges held back for the switch back to column mode.
    pub saved_column_edges: Vec<LineageEdge>,
}

/// Converts edge sets between display modes.
pub struct ModeTransformer;

impl ModeTransformer {
    /// Collapses column edges to one table edge per `(source, target)` pair.
    ///
    /// Pinned edges skip the collapse and go to `saved_column_edges`. A pinned
    /// edge that is already table-level is also shown as is, since it is its
    /// own collapsed form.
    pub fn to_table_mode(edges: &[LineageEdge]) -> TableModeEdges {
        let mut table_edges: Vec<LineageEdge> = Vec::new();
        let mut saved_column_edges = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for edge in edges.iter().filter(|edge| edge.pinned) {
            saved_column_edges.push(edge.clone());
            if edge.is_table_level() && seen.insert(edge.id.clone()) {
                table_edges.push(edge.clone());
            }
        }

        for edge in edges.iter().filter(|edge| !edge.pinned) {
            let id = LineageEdge::table_edge_id(&edge.source_node_id, &edge.target_node_id);
            if seen.insert(id) {
                table_edges.push(LineageEdge::table(
                    &edge.source_node_id,
                    &edge.target_node_id,
                ));
            }
        }

        debug!(
            "to table mode: {} edges collapsed to {}, {} pinned saved",
            edges.len(),
            table_edges.len(),
            saved_column_edges.len()
        );

        TableModeEdges {
            table_edges,
            saved_column_edges,
        }
    }

    /// Pins every table edge and unions the result with the saved edges by
    /// id, first write winning.
    pub fn to_column_mode(
        edges: &[LineageEdge],
        saved_column_edges: &[LineageEdge],
    ) -> Vec<LineageEdge> {
        let pinned: Vec<LineageEdge> = edges.iter().cloned().map(LineageEdge::pinned).collect();
        let merged = merge_edges(&pinned, saved_column_edges);

        debug!(
            "to column mode: {} table edges pinned, {} saved restored",
            pinned.len(),
            merged.len() - pinned.len()
        );

        merged
    }

    /// Drops nodes that have no open columns in column mode, unless they are
    /// in `keep` or touch a pinned edge. Edges of dropped nodes go with them.
    pub fn prune_empty_nodes(snapshot: &GraphSnapshot, keep: &HashSet<String>) -> GraphSnapshot {
        let mut reduced = snapshot.clone();
        reduced.nodes.retain(|node| {
            !node.columns().is_empty()
                || keep.contains(&node.id)
                || snapshot.is_pinned_anchor(&node.id)
        });
        reduced.retain_connected_edges();
        reduced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colline_core::LineageNode;

    #[test]
    fn test_collapse_to_one_edge_per_pair() {
        let edges = vec![
            LineageEdge::column("1", "a", "2", "a"),
            LineageEdge::column("1", "b", "2", "b"),
            LineageEdge::column("2", "a", "3", "a"),
        ];

        let result = ModeTransformer::to_table_mode(&edges);
        let ids: Vec<&str> = result.table_edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["1-2", "2-3"]);
        assert_eq!(
            result.table_edges[0].source_handle.as_deref(),
            Some("1__source")
        );
        assert!(result.saved_column_edges.is_empty());
    }

    #[test]
    fn test_pinned_edges_are_saved_not_collapsed() {
        let pinned = LineageEdge::column("1", "a", "2", "a").pinned();
        let edges = vec![pinned.clone(), LineageEdge::column("2", "a", "3", "a")];

        let result = ModeTransformer::to_table_mode(&edges);
        assert_eq!(result.saved_column_edges, vec![pinned]);
        let ids: Vec<&str> = result.table_edges.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["2-3"]);
    }

    #[test]
    fn test_round_trip_restores_pinned_plus_new_table_edges() {
        let pinned_column = LineageEdge::column("1", "a", "2", "a").pinned();
        let pinned_table = LineageEdge::table("4", "5").pinned();
        let transient = LineageEdge::column("2", "a", "3", "a");
        let original = vec![pinned_column.clone(), transient, pinned_table.clone()];

        let table = ModeTransformer::to_table_mode(&original);
        // an expansion in table mode adds a fresh table edge
        let mut shown = table.table_edges.clone();
        shown.push(LineageEdge::table("3", "6"));

        let restored = ModeTransformer::to_column_mode(&shown, &table.saved_column_edges);

        assert!(restored.iter().all(|e| e.pinned));
        assert!(restored.contains(&pinned_column));
        assert!(restored.contains(&pinned_table));
        assert!(restored.contains(&LineageEdge::table("3", "6").pinned()));
        // the collapsed form of the transient edge comes back pinned
        assert!(restored.contains(&LineageEdge::table("2", "3").pinned()));
        assert_eq!(restored.len(), 4);
    }

    #[test]
    fn test_second_round_trip_is_stable() {
        let original = vec![
            LineageEdge::column("1", "a", "2", "a"),
            LineageEdge::column("2", "a", "3", "a").pinned(),
        ];

        let first = ModeTransformer::to_table_mode(&original);
        let back = ModeTransformer::to_column_mode(&first.table_edges, &first.saved_column_edges);
        let second = ModeTransformer::to_table_mode(&back);
        let again =
            ModeTransformer::to_column_mode(&second.table_edges, &second.saved_column_edges);

        let mut back_ids: Vec<&str> = back.iter().map(|e| e.id.as_str()).collect();
        let mut again_ids: Vec<&str> = again.iter().map(|e| e.id.as_str()).collect();
        back_ids.sort_unstable();
        again_ids.sort_unstable();
        assert_eq!(back_ids, again_ids);
    }

    #[test]
    fn test_prune_empty_nodes() {
        let kept = LineageNode::table("root", "s");
        let anchored = LineageNode::table("anchored", "s");
        let open = LineageNode::table("open", "s").with_columns(["a"]);
        let empty = LineageNode::table("empty", "s");
        let edges = vec![
            LineageEdge::table(&open.id, &anchored.id).pinned(),
            LineageEdge::table(&open.id, &empty.id),
        ];
        let keep: HashSet<String> = [kept.id.clone()].into_iter().collect();
        let empty_id = empty.id.clone();
        let snapshot = GraphSnapshot::new(vec![kept, anchored, open, empty], edges);

        let pruned = ModeTransformer::prune_empty_nodes(&snapshot, &keep);
        assert_eq!(pruned.node_count(), 3);
        assert!(!pruned.contains_node(&empty_id));
        assert_eq!(pruned.edge_count(), 1);
    }
}
