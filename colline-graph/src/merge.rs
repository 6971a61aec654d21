//! Merging resolver fragments into a snapshot.
//!
//! Fragments from separate expansions overlap: the anchor node comes back
//! in every response and neighbouring expansions share edges. Merging is a
//! pure function of the old collections and the incoming ones.

use crate::graph::GraphSnapshot;
use colline_core::{Fragment, LineageEdge, LineageNode};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Merges incoming nodes into existing ones.
///
/// A node already present keeps its id, type and canvas position; its data
/// is replaced by the incoming data except `columns`, which becomes the
/// case-insensitive union of old and new (existing order first). Unknown
/// nodes are appended in incoming order.
pub fn merge_nodes(existing: &[LineageNode], incoming: &[LineageNode]) -> Vec<LineageNode> {
    let mut merged: Vec<LineageNode> = existing.to_vec();
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, node)| (node.id.clone(), i))
        .collect();

    for node in incoming {
        match index.get(&node.id) {
            Some(&i) => {
                let current = &mut merged[i];
                let columns = current.data.columns.union(&node.data.columns);
                current.data = node.data.clone();
                current.data.columns = columns;
            }
            None => {
                index.insert(node.id.clone(), merged.len());
                merged.push(node.clone());
            }
        }
    }

    merged
}

/// Unions edges by id. On a collision the existing edge wins, so a later
/// fetch can never overwrite a pinned edge with a transient one.
pub fn merge_edges(existing: &[LineageEdge], incoming: &[LineageEdge]) -> Vec<LineageEdge> {
    let mut seen: HashSet<&str> = existing.iter().map(|edge| edge.id.as_str()).collect();
    let mut merged = existing.to_vec();

    for edge in incoming {
        if seen.insert(edge.id.as_str()) {
            merged.push(edge.clone());
        }
    }

    merged
}

impl GraphSnapshot {
    /// Returns this snapshot with a fragment merged in.
    pub fn merged(&self, fragment: &Fragment) -> GraphSnapshot {
        let nodes = merge_nodes(&self.nodes, &fragment.nodes);
        let edges = merge_edges(&self.edges, &fragment.edges);

        debug!(
            "merged fragment: {} nodes in ({} new), {} edges in ({} new)",
            fragment.nodes.len(),
            nodes.len() - self.nodes.len(),
            fragment.edges.len(),
            edges.len() - self.edges.len()
        );

        GraphSnapshot { nodes, edges }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colline_core::Position;
    use proptest::prelude::*;

    fn node(name: &str, columns: &[&str]) -> LineageNode {
        LineageNode::table(name, "s").with_columns(columns.iter().copied())
    }

    fn column_names(node: &LineageNode) -> Vec<&str> {
        node.columns().iter().collect()
    }

    #[test]
    fn test_column_union_keeps_first_spelling() {
        let existing = vec![node("orders", &["a", "b"])];
        let incoming = vec![node("orders", &["B", "c"])];

        let merged = merge_nodes(&existing, &incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(column_names(&merged[0]), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_merge_replaces_data_but_keeps_position() {
        let mut old = node("orders", &["a"]);
        old.position = Position::new(10.0, 20.0);
        let mut new = node("orders", &[]);
        new.data.schema = "mart".to_string();
        new.data.is_sink_boundary = true;

        let merged = merge_nodes(&[old], &[new]);
        assert_eq!(merged[0].position, Position::new(10.0, 20.0));
        assert_eq!(merged[0].data.schema, "mart");
        assert!(merged[0].data.is_sink_boundary);
        assert_eq!(column_names(&merged[0]), vec!["a"]);
    }

    #[test]
    fn test_new_nodes_appended_in_order() {
        let existing = vec![node("a", &[])];
        let incoming = vec![node("c", &[]), node("a", &[]), node("b", &[])];

        let names: Vec<String> = merge_nodes(&existing, &incoming)
            .iter()
            .map(|n| n.table_name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_edges_first_write_wins() {
        let pinned = LineageEdge::table("1", "2").pinned();
        let transient = LineageEdge::table("1", "2");
        let other = LineageEdge::column("1", "x", "2", "x");

        let merged = merge_edges(&[pinned.clone()], &[transient, other.clone()]);
        assert_eq!(merged, vec![pinned, other]);
    }

    #[test]
    fn test_duplicate_incoming_edges_collapse() {
        let edge = LineageEdge::column("1", "x", "2", "y");
        let merged = merge_edges(&[], &[edge.clone(), edge.clone()]);
        assert_eq!(merged, vec![edge]);
    }

    fn arb_node() -> impl Strategy<Value = LineageNode> {
        (
            prop::sample::select(vec!["orders", "items", "summary", "users"]),
            prop::collection::vec(
                prop::sample::select(vec!["id", "ID", "amt", "Amt", "qty", "week_ver"]),
                0..4,
            ),
            any::<bool>(),
        )
            .prop_map(|(name, columns, last)| {
                let mut node = node(name, &columns);
                node.data.is_sink_boundary = last;
                node
            })
    }

    proptest! {
        #[test]
        fn test_merge_nodes_idempotent(
            a in prop::collection::vec(arb_node(), 0..6),
            b in prop::collection::vec(arb_node(), 0..6),
        ) {
            let a = merge_nodes(&[], &a);
            let once = merge_nodes(&a, &b);
            let twice = merge_nodes(&once, &b);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_merge_nodes_unique_ids_and_columns(
            a in prop::collection::vec(arb_node(), 0..6),
            b in prop::collection::vec(arb_node(), 0..6),
        ) {
            let merged = merge_nodes(&merge_nodes(&[], &a), &b);
            let snapshot = GraphSnapshot::new(merged.clone(), vec![]);
            prop_assert!(snapshot.validate().is_ok());

            // every incoming column is present on the merged node
            for incoming in &b {
                let node = merged.iter().find(|n| n.id == incoming.id).unwrap();
                for column in incoming.columns().iter() {
                    prop_assert!(node.has_column(column));
                }
            }
        }
    }
}
