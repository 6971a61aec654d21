//! Graph traversal over a snapshot.
//!
//! Snapshots store plain vectors; [`Topology`] indexes one into a petgraph
//! `DiGraph` so the closure and layering walks can use `edges_directed`.
//! Every walk keeps a visited set: lineage is acyclic in practice, but a
//! malformed resolver response must not hang the pruner.

use crate::graph::GraphSnapshot;
use colline_core::{ColumnSet, LineageEdge};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};

/// Nodes reached from an anchor, with the columns each loses.
#[derive(Debug, Clone, Default)]
pub struct Descendants {
    /// Reached node ids in BFS order, excluding the anchor.
    pub nodes: Vec<String>,
    /// Per node (anchor included) the columns marked for removal.
    pub removed_columns: HashMap<String, ColumnSet>,
}

impl Descendants {
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|id| id == node_id)
    }

    /// True if `column` on `node_id` is marked for removal.
    pub fn is_marked(&self, node_id: &str, column: Option<&str>) -> bool {
        match (self.removed_columns.get(node_id), column) {
            (Some(columns), Some(column)) => columns.contains(column),
            _ => false,
        }
    }

    fn mark(&mut self, node_id: &str, column: &str) {
        self.removed_columns
            .entry(node_id.to_string())
            .or_default()
            .insert(column);
    }

    fn reach(&mut self, anchor: &str, node_id: &str) {
        if node_id != anchor && !self.contains(node_id) {
            self.nodes.push(node_id.to_string());
        }
    }
}

/// Petgraph index over a snapshot. Edge weights are positions in
/// `snapshot.edges`.
pub struct Topology<'a> {
    snapshot: &'a GraphSnapshot,
    graph: DiGraph<&'a str, usize>,
    index: HashMap<&'a str, NodeIndex>,
}

impl<'a> Topology<'a> {
    /// Indexes a snapshot. Edges with a missing endpoint are skipped.
    pub fn new(snapshot: &'a GraphSnapshot) -> Self {
        let mut graph = DiGraph::new();
        let mut index = HashMap::new();

        for node in &snapshot.nodes {
            let idx = graph.add_node(node.id.as_str());
            index.insert(node.id.as_str(), idx);
        }

        for (position, edge) in snapshot.edges.iter().enumerate() {
            let source = index.get(edge.source_node_id.as_str());
            let target = index.get(edge.target_node_id.as_str());
            if let (Some(&source), Some(&target)) = (source, target) {
                graph.add_edge(source, target, position);
            }
        }

        Self {
            snapshot,
            graph,
            index,
        }
    }

    /// Edges leaving a node.
    pub fn outgoing(&self, node_id: &str) -> Vec<&'a LineageEdge> {
        self.edges(node_id, Direction::Outgoing)
    }

    /// Edges arriving at a node.
    pub fn incoming(&self, node_id: &str) -> Vec<&'a LineageEdge> {
        self.edges(node_id, Direction::Incoming)
    }

    fn edges(&self, node_id: &str, direction: Direction) -> Vec<&'a LineageEdge> {
        let snapshot = self.snapshot;
        match self.index.get(node_id) {
            Some(&idx) => self
                .graph
                .edges_directed(idx, direction)
                .map(|edge_ref| &snapshot.edges[*edge_ref.weight()])
                .collect(),
            None => Vec::new(),
        }
    }

    /// Number of distinct target handles among a node's incoming edges.
    pub fn distinct_inbound_handles(&self, node_id: &str) -> usize {
        self.incoming(node_id)
            .iter()
            .map(|edge| edge.target_handle.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Column-mode closure from one column of the anchor.
    ///
    /// Starts from the anchor's edges leaving `column` and follows, from
    /// each reached `(node, column)`, the edges leaving that same column.
    /// Each reached target column is marked for removal. A node fed through
    /// more than one distinct target handle is reached but not walked
    /// further: its other inputs may still need the subtree.
    pub fn column_descendants(&self, anchor: &str, column: &str) -> Descendants {
        let mut result = Descendants::default();
        result.mark(anchor, column);

        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut queue: VecDeque<(String, String)> = VecDeque::new();
        visited.insert((anchor.to_string(), column.to_lowercase()));
        queue.push_back((anchor.to_string(), column.to_string()));

        while let Some((current, current_column)) = queue.pop_front() {
            for edge in self.outgoing(&current) {
                let leaves_column = edge
                    .source_column()
                    .is_some_and(|c| c.eq_ignore_ascii_case(&current_column));
                if !leaves_column {
                    continue;
                }

                let target = edge.target_node_id.as_str();
                result.reach(anchor, target);

                let Some(target_column) = edge.target_column() else {
                    continue;
                };
                result.mark(target, target_column);

                if self.distinct_inbound_handles(target) > 1 {
                    continue;
                }

                let key = (target.to_string(), target_column.to_lowercase());
                if visited.insert(key) {
                    queue.push_back((target.to_string(), target_column.to_string()));
                }
            }
        }

        result
    }

    /// Table-mode closure: every node reachable over outgoing edges.
    ///
    /// Table edges all arrive at the single `{id}__target` handle, so the
    /// multi-input cut-off of the column walk never applies here.
    pub fn table_descendants(&self, anchor: &str) -> Vec<String> {
        let Some(&start) = self.index.get(anchor) else {
            return Vec::new();
        };

        let mut result = Vec::new();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for edge_ref in self.graph.edges_directed(current, Direction::Outgoing) {
                let neighbor = edge_ref.target();
                if visited.insert(neighbor) {
                    result.push(self.graph[neighbor].to_string());
                    queue.push_back(neighbor);
                }
            }
        }

        result
    }

    /// Layer of every node: the longest path from a node with no inputs.
    ///
    /// Falls back to BFS levels when the graph has a cycle.
    pub fn ranks(&self) -> HashMap<&'a str, usize> {
        let mut ranks: HashMap<NodeIndex, usize> = HashMap::new();

        match toposort(&self.graph, None) {
            Ok(order) => {
                for idx in order {
                    let rank = ranks.get(&idx).copied().unwrap_or(0);
                    ranks.entry(idx).or_insert(rank);
                    for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                        let entry = ranks.entry(neighbor).or_insert(0);
                        *entry = (*entry).max(rank + 1);
                    }
                }
            }
            Err(cycle) => {
                tracing::debug!("lineage has a cycle through node {:?}", cycle.node_id());
                self.bfs_ranks(&mut ranks);
            }
        }

        ranks
            .into_iter()
            .map(|(idx, rank)| (self.graph[idx], rank))
            .collect()
    }

    fn bfs_ranks(&self, ranks: &mut HashMap<NodeIndex, usize>) {
        let mut queue: VecDeque<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        for &root in &queue {
            ranks.insert(root, 0);
        }

        // Every node sits on a cycle: start from the first one.
        if queue.is_empty() {
            if let Some(first) = self.graph.node_indices().next() {
                ranks.insert(first, 0);
                queue.push_back(first);
            }
        }

        loop {
            while let Some(current) = queue.pop_front() {
                let rank = ranks.get(&current).copied().unwrap_or(0);
                for neighbor in self.graph.neighbors_directed(current, Direction::Outgoing) {
                    if !ranks.contains_key(&neighbor) {
                        ranks.insert(neighbor, rank + 1);
                        queue.push_back(neighbor);
                    }
                }
            }

            // Components reachable only through a cycle.
            match self
                .graph
                .node_indices()
                .find(|idx| !ranks.contains_key(idx))
            {
                Some(next) => {
                    ranks.insert(next, 0);
                    queue.push_back(next);
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colline_core::LineageNode;

    fn chain() -> (GraphSnapshot, [String; 3]) {
        let a = LineageNode::table("a", "s").with_columns(["x", "y"]);
        let b = LineageNode::table("b", "s").with_columns(["x", "y"]);
        let c = LineageNode::table("c", "s").with_columns(["x"]);
        let ids = [a.id.clone(), b.id.clone(), c.id.clone()];
        let edges = vec![
            LineageEdge::column(&ids[0], "x", &ids[1], "x"),
            LineageEdge::column(&ids[1], "x", &ids[2], "x"),
            LineageEdge::column(&ids[0], "y", &ids[1], "y"),
        ];
        (GraphSnapshot::new(vec![a, b, c], edges), ids)
    }

    #[test]
    fn test_inbound_handles() {
        let (snapshot, [a, b, c]) = chain();
        let topology = Topology::new(&snapshot);
        assert_eq!(topology.distinct_inbound_handles(&a), 0);
        assert_eq!(topology.distinct_inbound_handles(&b), 2);
        assert_eq!(topology.distinct_inbound_handles(&c), 1);
    }

    #[test]
    fn test_column_descendants_stop_at_multi_input_node() {
        let (snapshot, [a, b, c]) = chain();
        let topology = Topology::new(&snapshot);

        let descendants = topology.column_descendants(&a, "x");
        assert_eq!(descendants.nodes, vec![b.clone()]);
        assert!(descendants.is_marked(&a, Some("x")));
        assert!(descendants.is_marked(&b, Some("X")));
        assert!(!descendants.is_marked(&b, Some("y")));
        assert!(!descendants.is_marked(&c, Some("x")));
    }

    #[test]
    fn test_column_descendants_follow_single_input_chain() {
        let (mut snapshot, [a, b, c]) = chain();
        // drop the y edge so b has a single input
        snapshot.edges.pop();
        let topology = Topology::new(&snapshot);

        let descendants = topology.column_descendants(&a, "x");
        assert_eq!(descendants.nodes, vec![b, c.clone()]);
        assert!(descendants.is_marked(&c, Some("x")));
    }

    #[test]
    fn test_closures_terminate_on_cycles() {
        let a = LineageNode::table("a", "s").with_columns(["x"]);
        let b = LineageNode::table("b", "s").with_columns(["x"]);
        let edges = vec![
            LineageEdge::column(&a.id, "x", &b.id, "x"),
            LineageEdge::column(&b.id, "x", &a.id, "x"),
        ];
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        let snapshot = GraphSnapshot::new(vec![a, b], edges);
        let topology = Topology::new(&snapshot);

        assert_eq!(topology.column_descendants(&a_id, "x").nodes, vec![b_id.clone()]);
        assert_eq!(topology.table_descendants(&a_id), vec![b_id]);

        let ranks = topology.ranks();
        assert_eq!(ranks.len(), 2);
    }

    #[test]
    fn test_ranks_use_longest_path() {
        let (snapshot, [a, b, c]) = chain();
        let mut snapshot = snapshot;
        snapshot.edges.push(LineageEdge::table(&a, &c));
        let topology = Topology::new(&snapshot);

        let ranks = topology.ranks();
        assert_eq!(ranks[a.as_str()], 0);
        assert_eq!(ranks[b.as_str()], 1);
        assert_eq!(ranks[c.as_str()], 2);
    }
}
