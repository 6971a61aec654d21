//! Core graph data structure.
//!
//! A [`GraphSnapshot`] is an immutable view of the lineage graph: the nodes
//! in display order and the edges between them. [`GraphModel`] owns the
//! current snapshot and swaps it out wholesale on every change, so a reader
//! holding an `Arc` never sees a half-applied update.

use colline_core::{LineageEdge, LineageNode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// A broken structural invariant in a snapshot.
///
/// These are programmer errors: merge and prune never produce them from
/// valid input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    #[error("duplicate edge id '{0}'")]
    DuplicateEdge(String),

    #[error("edge '{edge}' references missing node '{node}'")]
    DanglingEdge { edge: String, node: String },

    #[error("node '{node}' lists column '{column}' twice")]
    DuplicateColumn { node: String, column: String },
}

/// Nodes and edges of the lineage graph at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
}

impl GraphSnapshot {
    pub fn new(nodes: Vec<LineageNode>, edges: Vec<LineageEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Gets a node by id.
    pub fn node(&self, id: &str) -> Option<&LineageNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Finds the node for a table name.
    pub fn find_by_table(&self, table_name: &str) -> Option<&LineageNode> {
        self.nodes
            .iter()
            .find(|node| node.table_name().eq_ignore_ascii_case(table_name))
    }

    /// Edges leaving `node_id`.
    pub fn edges_from<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a LineageEdge> {
        self.edges
            .iter()
            .filter(move |edge| edge.source_node_id == node_id)
    }

    /// Edges arriving at `node_id`.
    pub fn edges_into<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a LineageEdge> {
        self.edges
            .iter()
            .filter(move |edge| edge.target_node_id == node_id)
    }

    /// True if `node_id` is an endpoint of any pinned edge.
    pub fn is_pinned_anchor(&self, node_id: &str) -> bool {
        self.edges
            .iter()
            .any(|edge| edge.pinned && edge.touches(node_id))
    }

    /// Drops every edge whose endpoints are not both present.
    pub fn retain_connected_edges(&mut self) -> usize {
        let ids: HashSet<&str> = self.nodes.iter().map(|node| node.id.as_str()).collect();
        let before = self.edges.len();
        self.edges.retain(|edge| {
            ids.contains(edge.source_node_id.as_str()) && ids.contains(edge.target_node_id.as_str())
        });
        before - self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Checks id and column uniqueness and that every edge endpoint exists.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                return Err(InvariantViolation::DuplicateNode(node.id.clone()));
            }
            let columns = node.columns();
            for (index, column) in columns.iter().enumerate() {
                if columns.position(column) != Some(index) {
                    return Err(InvariantViolation::DuplicateColumn {
                        node: node.id.clone(),
                        column: column.to_string(),
                    });
                }
            }
        }

        let mut edge_ids = HashSet::new();
        for edge in &self.edges {
            if !edge_ids.insert(edge.id.as_str()) {
                return Err(InvariantViolation::DuplicateEdge(edge.id.clone()));
            }
            for endpoint in [&edge.source_node_id, &edge.target_node_id] {
                if !node_ids.contains(endpoint.as_str()) {
                    return Err(InvariantViolation::DanglingEdge {
                        edge: edge.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Graph statistics for the info endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub pinned_edges: usize,
    pub revision: u64,
}

/// Owner of the current snapshot.
///
/// All mutation goes through [`replace`](GraphModel::replace); operations
/// compute a new snapshot from the old one and hand it back here.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    current: Arc<GraphSnapshot>,
    revision: u64,
}

impl GraphModel {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot. Cheap to clone and safe to hold across updates.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        Arc::clone(&self.current)
    }

    /// Borrow of the current snapshot.
    pub fn current(&self) -> &GraphSnapshot {
        &self.current
    }

    /// Installs a snapshot produced by one of the graph operations.
    ///
    /// Panics in debug builds if the snapshot breaks an invariant.
    pub fn replace(&mut self, snapshot: GraphSnapshot) {
        debug_assert_eq!(snapshot.validate(), Ok(()), "invalid graph snapshot");
        self.install(snapshot);
    }

    /// Installs a snapshot built from external input, rejecting it if it
    /// breaks an invariant. The current snapshot is left untouched on error.
    pub fn try_replace(&mut self, snapshot: GraphSnapshot) -> Result<(), InvariantViolation> {
        snapshot.validate()?;
        self.install(snapshot);
        Ok(())
    }

    /// Drops everything, as a fresh search does.
    pub fn clear(&mut self) {
        self.install(GraphSnapshot::default());
    }

    /// Number of snapshots installed so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            node_count: self.current.node_count(),
            edge_count: self.current.edge_count(),
            pinned_edges: self.current.edges.iter().filter(|e| e.pinned).count(),
            revision: self.revision,
        }
    }

    fn install(&mut self, snapshot: GraphSnapshot) {
        self.current = Arc::new(snapshot);
        self.revision += 1;
    }
}
