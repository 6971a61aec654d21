//! Lineage edges.
//!
//! An edge says "columns of the source table feed the target". In column
//! mode each edge connects one source column handle to one target column
//! handle; in table mode there is at most one edge per table pair, attached
//! to the table-level handles.

use crate::handle::{handle_name, source_handle, target_handle};
use serde::{Deserialize, Serialize};

/// A directed edge between two nodes of the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEdge {
    /// Unique within a snapshot.
    pub id: String,

    #[serde(rename = "source")]
    pub source_node_id: String,

    #[serde(rename = "target")]
    pub target_node_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,

    /// Survives a round trip through table mode.
    #[serde(default)]
    pub pinned: bool,
}

impl LineageEdge {
    /// Column-level edge: `source_column` on the source node feeds
    /// `target_column` on the target node.
    pub fn column(
        source_node_id: &str,
        source_column: &str,
        target_node_id: &str,
        target_column: &str,
    ) -> Self {
        Self {
            id: format!(
                "{}-{}-{}-{}",
                source_node_id, target_node_id, source_column, target_column
            ),
            source_node_id: source_node_id.to_string(),
            target_node_id: target_node_id.to_string(),
            source_handle: Some(source_handle(source_column)),
            target_handle: Some(target_handle(target_column)),
            pinned: false,
        }
    }

    /// Table-level edge. The id is derived from the endpoints, so a second
    /// edge between the same pair collapses into this one.
    pub fn table(source_node_id: &str, target_node_id: &str) -> Self {
        Self {
            id: Self::table_edge_id(source_node_id, target_node_id),
            source_node_id: source_node_id.to_string(),
            target_node_id: target_node_id.to_string(),
            source_handle: Some(source_handle(source_node_id)),
            target_handle: Some(target_handle(target_node_id)),
            pinned: false,
        }
    }

    pub fn table_edge_id(source_node_id: &str, target_node_id: &str) -> String {
        format!("{}-{}", source_node_id, target_node_id)
    }

    /// Marks the edge as pinned.
    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    /// Column the edge leaves from, recovered from the source handle.
    pub fn source_column(&self) -> Option<&str> {
        self.source_handle.as_deref().and_then(handle_name)
    }

    /// Column the edge arrives at, recovered from the target handle.
    pub fn target_column(&self) -> Option<&str> {
        self.target_handle.as_deref().and_then(handle_name)
    }

    /// True when the edge attaches to table-level handles rather than columns.
    pub fn is_table_level(&self) -> bool {
        self.source_column() == Some(self.source_node_id.as_str())
            && self.target_column() == Some(self.target_node_id.as_str())
    }

    /// True if either endpoint is `node_id`.
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }
}
