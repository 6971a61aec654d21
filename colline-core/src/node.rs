//! Lineage nodes.
//!
//! A node is one table (or view, seed, ...) in the lineage graph. In column
//! mode it carries the columns currently open on it; in table mode the
//! column list is ignored for display but kept so a switch back to column
//! mode restores it.

use crate::columns::ColumnSet;
use crate::handle::{source_handle, target_handle};
use serde::{Deserialize, Deserializer, Serialize};

/// Renderer node type every resolver node is tagged with.
pub const EVENT_NODE_TYPE: &str = "eventNode";

/// Computes the node id the resolver assigns to a table.
///
/// This is a 32-bit `h * 31 + c` string hash over the table name, rendered
/// as an unsigned decimal. It is stable across requests and display modes,
/// which is what lets fragments from separate expansions land on the same
/// node.
pub fn node_id_for_table(table_name: &str) -> String {
    table_name
        .chars()
        .fold(0u32, |hash, c| hash.wrapping_mul(31).wrapping_add(c as u32))
        .to_string()
}

/// How a dbt model is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Materialization {
    Table,
    View,
    Incremental,
    Snapshot,
    Seed,
    /// Anything else the resolver reports (ephemeral, custom materializations).
    Other(String),
}

impl Materialization {
    pub fn as_str(&self) -> &str {
        match self {
            Materialization::Table => "table",
            Materialization::View => "view",
            Materialization::Incremental => "incremental",
            Materialization::Snapshot => "snapshot",
            Materialization::Seed => "seed",
            Materialization::Other(other) => other,
        }
    }
}

impl From<String> for Materialization {
    fn from(value: String) -> Self {
        match value.as_str() {
            "table" => Materialization::Table,
            "view" => Materialization::View,
            "incremental" => Materialization::Incremental,
            "snapshot" => Materialization::Snapshot,
            "seed" => Materialization::Seed,
            _ => Materialization::Other(value),
        }
    }
}

impl From<Materialization> for String {
    fn from(value: Materialization) -> Self {
        match value {
            Materialization::Other(other) => other,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Materialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a node represents under the current display mode.
///
/// Not stored on the node: it follows from the mode the graph is shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Table,
    Column,
}

/// Canvas position assigned by the layout step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_node_type() -> String {
    EVENT_NODE_TYPE.to_string()
}

/// Descriptive payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(rename = "name")]
    pub table_name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub schema: String,

    #[serde(rename = "materialized", default)]
    pub materialization: Option<Materialization>,

    /// Columns currently open on the node.
    #[serde(default, deserialize_with = "null_as_default")]
    pub columns: ColumnSet,

    /// Nothing further upstream of this node.
    #[serde(rename = "first", default)]
    pub is_source_boundary: bool,

    /// Nothing further downstream of this node.
    #[serde(rename = "last", default)]
    pub is_sink_boundary: bool,
}

/// A table in the lineage graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageNode {
    /// Unique within a snapshot; derived from the table name.
    pub id: String,

    #[serde(rename = "type", default = "default_node_type")]
    pub node_type: String,

    #[serde(default)]
    pub position: Position,

    pub data: NodeData,
}

impl LineageNode {
    /// Creates a node for a table with no open columns.
    pub fn table(table_name: impl Into<String>, schema: impl Into<String>) -> Self {
        let table_name = table_name.into();
        Self {
            id: node_id_for_table(&table_name),
            node_type: default_node_type(),
            position: Position::default(),
            data: NodeData {
                table_name,
                schema: schema.into(),
                materialization: None,
                columns: ColumnSet::new(),
                is_source_boundary: false,
                is_sink_boundary: false,
            },
        }
    }

    /// Sets the open columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.columns = columns.into_iter().collect();
        self
    }

    pub fn with_materialization(mut self, materialization: Materialization) -> Self {
        self.data.materialization = Some(materialization);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.data.table_name
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.data.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.data.columns.contains(column)
    }

    /// Table-level outgoing handle, present in both display modes.
    pub fn table_source_handle(&self) -> String {
        source_handle(&self.id)
    }

    /// Table-level incoming handle, present in both display modes.
    pub fn table_target_handle(&self) -> String {
        target_handle(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_hash() {
        assert_eq!(node_id_for_table(""), "0");
        assert_eq!(node_id_for_table("a"), "97");
        assert_eq!(node_id_for_table("ab"), "3105");
        // wraps instead of overflowing
        let long = "obt_sales_order_weekly_snapshot_with_history";
        assert_eq!(node_id_for_table(long), node_id_for_table(long));
        assert!(node_id_for_table(long).parse::<u32>().is_ok());
    }

    #[test]
    fn test_decode_resolver_node() {
        let json = r#"{
            "id": "42",
            "data": {
                "name": "obt_sales_order",
                "materialized": "incremental",
                "schema": "obt",
                "columns": ["WEEK_VER", "week_ver", "amount"],
                "first": false,
                "last": true
            },
            "position": {"x": 0, "y": 0},
            "type": "eventNode"
        }"#;

        let node: LineageNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.table_name(), "obt_sales_order");
        assert_eq!(
            node.data.materialization,
            Some(Materialization::Incremental)
        );
        assert_eq!(node.columns().len(), 2);
        assert!(!node.data.is_source_boundary);
        assert!(node.data.is_sink_boundary);
    }

    #[test]
    fn test_decode_tolerates_nulls_and_unknown_materialization() {
        let json = r#"{"id": "7", "data": {"name": "t", "schema": null,
            "materialized": "ephemeral", "columns": null}}"#;

        let node: LineageNode = serde_json::from_str(json).unwrap();
        assert_eq!(node.data.schema, "");
        assert!(node.columns().is_empty());
        assert_eq!(node.node_type, EVENT_NODE_TYPE);
        assert_eq!(
            node.data.materialization,
            Some(Materialization::Other("ephemeral".to_string()))
        );
    }

    #[test]
    fn test_encode_uses_wire_names() {
        let node = LineageNode::table("orders", "raw").with_columns(["id"]);
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["data"]["name"], "orders");
        assert_eq!(value["data"]["first"], false);
        assert_eq!(value["type"], "eventNode");
        assert_eq!(value["id"], node_id_for_table("orders"));
    }
}
