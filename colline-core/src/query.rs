//! Resolver request and response types.
//!
//! The lineage resolver is an external service. These types describe what
//! Colline asks it and what comes back; the HTTP encoding lives in
//! `colline-client`.

use crate::edge::LineageEdge;
use crate::node::{LineageNode, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Direction of an expansion relative to the anchor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward the tables that feed the anchor (a "reverse" lineage query).
    Upstream,
    /// Toward the tables derived from the anchor.
    Downstream,
}

impl Direction {
    /// Upstream expansion is what the resolver calls reverse lineage.
    pub fn is_reverse(&self) -> bool {
        matches!(self, Direction::Upstream)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Upstream => write!(f, "upstream"),
            Direction::Downstream => write!(f, "downstream"),
        }
    }
}

/// Display granularity of the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// One edge per table pair.
    Table,
    /// One edge per column pair.
    #[default]
    Column,
}

impl DisplayMode {
    /// Value of the resolver's `show_column` parameter.
    pub fn show_column(&self) -> bool {
        matches!(self, DisplayMode::Column)
    }

    pub fn node_kind(&self) -> NodeKind {
        match self {
            DisplayMode::Table => NodeKind::Table,
            DisplayMode::Column => NodeKind::Column,
        }
    }
}

impl std::fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayMode::Table => write!(f, "table"),
            DisplayMode::Column => write!(f, "column"),
        }
    }
}

/// How many hops the resolver should walk. Encoded on the wire as an
/// integer where `-1` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum Depth {
    Hops(u32),
    Unbounded,
}

impl Depth {
    pub const ONE: Depth = Depth::Hops(1);

    /// Depth used by an initial search when none was given: one hop in
    /// table mode, everything in column mode.
    pub fn search_default(mode: DisplayMode) -> Depth {
        match mode {
            DisplayMode::Table => Depth::ONE,
            DisplayMode::Column => Depth::Unbounded,
        }
    }

    pub fn as_param(&self) -> i64 {
        match self {
            Depth::Hops(n) => i64::from(*n),
            Depth::Unbounded => -1,
        }
    }
}

impl From<i64> for Depth {
    fn from(value: i64) -> Self {
        if value < 0 {
            Depth::Unbounded
        } else {
            Depth::Hops(u32::try_from(value).unwrap_or(u32::MAX))
        }
    }
}

impl From<Depth> for i64 {
    fn from(depth: Depth) -> Self {
        depth.as_param()
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_param())
    }
}

/// Hop policy of a per-node expand: one hop unless the "max depth" toggle
/// is on for that direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthPolicy {
    #[default]
    SingleHop,
    Unbounded,
}

impl DepthPolicy {
    pub fn depth(&self) -> Depth {
        match self {
            DepthPolicy::SingleHop => Depth::ONE,
            DepthPolicy::Unbounded => Depth::Unbounded,
        }
    }
}

/// A lineage request as the resolver understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverQuery {
    /// Table names to start from.
    pub sources: Vec<String>,
    /// Columns to trace, per table.
    pub columns: BTreeMap<String, Vec<String>>,
    pub depth: Depth,
    pub show_column: bool,
    pub reverse: bool,
}

impl ResolverQuery {
    /// Initial search from one or more tables.
    pub fn search(
        sources: Vec<String>,
        columns: BTreeMap<String, Vec<String>>,
        depth: Option<Depth>,
        mode: DisplayMode,
    ) -> Self {
        Self {
            sources,
            columns,
            depth: depth.unwrap_or_else(|| Depth::search_default(mode)),
            show_column: mode.show_column(),
            reverse: false,
        }
    }

    /// Single-table expand in one direction.
    pub fn expand(
        table_name: &str,
        column: Option<&str>,
        direction: Direction,
        mode: DisplayMode,
        policy: DepthPolicy,
    ) -> Self {
        let mut columns = BTreeMap::new();
        if let Some(column) = column {
            columns.insert(table_name.to_string(), vec![column.to_string()]);
        }
        Self {
            sources: vec![table_name.to_string()],
            columns,
            depth: policy.depth(),
            show_column: mode.show_column(),
            reverse: direction.is_reverse(),
        }
    }

    /// The table and column of a single-source query, if it is one.
    pub fn single(&self) -> Option<(&str, Option<&str>)> {
        match self.sources.as_slice() {
            [source] => {
                let columns = self.columns.get(source).map(Vec::as_slice).unwrap_or(&[]);
                match columns {
                    [] => Some((source.as_str(), None)),
                    [column] => Some((source.as_str(), Some(column.as_str()))),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

/// A piece of lineage returned by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(default)]
    pub nodes: Vec<LineageNode>,
    #[serde(default)]
    pub edges: Vec<LineageEdge>,
}

impl Fragment {
    pub fn new(nodes: Vec<LineageNode>, edges: Vec<LineageEdge>) -> Self {
        Self { nodes, edges }
    }

    /// An expansion that returns no edges has hit the end of the lineage.
    pub fn is_boundary(&self) -> bool {
        self.edges.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCatalogOption {
    Plain(String),
    Full {
        value: String,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
}

/// One entry of a catalog listing (schema, table or column).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawCatalogOption")]
pub struct CatalogOption {
    pub value: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CatalogOption {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            label: value.clone(),
            value,
            description: None,
        }
    }
}

impl From<RawCatalogOption> for CatalogOption {
    fn from(raw: RawCatalogOption) -> Self {
        match raw {
            RawCatalogOption::Plain(value) => CatalogOption::new(value),
            RawCatalogOption::Full {
                value,
                label,
                description,
            } => Self {
                label: label.unwrap_or_else(|| value.clone()),
                value,
                description: description.filter(|d| !d.is_empty()),
            },
        }
    }
}

/// Tables of a schema, grouped by their folder in the dbt project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceGroup {
    pub label: String,
    pub options: Vec<CatalogOption>,
}
