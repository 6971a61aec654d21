//! Colline Core - Lineage graph data model
//!
//! This crate defines the shapes everything else in Colline works with:
//! table nodes with their open columns, column-level and table-level
//! edges, the handle naming scheme that ties edges to columns, and the
//! request/response types exchanged with the lineage resolver.
//!
//! The serialized form of nodes and edges matches what the resolver
//! returns and what the renderer consumes, so a [`Fragment`] can be
//! decoded straight off the wire and merged into a graph.
//!
//! # Example
//!
//! ```
//! use colline_core::{LineageEdge, LineageNode};
//!
//! let orders = LineageNode::table("obt_sales_order", "obt").with_columns(["week_ver"]);
//! let summary = LineageNode::table("sales_summary", "mart").with_columns(["week_ver"]);
//!
//! let edge = LineageEdge::column(&orders.id, "week_ver", &summary.id, "week_ver");
//! assert_eq!(edge.source_column(), Some("week_ver"));
//! ```

mod columns;
mod edge;
pub mod handle;
mod node;
mod query;

pub use columns::ColumnSet;
pub use edge::LineageEdge;
pub use handle::{HandleError, HandleSide};
pub use node::{
    node_id_for_table, LineageNode, Materialization, NodeData, NodeKind, Position,
    EVENT_NODE_TYPE,
};
pub use query::{
    CatalogOption, Depth, DepthPolicy, Direction, DisplayMode, Fragment, ResolverQuery,
    SourceGroup,
};
