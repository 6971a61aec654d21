//! Colline Graph - The incremental lineage engine
//!
//! This crate keeps the lineage graph a user is exploring and implements
//! every way it changes: merging resolver fragments, expanding from a node,
//! hiding nodes and columns, and switching between column and table display.
//!
//! Every operation is a pure function from one [`GraphSnapshot`] to the next;
//! [`GraphModel`] swaps snapshots as a whole, so readers never see a graph
//! halfway through an update. [`LineageSession`] ties the pieces together
//! for one interactive view.

mod boundary;
mod expander;
mod graph;
mod layout;
mod merge;
mod mode;
mod prune;
mod session;
mod topology;

#[cfg(test)]
mod testing;

pub use boundary::{BoundaryKey, BoundaryTracker, ExpansionState};
pub use expander::{
    Completion, ExpandError, ExpandRequest, ExpandTicket, ExpansionResult, LineageExpander,
    LineageResolver, ResolverError,
};
pub use graph::{GraphModel, GraphSnapshot, GraphStats, InvariantViolation};
pub use layout::{LayeredLayout, LayoutEngine, LayoutState, NodeGeometry, Positions, RankDir};
pub use merge::{merge_edges, merge_nodes};
pub use mode::{ModeTransformer, TableModeEdges};
pub use prune::{PruneOutcome, VisibilityPruner};
pub use session::{LineageSession, SessionConfig};
pub use topology::{Descendants, Topology};
