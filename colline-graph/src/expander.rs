//! Expanding the graph from one node.
//!
//! An expansion asks the resolver for one more hop (or every hop) of lineage
//! in one direction from an anchor node, then merges what comes back. The
//! request is split in two halves around the network call:
//! [`LineageExpander::begin`] claims the single loading slot and issues a
//! ticket, [`LineageExpander::complete`] interprets the response. The graph
//! can change in between; a ticket whose anchor was hidden meanwhile is
//! discarded instead of resurrecting the node.

use crate::boundary::{BoundaryKey, BoundaryTracker, ExpansionState};
use crate::graph::{GraphSnapshot, InvariantViolation};
use async_trait::async_trait;
use colline_core::{
    CatalogOption, DepthPolicy, Direction, DisplayMode, Fragment, ResolverQuery,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// Errors returned by a lineage resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Non-success response. `message` is what the server said, verbatim.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid resolver response: {0}")]
    Decode(String),
}

/// Errors that stop an expansion before or instead of a result.
#[derive(Error, Debug)]
pub enum ExpandError {
    #[error("an expansion is already in progress")]
    Busy,

    #[error("node not found: {0}")]
    UnknownNode(String),

    #[error("column mode expansion needs a column")]
    ColumnRequired,

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("resolver returned an inconsistent graph: {0}")]
    InvalidFragment(#[from] InvariantViolation),
}

/// The external lineage service.
#[async_trait]
pub trait LineageResolver: Send + Sync {
    /// Fetches a lineage fragment.
    async fn fetch(&self, query: &ResolverQuery) -> Result<Fragment, ResolverError>;

    /// Lists the columns of a table.
    async fn columns(
        &self,
        schema: &str,
        table_name: &str,
    ) -> Result<Vec<CatalogOption>, ResolverError>;
}

/// What the user asked to expand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandRequest {
    pub anchor_node_id: String,
    pub table_name: String,
    pub column: Option<String>,
    pub direction: Direction,
    pub mode: DisplayMode,
    #[serde(default)]
    pub depth_policy: DepthPolicy,
}

impl ExpandRequest {
    /// The resolver query for this expansion. Table mode never sends a column.
    pub fn query(&self) -> ResolverQuery {
        ResolverQuery::expand(
            &self.table_name,
            self.scoped_column(),
            self.direction,
            self.mode,
            self.depth_policy,
        )
    }

    /// State-machine key: per column in column mode, whole table otherwise.
    pub fn key(&self) -> BoundaryKey {
        BoundaryKey::new(&self.anchor_node_id, self.scoped_column(), self.direction)
    }

    fn scoped_column(&self) -> Option<&str> {
        match self.mode {
            DisplayMode::Column => self.column.as_deref(),
            DisplayMode::Table => None,
        }
    }
}

/// Outcome of an expansion as reported to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionResult {
    pub expanded: bool,
    #[serde(default)]
    pub boundary: bool,
    /// The anchor was hidden while the request was in flight.
    #[serde(default)]
    pub discarded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExpansionResult {
    pub fn expanded() -> Self {
        Self {
            expanded: true,
            ..Self::default()
        }
    }

    pub fn boundary() -> Self {
        Self {
            boundary: true,
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn discarded() -> Self {
        Self {
            discarded: true,
            ..Self::default()
        }
    }
}

/// A claimed expansion, handed back to [`LineageExpander::complete`].
#[derive(Debug, Clone)]
pub struct ExpandTicket {
    id: u64,
    epoch: u64,
    hide_generation: u64,
    previous: ExpansionState,
    request: ExpandRequest,
    query: ResolverQuery,
}

impl ExpandTicket {
    pub fn request(&self) -> &ExpandRequest {
        &self.request
    }

    pub fn query(&self) -> &ResolverQuery {
        &self.query
    }
}

/// What [`LineageExpander::complete`] produced.
#[derive(Debug, Clone)]
pub struct Completion {
    pub result: ExpansionResult,
    /// Snapshot to install, if the graph changed.
    pub snapshot: Option<GraphSnapshot>,
}

impl Completion {
    fn unchanged(result: ExpansionResult) -> Self {
        Self {
            result,
            snapshot: None,
        }
    }
}

/// Expansion bookkeeping: the loading flag, boundary states and hide
/// generations used to spot stale responses.
#[derive(Debug, Default)]
pub struct LineageExpander {
    boundaries: BoundaryTracker,
    in_flight: Option<u64>,
    next_ticket: u64,
    epoch: u64,
    hide_generations: HashMap<String, u64>,
}

impl LineageExpander {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn boundaries(&self) -> &BoundaryTracker {
        &self.boundaries
    }

    /// Claims the loading slot for an expansion.
    pub fn begin(
        &mut self,
        snapshot: &GraphSnapshot,
        request: ExpandRequest,
    ) -> Result<ExpandTicket, ExpandError> {
        if self.is_loading() {
            return Err(ExpandError::Busy);
        }
        if !snapshot.contains_node(&request.anchor_node_id) {
            return Err(ExpandError::UnknownNode(request.anchor_node_id));
        }
        if request.mode == DisplayMode::Column && request.column.is_none() {
            return Err(ExpandError::ColumnRequired);
        }

        self.next_ticket += 1;
        let id = self.next_ticket;
        self.in_flight = Some(id);
        let previous = self.boundaries.start(request.key());

        Ok(ExpandTicket {
            id,
            epoch: self.epoch,
            hide_generation: self.hide_generation(&request.anchor_node_id),
            previous,
            query: request.query(),
            request,
        })
    }

    /// Interprets the resolver's answer for a ticket against the current
    /// snapshot. Always releases the loading slot.
    pub fn complete(
        &mut self,
        snapshot: &GraphSnapshot,
        ticket: ExpandTicket,
        outcome: Result<Fragment, ResolverError>,
    ) -> Completion {
        if self.in_flight == Some(ticket.id) {
            self.in_flight = None;
        }

        let request = &ticket.request;
        let key = request.key();

        if self.is_stale(&ticket, snapshot) {
            info!(
                "discarding {} expansion of '{}': graph changed while loading",
                request.direction, request.table_name
            );
            // a new search owns the tracker now
            if ticket.epoch == self.epoch {
                self.boundaries.revert(&key, ticket.previous);
            }
            return Completion::unchanged(ExpansionResult::discarded());
        }

        let fragment = match outcome {
            Ok(fragment) => fragment,
            Err(err) => {
                warn!(
                    "{} expansion of '{}' failed: {}",
                    request.direction, request.table_name, err
                );
                self.boundaries.revert(&key, ticket.previous);
                return Completion::unchanged(ExpansionResult::failed(err.to_string()));
            }
        };

        if fragment.is_boundary() {
            info!(
                "'{}' has no {} lineage{}",
                request.table_name,
                request.direction,
                key.column
                    .as_deref()
                    .map(|c| format!(" for column '{}'", c))
                    .unwrap_or_default()
            );
            self.boundaries.settle(&key, true);
            let flagged = match key.column {
                None => flag_table_boundary(snapshot, &request.anchor_node_id, request.direction),
                Some(_) => None,
            };
            return Completion {
                result: ExpansionResult::boundary(),
                snapshot: flagged,
            };
        }

        let merged = snapshot.merged(&fragment);
        if let Err(violation) = merged.validate() {
            tracing::error!("rejecting fragment for '{}': {}", request.table_name, violation);
            self.boundaries.revert(&key, ticket.previous);
            return Completion::unchanged(ExpansionResult::failed(
                ExpandError::from(violation).to_string(),
            ));
        }

        self.boundaries.settle(&key, false);
        Completion {
            result: ExpansionResult::expanded(),
            snapshot: Some(merged),
        }
    }

    /// Runs a whole expansion against a resolver.
    pub async fn expand<R>(
        &mut self,
        resolver: &R,
        snapshot: &GraphSnapshot,
        request: ExpandRequest,
    ) -> Result<Completion, ExpandError>
    where
        R: LineageResolver + ?Sized,
    {
        let ticket = self.begin(snapshot, request)?;
        let outcome = resolver.fetch(ticket.query()).await;
        Ok(self.complete(snapshot, ticket, outcome))
    }

    /// Records that nodes left the graph: their boundary states are dropped
    /// and any response still in flight for them goes stale.
    pub fn forget_nodes<'a, I>(&mut self, node_ids: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for node_id in node_ids {
            *self.hide_generations.entry(node_id.clone()).or_default() += 1;
            self.boundaries.forget_node(node_id);
        }
    }

    /// Starts over for a new search. Outstanding tickets go stale.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.boundaries.clear();
        self.hide_generations.clear();
        self.in_flight = None;
    }

    fn hide_generation(&self, node_id: &str) -> u64 {
        self.hide_generations.get(node_id).copied().unwrap_or(0)
    }

    fn is_stale(&self, ticket: &ExpandTicket, snapshot: &GraphSnapshot) -> bool {
        let anchor = &ticket.request.anchor_node_id;
        ticket.epoch != self.epoch
            || self.hide_generation(anchor) != ticket.hide_generation
            || !snapshot.contains_node(anchor)
    }
}

/// Sets the whole-table boundary flag on the anchor, if not already set.
fn flag_table_boundary(
    snapshot: &GraphSnapshot,
    node_id: &str,
    direction: Direction,
) -> Option<GraphSnapshot> {
    let mut updated = snapshot.clone();
    let node = updated.nodes.iter_mut().find(|node| node.id == node_id)?;
    let flag = match direction {
        Direction::Upstream => &mut node.data.is_source_boundary,
        Direction::Downstream => &mut node.data.is_sink_boundary,
    };
    if *flag {
        return None;
    }
    *flag = true;
    Some(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedResolver;
    use colline_core::{Depth, LineageEdge, LineageNode};

    fn graph() -> (GraphSnapshot, String) {
        let node = LineageNode::table("obt_sales_order", "obt").with_columns(["week_ver"]);
        let id = node.id.clone();
        (GraphSnapshot::new(vec![node], vec![]), id)
    }

    fn request(anchor: &str, direction: Direction) -> ExpandRequest {
        ExpandRequest {
            anchor_node_id: anchor.to_string(),
            table_name: "obt_sales_order".to_string(),
            column: Some("week_ver".to_string()),
            direction,
            mode: DisplayMode::Column,
            depth_policy: DepthPolicy::SingleHop,
        }
    }

    fn upstream_fragment(anchor: &str) -> Fragment {
        let source = LineageNode::table("stg_orders", "stg").with_columns(["week_ver"]);
        let edge = LineageEdge::column(&source.id, "week_ver", anchor, "week_ver");
        let anchor_node = LineageNode::table("obt_sales_order", "obt").with_columns(["week_ver"]);
        Fragment::new(vec![anchor_node, source], vec![edge])
    }

    #[tokio::test]
    async fn test_expand_merges_fragment() {
        let (snapshot, anchor) = graph();
        let resolver = ScriptedResolver::new(vec![Ok(upstream_fragment(&anchor))]);
        let mut expander = LineageExpander::new();

        let completion = expander
            .expand(&resolver, &snapshot, request(&anchor, Direction::Upstream))
            .await
            .unwrap();

        assert_eq!(completion.result, ExpansionResult::expanded());
        let merged = completion.snapshot.unwrap();
        assert_eq!(merged.node_count(), 2);
        assert_eq!(merged.edge_count(), 1);
        assert!(!expander.is_loading());

        let queries = resolver.queries();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].reverse);
        assert_eq!(queries[0].depth, Depth::ONE);
        assert!(queries[0].show_column);
    }

    #[tokio::test]
    async fn test_empty_response_marks_column_boundary() {
        let (snapshot, anchor) = graph();
        let resolver = ScriptedResolver::new(vec![Ok(Fragment::default())]);
        let mut expander = LineageExpander::new();

        let completion = expander
            .expand(&resolver, &snapshot, request(&anchor, Direction::Upstream))
            .await
            .unwrap();

        assert_eq!(completion.result, ExpansionResult::boundary());
        assert!(completion.snapshot.is_none());
        let key = BoundaryKey::new(&anchor, Some("week_ver"), Direction::Upstream);
        assert!(expander.boundaries().is_boundary(&key));
        let downstream = BoundaryKey::new(&anchor, Some("week_ver"), Direction::Downstream);
        assert!(!expander.boundaries().is_boundary(&downstream));
    }

    #[tokio::test]
    async fn test_empty_response_flags_table_in_table_mode() {
        let (snapshot, anchor) = graph();
        let resolver = ScriptedResolver::new(vec![Ok(Fragment::default())]);
        let mut expander = LineageExpander::new();
        let mut req = request(&anchor, Direction::Downstream);
        req.mode = DisplayMode::Table;
        req.column = None;

        let completion = expander.expand(&resolver, &snapshot, req).await.unwrap();
        let flagged = completion.snapshot.unwrap();
        assert!(flagged.nodes[0].data.is_sink_boundary);
        assert!(!flagged.nodes[0].data.is_source_boundary);
    }

    #[tokio::test]
    async fn test_server_error_is_surfaced_verbatim() {
        let (snapshot, anchor) = graph();
        let resolver = ScriptedResolver::new(vec![Err(ResolverError::Server {
            status: 400,
            message: "Column week_ver not found".to_string(),
        })]);
        let mut expander = LineageExpander::new();

        let completion = expander
            .expand(&resolver, &snapshot, request(&anchor, Direction::Upstream))
            .await
            .unwrap();

        assert_eq!(
            completion.result,
            ExpansionResult::failed("Column week_ver not found")
        );
        assert!(completion.snapshot.is_none());
        let key = BoundaryKey::new(&anchor, Some("week_ver"), Direction::Upstream);
        assert_eq!(expander.boundaries().state(&key), ExpansionState::Unknown);
    }

    #[test]
    fn test_second_begin_is_busy() {
        let (snapshot, anchor) = graph();
        let mut expander = LineageExpander::new();

        let ticket = expander
            .begin(&snapshot, request(&anchor, Direction::Upstream))
            .unwrap();
        assert!(expander.is_loading());
        assert!(matches!(
            expander.begin(&snapshot, request(&anchor, Direction::Downstream)),
            Err(ExpandError::Busy)
        ));

        expander.complete(&snapshot, ticket, Ok(Fragment::default()));
        assert!(!expander.is_loading());
    }

    #[test]
    fn test_late_response_for_hidden_anchor_is_discarded() {
        let (snapshot, anchor) = graph();
        let mut expander = LineageExpander::new();
        let ticket = expander
            .begin(&snapshot, request(&anchor, Direction::Upstream))
            .unwrap();

        expander.forget_nodes([&anchor]);
        let completion = expander.complete(&snapshot, ticket, Ok(upstream_fragment(&anchor)));

        assert_eq!(completion.result, ExpansionResult::discarded());
        assert!(completion.snapshot.is_none());
        assert!(!expander.is_loading());
    }

    #[test]
    fn test_begin_rejects_unknown_anchor_and_missing_column() {
        let (snapshot, anchor) = graph();
        let mut expander = LineageExpander::new();

        assert!(matches!(
            expander.begin(&snapshot, request("404", Direction::Upstream)),
            Err(ExpandError::UnknownNode(id)) if id == "404"
        ));

        let mut req = request(&anchor, Direction::Upstream);
        req.column = None;
        assert!(matches!(
            expander.begin(&snapshot, req),
            Err(ExpandError::ColumnRequired)
        ));
        assert!(!expander.is_loading());
    }

    #[test]
    fn test_response_from_before_reset_keeps_new_state() {
        let (snapshot, anchor) = graph();
        let mut expander = LineageExpander::new();
        let old = expander
            .begin(&snapshot, request(&anchor, Direction::Upstream))
            .unwrap();

        expander.reset();
        let current = expander
            .begin(&snapshot, request(&anchor, Direction::Upstream))
            .unwrap();
        let key = BoundaryKey::new(&anchor, Some("week_ver"), Direction::Upstream);

        let completion = expander.complete(&snapshot, old, Ok(upstream_fragment(&anchor)));
        assert_eq!(completion.result, ExpansionResult::discarded());
        assert_eq!(expander.boundaries().state(&key), ExpansionState::Expanding);
        assert!(expander.is_loading());

        let completion = expander.complete(&snapshot, current, Ok(Fragment::default()));
        assert_eq!(completion.result, ExpansionResult::boundary());
        assert!(expander.boundaries().is_boundary(&key));
        assert!(!expander.is_loading());
    }

    #[test]
    fn test_table_mode_query_sends_no_column() {
        let (_, anchor) = graph();
        let mut req = request(&anchor, Direction::Downstream);
        req.mode = DisplayMode::Table;

        let query = req.query();
        assert!(query.columns.is_empty());
        assert!(!query.show_column);
        assert_eq!(query.single(), Some(("obt_sales_order", None)));
        assert_eq!(req.key(), BoundaryKey::new(&anchor, None, Direction::Downstream));
    }

    #[test]
    fn test_dangling_fragment_is_rejected() {
        let (snapshot, anchor) = graph();
        let mut expander = LineageExpander::new();
        let ticket = expander
            .begin(&snapshot, request(&anchor, Direction::Downstream))
            .unwrap();

        let bad = Fragment::new(vec![], vec![LineageEdge::table(&anchor, "missing")]);
        let completion = expander.complete(&snapshot, ticket, Ok(bad));
        assert!(completion.result.error.is_some());
        assert!(completion.snapshot.is_none());
    }
}
