//! One user's interactive lineage view.
//!
//! [`LineageSession`] owns the graph model and routes every user action
//! (search, expand, hide, mode and direction switches, layout) through the
//! operations of this crate, installing the resulting snapshot as a whole.

use crate::boundary::{BoundaryKey, BoundaryTracker};
use crate::expander::{
    ExpandError, ExpandRequest, ExpandTicket, ExpansionResult, LineageExpander, LineageResolver,
    ResolverError,
};
use crate::graph::{GraphModel, GraphSnapshot, GraphStats};
use crate::layout::{LayoutEngine, LayoutState, NodeGeometry, RankDir};
use crate::mode::ModeTransformer;
use crate::prune::{PruneOutcome, VisibilityPruner};
use colline_core::{
    node_id_for_table, CatalogOption, Depth, DepthPolicy, Direction, DisplayMode, Fragment,
    LineageEdge, ResolverQuery,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Startup settings of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub mode: DisplayMode,
    pub rankdir: RankDir,
    /// Expand upstream without a hop limit.
    pub max_depth_upstream: bool,
    /// Expand downstream without a hop limit.
    pub max_depth_downstream: bool,
}

impl SessionConfig {
    pub fn depth_policy(&self, direction: Direction) -> DepthPolicy {
        let unbounded = match direction {
            Direction::Upstream => self.max_depth_upstream,
            Direction::Downstream => self.max_depth_downstream,
        };
        if unbounded {
            DepthPolicy::Unbounded
        } else {
            DepthPolicy::SingleHop
        }
    }
}

/// The interactive state behind one lineage canvas.
#[derive(Debug, Default)]
pub struct LineageSession {
    config: SessionConfig,
    model: GraphModel,
    expander: LineageExpander,
    layout: LayoutState,
    /// Pinned edges set aside while in table mode.
    saved_column_edges: Vec<LineageEdge>,
    /// Nodes of the searched tables.
    roots: Vec<String>,
    /// Nodes the user acted on; kept even with no open columns.
    anchors: HashSet<String>,
}

impl LineageSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.model.snapshot()
    }

    pub fn stats(&self) -> GraphStats {
        self.model.stats()
    }

    pub fn mode(&self) -> DisplayMode {
        self.config.mode
    }

    pub fn rankdir(&self) -> RankDir {
        self.config.rankdir
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// True while an expansion is in flight.
    pub fn is_loading(&self) -> bool {
        self.expander.is_loading()
    }

    pub fn needs_layout(&self) -> bool {
        self.layout.needs_layout()
    }

    pub fn boundaries(&self) -> &BoundaryTracker {
        self.expander.boundaries()
    }

    pub fn saved_column_edges(&self) -> &[LineageEdge] {
        &self.saved_column_edges
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    /// Query for an initial search. Without an explicit depth, table mode
    /// walks one hop and column mode walks everything.
    pub fn search_query(
        &self,
        sources: Vec<String>,
        columns: BTreeMap<String, Vec<String>>,
        depth: Option<Depth>,
    ) -> ResolverQuery {
        ResolverQuery::search(sources, columns, depth, self.config.mode)
    }

    /// Replaces the graph with the result of a search. Refused while an
    /// expansion is in flight.
    pub fn load_search(&mut self, sources: &[String], fragment: Fragment) -> Result<(), ExpandError> {
        if self.is_loading() {
            return Err(ExpandError::Busy);
        }
        let snapshot = GraphSnapshot::default().merged(&fragment);
        self.model.try_replace(snapshot)?;

        self.expander.reset();
        self.saved_column_edges.clear();
        self.roots = sources
            .iter()
            .map(|source| node_id_for_table(source))
            .filter(|id| self.model.current().contains_node(id))
            .collect();
        self.anchors = self.roots.iter().cloned().collect();
        self.layout.invalidate();

        info!(
            "loaded lineage of {}: {} nodes, {} edges",
            sources.join(", "),
            self.model.current().node_count(),
            self.model.current().edge_count()
        );
        Ok(())
    }

    /// Runs an initial search, replacing whatever was shown.
    pub async fn search<R>(
        &mut self,
        resolver: &R,
        sources: Vec<String>,
        columns: BTreeMap<String, Vec<String>>,
        depth: Option<Depth>,
    ) -> Result<(), ExpandError>
    where
        R: LineageResolver + ?Sized,
    {
        if self.is_loading() {
            return Err(ExpandError::Busy);
        }
        let query = self.search_query(sources, columns, depth);
        let fragment = resolver.fetch(&query).await.map_err(|err| {
            warn!("search for {} failed: {}", query.sources.join(", "), err);
            err
        })?;
        self.load_search(&query.sources, fragment)
    }

    /// Builds an expand request for a node in the current mode.
    pub fn expand_request(
        &self,
        node_id: &str,
        column: Option<&str>,
        direction: Direction,
    ) -> Result<ExpandRequest, ExpandError> {
        let node = self
            .model
            .current()
            .node(node_id)
            .ok_or_else(|| ExpandError::UnknownNode(node_id.to_string()))?;

        Ok(ExpandRequest {
            anchor_node_id: node.id.clone(),
            table_name: node.table_name().to_string(),
            column: column.map(str::to_string),
            direction,
            mode: self.config.mode,
            depth_policy: self.config.depth_policy(direction),
        })
    }

    /// Claims the loading slot. The caller fetches `ticket.query()` and
    /// passes the answer to [`complete_expand`](Self::complete_expand).
    pub fn begin_expand(&mut self, request: ExpandRequest) -> Result<ExpandTicket, ExpandError> {
        let ticket = self.expander.begin(self.model.current(), request)?;
        self.anchors.insert(ticket.request().anchor_node_id.clone());
        Ok(ticket)
    }

    pub fn complete_expand(
        &mut self,
        ticket: ExpandTicket,
        outcome: Result<Fragment, ResolverError>,
    ) -> ExpansionResult {
        let completion = self.expander.complete(self.model.current(), ticket, outcome);
        if let Some(snapshot) = completion.snapshot {
            if completion.result.expanded {
                self.layout.invalidate();
            }
            self.model.replace(snapshot);
        }
        completion.result
    }

    /// Expands from a node through a resolver.
    pub async fn expand<R>(
        &mut self,
        resolver: &R,
        request: ExpandRequest,
    ) -> Result<ExpansionResult, ExpandError>
    where
        R: LineageResolver + ?Sized,
    {
        let ticket = self.begin_expand(request)?;
        let outcome = resolver.fetch(ticket.query()).await;
        Ok(self.complete_expand(ticket, outcome))
    }

    /// Whether the "+" affordance should be offered for a handle.
    ///
    /// A boundary only hides the affordance; calling `expand` on a boundary
    /// still asks the resolver again.
    pub fn can_expand(&self, node_id: &str, column: Option<&str>, direction: Direction) -> bool {
        if self.is_loading() {
            return false;
        }
        let Some(node) = self.model.current().node(node_id) else {
            return false;
        };

        let table_boundary = match direction {
            Direction::Upstream => node.data.is_source_boundary,
            Direction::Downstream => node.data.is_sink_boundary,
        };
        let column = match self.config.mode {
            DisplayMode::Column => column,
            DisplayMode::Table => None,
        };
        let key = BoundaryKey::new(node_id, column, direction);

        !table_boundary && !self.boundaries().is_boundary(&key)
    }

    /// Removes one node. Returns the removed ids, or `None` for an unknown node.
    pub fn hide_node(&mut self, node_id: &str) -> Option<Vec<String>> {
        self.known(node_id)?;
        let outcome = VisibilityPruner::hide_node(self.model.current(), node_id);
        Some(self.install_pruned(outcome))
    }

    /// Closes a column on a node and the lineage derived from it.
    pub fn hide_column(&mut self, node_id: &str, column: &str) -> Option<Vec<String>> {
        self.known(node_id)?;
        let outcome = VisibilityPruner::hide_column(self.model.current(), node_id, column);
        Some(self.install_pruned(outcome))
    }

    /// Removes everything downstream of a node.
    pub fn hide_table(&mut self, node_id: &str) -> Option<Vec<String>> {
        self.known(node_id)?;
        let outcome = VisibilityPruner::hide_table(self.model.current(), node_id);
        Some(self.install_pruned(outcome))
    }

    fn known(&self, node_id: &str) -> Option<()> {
        self.model.current().contains_node(node_id).then_some(())
    }

    fn install_pruned(&mut self, outcome: PruneOutcome) -> Vec<String> {
        let removed = outcome.removed_nodes;
        self.expander.forget_nodes(&removed);
        for id in &removed {
            self.anchors.remove(id);
        }
        self.roots.retain(|id| !removed.contains(id));
        self.model.replace(outcome.snapshot);
        self.layout.invalidate();
        removed
    }

    /// Switches display granularity. Returns false if already in `mode`.
    ///
    /// Refused while an expansion is in flight, since its response is shaped
    /// for the mode it was requested in.
    pub fn set_mode(&mut self, mode: DisplayMode) -> Result<bool, ExpandError> {
        if self.is_loading() {
            return Err(ExpandError::Busy);
        }
        if self.config.mode == mode {
            return Ok(false);
        }

        let current = self.model.current();
        let snapshot = match mode {
            DisplayMode::Table => {
                let split = ModeTransformer::to_table_mode(&current.edges);
                self.saved_column_edges = split.saved_column_edges;
                GraphSnapshot::new(current.nodes.clone(), split.table_edges)
            }
            DisplayMode::Column => {
                let edges =
                    ModeTransformer::to_column_mode(&current.edges, &self.saved_column_edges);
                let mut restored = GraphSnapshot::new(current.nodes.clone(), edges);
                restored.retain_connected_edges();
                self.saved_column_edges.clear();
                ModeTransformer::prune_empty_nodes(&restored, &self.anchors)
            }
        };

        let removed: Vec<String> = current
            .nodes
            .iter()
            .filter(|node| !snapshot.contains_node(&node.id))
            .map(|node| node.id.clone())
            .collect();
        if !removed.is_empty() {
            debug!("mode switch dropped {} nodes with no open columns", removed.len());
            self.expander.forget_nodes(&removed);
        }

        self.model.replace(snapshot);
        self.config.mode = mode;
        self.layout.invalidate();
        info!("switched to {} mode", mode);
        Ok(true)
    }

    pub fn set_rankdir(&mut self, rankdir: RankDir) -> bool {
        if self.config.rankdir == rankdir {
            return false;
        }
        self.config.rankdir = rankdir;
        self.layout.invalidate();
        true
    }

    /// Turns the unbounded-depth toggle for a direction on or off.
    pub fn set_max_depth(&mut self, direction: Direction, enabled: bool) {
        match direction {
            Direction::Upstream => self.config.max_depth_upstream = enabled,
            Direction::Downstream => self.config.max_depth_downstream = enabled,
        }
    }

    /// Catalog columns not yet open on a node, compared case-insensitively.
    /// Picking one of them is a downstream expand on that column.
    pub fn available_columns(
        &self,
        node_id: &str,
        catalog: &[CatalogOption],
    ) -> Option<Vec<CatalogOption>> {
        let node = self.model.current().node(node_id)?;
        Some(
            catalog
                .iter()
                .filter(|option| !node.has_column(&option.value))
                .cloned()
                .collect(),
        )
    }

    /// Fetches a node's catalog columns and filters out the open ones.
    pub async fn fetch_available_columns<R>(
        &self,
        resolver: &R,
        node_id: &str,
    ) -> Result<Vec<CatalogOption>, ExpandError>
    where
        R: LineageResolver + ?Sized,
    {
        let node = self
            .model
            .current()
            .node(node_id)
            .ok_or_else(|| ExpandError::UnknownNode(node_id.to_string()))?;
        let catalog = resolver.columns(&node.data.schema, node.table_name()).await?;
        self.available_columns(node_id, &catalog)
            .ok_or_else(|| ExpandError::UnknownNode(node_id.to_string()))
    }

    /// Lays the graph out if it changed and `geometry` covers every node.
    /// Returns whether positions were updated.
    pub fn apply_layout(
        &mut self,
        engine: &dyn LayoutEngine,
        geometry: &HashMap<String, NodeGeometry>,
    ) -> bool {
        let current = self.model.current();
        let ready = current.nodes.iter().all(|node| geometry.contains_key(&node.id));
        if !self.layout.take_if_ready(ready) {
            return false;
        }

        let positions = engine.layout(&current.nodes, &current.edges, self.config.rankdir, geometry);
        let mut snapshot = current.clone();
        for node in &mut snapshot.nodes {
            if let Some(position) = positions.get(&node.id) {
                node.position = *position;
            }
        }
        self.model.replace(snapshot);
        debug!("laid out {} nodes {}", positions.len(), self.config.rankdir);
        true
    }
}
