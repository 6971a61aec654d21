//! Node placement.
//!
//! Placement needs node sizes, and only the renderer knows those once it
//! has drawn the nodes. Graph changes therefore don't lay out inline: they
//! raise a one-shot flag, and the flag is consumed when the renderer reports
//! geometry for every node.

use crate::graph::GraphSnapshot;
use crate::topology::Topology;
use colline_core::{LineageEdge, LineageNode, Position};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Direction ranks flow in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RankDir {
    /// Left to right.
    LR,
    /// Right to left.
    #[default]
    RL,
    /// Top to bottom.
    TB,
    /// Bottom to top.
    BT,
}

impl RankDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankDir::LR => "LR",
            RankDir::RL => "RL",
            RankDir::TB => "TB",
            RankDir::BT => "BT",
        }
    }

    fn is_horizontal(&self) -> bool {
        matches!(self, RankDir::LR | RankDir::RL)
    }

    fn is_reversed(&self) -> bool {
        matches!(self, RankDir::RL | RankDir::BT)
    }
}

impl std::fmt::Display for RankDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RankDir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LR" => Ok(RankDir::LR),
            "RL" => Ok(RankDir::RL),
            "TB" => Ok(RankDir::TB),
            "BT" => Ok(RankDir::BT),
            other => Err(format!("unknown rank direction '{}'", other)),
        }
    }
}

/// Measured size of a rendered node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeGeometry {
    pub width: f64,
    pub height: f64,
}

impl NodeGeometry {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Top-left corner of every node, by id.
pub type Positions = HashMap<String, Position>;

/// A placement algorithm.
pub trait LayoutEngine: Send + Sync {
    fn layout(
        &self,
        nodes: &[LineageNode],
        edges: &[LineageEdge],
        rankdir: RankDir,
        geometry: &HashMap<String, NodeGeometry>,
    ) -> Positions;
}

/// Layered placement: each node sits in the layer of its longest path from
/// a source, layers are stacked along the rank direction and nodes within a
/// layer along the other axis.
#[derive(Debug, Clone)]
pub struct LayeredLayout {
    pub rank_gap: f64,
    pub node_gap: f64,
}

impl Default for LayeredLayout {
    fn default() -> Self {
        Self {
            rank_gap: 120.0,
            node_gap: 40.0,
        }
    }
}

impl LayoutEngine for LayeredLayout {
    fn layout(
        &self,
        nodes: &[LineageNode],
        edges: &[LineageEdge],
        rankdir: RankDir,
        geometry: &HashMap<String, NodeGeometry>,
    ) -> Positions {
        let snapshot = GraphSnapshot::new(nodes.to_vec(), edges.to_vec());
        let topology = Topology::new(&snapshot);
        let ranks = topology.ranks();

        let size = |id: &str| geometry.get(id).copied().unwrap_or(NodeGeometry::new(0.0, 0.0));
        // extent along the rank axis, then across it
        let extents = |id: &str| {
            let g = size(id);
            if rankdir.is_horizontal() {
                (g.width, g.height)
            } else {
                (g.height, g.width)
            }
        };

        let max_rank = ranks.values().copied().max().unwrap_or(0);
        let step = nodes
            .iter()
            .map(|n| extents(&n.id).0)
            .fold(0.0_f64, f64::max)
            + self.rank_gap;

        let mut cursor: HashMap<usize, f64> = HashMap::new();
        let mut positions = Positions::new();

        for node in nodes {
            let rank = ranks.get(node.id.as_str()).copied().unwrap_or(0);
            let layer = if rankdir.is_reversed() {
                max_rank - rank
            } else {
                rank
            };
            let along = layer as f64 * step;

            let slot = cursor.entry(rank).or_insert(0.0);
            let across = *slot;
            *slot += extents(&node.id).1 + self.node_gap;

            let position = if rankdir.is_horizontal() {
                Position::new(along, across)
            } else {
                Position::new(across, along)
            };
            positions.insert(node.id.clone(), position);
        }

        positions
    }
}

/// The one-shot "needs layout" flag.
#[derive(Debug, Clone, Default)]
pub struct LayoutState {
    needs_layout: bool,
}

impl LayoutState {
    /// Marks the graph as changed.
    pub fn invalidate(&mut self) {
        self.needs_layout = true;
    }

    pub fn needs_layout(&self) -> bool {
        self.needs_layout
    }

    /// Clears the flag if it is set and the renderer is ready. Returns
    /// whether layout should run now.
    pub fn take_if_ready(&mut self, geometry_ready: bool) -> bool {
        if self.needs_layout && geometry_ready {
            self.needs_layout = false;
            true
        } else {
            false
        }
    }
}
