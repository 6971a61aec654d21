//! Expansion state per node, column and direction.
//!
//! Whether the "+" affordance is shown for a handle depends on what the
//! last expansion through it found. Only the expander moves a key between
//! states; everyone else reads.

use colline_core::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where an expansion key stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionState {
    /// Never expanded.
    #[default]
    Unknown,
    /// A request is in flight.
    Expanding,
    /// The resolver reported nothing further in this direction.
    Boundary,
    /// The last expansion returned lineage.
    Expandable,
}

/// One expandable handle: a whole table (`column == None`, table mode) or
/// one of its columns. Column names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundaryKey {
    pub node_id: String,
    pub column: Option<String>,
    pub direction: Direction,
}

impl BoundaryKey {
    pub fn new(node_id: impl Into<String>, column: Option<&str>, direction: Direction) -> Self {
        Self {
            node_id: node_id.into(),
            column: column.map(str::to_lowercase),
            direction,
        }
    }
}

/// State machine over every key that has been expanded at least once.
#[derive(Debug, Clone, Default)]
pub struct BoundaryTracker {
    states: HashMap<BoundaryKey, ExpansionState>,
}

impl BoundaryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state; untouched keys are `Unknown`.
    pub fn state(&self, key: &BoundaryKey) -> ExpansionState {
        self.states.get(key).copied().unwrap_or_default()
    }

    pub fn is_boundary(&self, key: &BoundaryKey) -> bool {
        self.state(key) == ExpansionState::Boundary
    }

    /// Moves a key to `Expanding` and returns the state it had.
    pub(crate) fn start(&mut self, key: BoundaryKey) -> ExpansionState {
        self.states
            .insert(key, ExpansionState::Expanding)
            .unwrap_or_default()
    }

    /// Settles an `Expanding` key.
    pub(crate) fn settle(&mut self, key: &BoundaryKey, boundary: bool) {
        let state = if boundary {
            ExpansionState::Boundary
        } else {
            ExpansionState::Expandable
        };
        if let Some(current) = self.states.get_mut(key) {
            *current = state;
        }
    }

    /// Puts a key back after a failed or discarded request.
    pub(crate) fn revert(&mut self, key: &BoundaryKey, previous: ExpansionState) {
        match previous {
            ExpansionState::Unknown => {
                self.states.remove(key);
            }
            state => {
                if let Some(current) = self.states.get_mut(key) {
                    *current = state;
                }
            }
        }
    }

    /// Forgets every key of a node that left the graph.
    pub(crate) fn forget_node(&mut self, node_id: &str) {
        self.states.retain(|key, _| key.node_id != node_id);
    }

    pub(crate) fn clear(&mut self) {
        self.states.clear();
    }

    /// Keys currently marked as boundaries, sorted.
    pub fn boundaries(&self) -> Vec<&BoundaryKey> {
        let mut keys: Vec<&BoundaryKey> = self
            .states
            .iter()
            .filter(|(_, state)| **state == ExpansionState::Boundary)
            .map(|(key, _)| key)
            .collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut tracker = BoundaryTracker::new();
        let key = BoundaryKey::new("1", Some("WEEK_VER"), Direction::Upstream);

        assert_eq!(tracker.state(&key), ExpansionState::Unknown);
        assert_eq!(tracker.start(key.clone()), ExpansionState::Unknown);
        assert_eq!(tracker.state(&key), ExpansionState::Expanding);

        tracker.settle(&key, true);
        let lower = BoundaryKey::new("1", Some("week_ver"), Direction::Upstream);
        assert!(tracker.is_boundary(&lower));
        assert!(!tracker.is_boundary(&BoundaryKey::new(
            "1",
            Some("week_ver"),
            Direction::Downstream
        )));
        assert_eq!(tracker.boundaries(), vec![&lower]);
    }

    #[test]
    fn test_revert_restores_previous_state() {
        let mut tracker = BoundaryTracker::new();
        let key = BoundaryKey::new("1", None, Direction::Downstream);

        let previous = tracker.start(key.clone());
        tracker.revert(&key, previous);
        assert_eq!(tracker.state(&key), ExpansionState::Unknown);

        tracker.start(key.clone());
        tracker.settle(&key, false);
        let previous = tracker.start(key.clone());
        tracker.revert(&key, previous);
        assert_eq!(tracker.state(&key), ExpansionState::Expandable);
    }

    #[test]
    fn test_forget_node() {
        let mut tracker = BoundaryTracker::new();
        let key = BoundaryKey::new("1", Some("a"), Direction::Upstream);
        tracker.start(key.clone());
        tracker.settle(&key, true);

        tracker.forget_node("1");
        assert_eq!(tracker.state(&key), ExpansionState::Unknown);
    }
}
