//! Server-to-client pushes.
//!
//! Every change to the session is pushed to all connected renderers as a
//! whole snapshot, so a client never has to replay deltas.

use colline_core::{Direction, DisplayMode, LineageEdge, LineageNode};
use colline_graph::{LineageSession, RankDir};
use serde::Serialize;

/// Messages broadcast to every connected client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum BroadcastMessage {
    /// The graph changed.
    GraphUpdate(GraphUpdatePayload),
    /// An expansion started or finished.
    ExpandStatus(ExpandStatusPayload),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphUpdatePayload {
    pub nodes: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
    pub mode: DisplayMode,
    pub rankdir: RankDir,
    /// The renderer should measure its nodes and call `layout.apply`.
    pub needs_layout: bool,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl GraphUpdatePayload {
    pub fn from_session(session: &LineageSession) -> Self {
        let snapshot = session.snapshot();
        Self {
            nodes: snapshot.nodes.clone(),
            edges: snapshot.edges.clone(),
            mode: session.mode(),
            rankdir: session.rankdir(),
            needs_layout: session.needs_layout(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandStatusPayload {
    pub node_id: String,
    pub column: Option<String>,
    pub direction: Direction,
    pub loading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use colline_graph::SessionConfig;

    #[test]
    fn test_graph_update_is_tagged() {
        let session = LineageSession::new(SessionConfig::default());
        let message = BroadcastMessage::GraphUpdate(GraphUpdatePayload::from_session(&session));
        let value = serde_json::to_value(&message).unwrap();

        assert_eq!(value["type"], "GraphUpdate");
        assert_eq!(value["payload"]["mode"], "column");
        assert_eq!(value["payload"]["rankdir"], "RL");
        assert_eq!(value["payload"]["needsLayout"], false);
        assert!(value["payload"]["timestamp"].as_i64().unwrap() > 0);
    }
}
