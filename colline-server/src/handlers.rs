//! Request handlers for protocol methods.
//!
//! Each handler implements one method. Handlers that change the session
//! broadcast the new graph before answering.

use crate::broadcast::{BroadcastMessage, ExpandStatusPayload, GraphUpdatePayload};
use crate::protocol::{
    ExpandParams, HideColumnParams, LayoutParams, MaxDepthParams, ModeParams, NodeParams,
    RankDirParams, Response, SearchParams, BUSY, NODE_NOT_FOUND, RESOLVER_ERROR,
};
use crate::SharedSession;
use colline_graph::{ExpandError, LayoutEngine, LineageResolver, LineageSession};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Everything a handler needs.
#[derive(Clone)]
pub struct AppState {
    pub session: SharedSession,
    pub resolver: Arc<dyn LineageResolver>,
    pub layout: Arc<dyn LayoutEngine>,
    pub updates: broadcast::Sender<BroadcastMessage>,
}

impl AppState {
    fn publish(&self, session: &LineageSession) {
        let payload = GraphUpdatePayload::from_session(session);
        // no subscribers is fine
        let _ = self.updates.send(BroadcastMessage::GraphUpdate(payload));
    }

    fn publish_status(&self, params: &ExpandParams, loading: bool) {
        let _ = self
            .updates
            .send(BroadcastMessage::ExpandStatus(ExpandStatusPayload {
                node_id: params.node_id.clone(),
                column: params.column.clone(),
                direction: params.direction,
                loading,
            }));
    }
}

fn expand_error(id: Option<Value>, err: ExpandError) -> Response {
    match err {
        ExpandError::Busy => Response::error(id, BUSY, err.to_string()),
        ExpandError::UnknownNode(node) => {
            Response::error(id, NODE_NOT_FOUND, format!("Node not found: {}", node))
        }
        ExpandError::ColumnRequired => Response::invalid_params(id, err.to_string()),
        ExpandError::Resolver(_) | ExpandError::InvalidFragment(_) => {
            Response::error(id, RESOLVER_ERROR, err.to_string())
        }
    }
}

fn node_not_found(id: Option<Value>, node_id: &str) -> Response {
    Response::error(id, NODE_NOT_FOUND, format!("Node not found: {}", node_id))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotResult {
    #[serde(flatten)]
    graph: GraphUpdatePayload,
    loading: bool,
    revision: u64,
}

/// Handles the graph.snapshot method.
pub async fn handle_snapshot(state: &AppState, id: Option<Value>) -> Response {
    let session = state.session.read().await;
    Response::success(
        id,
        SnapshotResult {
            graph: GraphUpdatePayload::from_session(&session),
            loading: session.is_loading(),
            revision: session.stats().revision,
        },
    )
}

/// Handles the search method.
///
/// The lock is held across the resolver call: a search replaces the whole
/// graph, so nothing else may run against the old one meanwhile.
pub async fn handle_search(state: &AppState, id: Option<Value>, params: SearchParams) -> Response {
    if params.sources.is_empty() {
        return Response::invalid_params(id, "sources must not be empty");
    }

    let mut session = state.session.write().await;
    match session
        .search(state.resolver.as_ref(), params.sources, params.columns, params.depth)
        .await
    {
        Ok(()) => {
            state.publish(&session);
            let stats = session.stats();
            Response::success(
                id,
                json!({ "nodeCount": stats.node_count, "edgeCount": stats.edge_count }),
            )
        }
        Err(e) => expand_error(id, e),
    }
}

/// Handles the expand method.
///
/// The session lock is released while the resolver is being asked, so
/// other requests (hides in particular) are served in the meantime.
pub async fn handle_expand(state: &AppState, id: Option<Value>, params: ExpandParams) -> Response {
    let ticket = {
        let mut session = state.session.write().await;
        let begun = session
            .expand_request(&params.node_id, params.column.as_deref(), params.direction)
            .and_then(|request| session.begin_expand(request));
        match begun {
            Ok(ticket) => ticket,
            Err(e) => return expand_error(id, e),
        }
    };
    state.publish_status(&params, true);

    debug!("expanding {} {}", params.node_id, params.direction);
    let outcome = state.resolver.fetch(ticket.query()).await;

    let result = {
        let mut session = state.session.write().await;
        let result = session.complete_expand(ticket, outcome);
        if result.expanded || result.boundary {
            state.publish(&session);
        }
        result
    };
    state.publish_status(&params, false);

    match result.error {
        Some(message) => Response::error(id, RESOLVER_ERROR, message),
        None => Response::success(id, result),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HideResult {
    removed_nodes: Vec<String>,
}

async fn hide_with<F>(state: &AppState, id: Option<Value>, node_id: &str, hide: F) -> Response
where
    F: FnOnce(&mut LineageSession) -> Option<Vec<String>>,
{
    let mut session = state.session.write().await;
    match hide(&mut *session) {
        Some(removed_nodes) => {
            state.publish(&session);
            Response::success(id, HideResult { removed_nodes })
        }
        None => node_not_found(id, node_id),
    }
}

/// Handles the hide.node method.
pub async fn handle_hide_node(state: &AppState, id: Option<Value>, params: NodeParams) -> Response {
    hide_with(state, id, &params.node_id, |s| s.hide_node(&params.node_id)).await
}

/// Handles the hide.column method.
pub async fn handle_hide_column(
    state: &AppState,
    id: Option<Value>,
    params: HideColumnParams,
) -> Response {
    hide_with(state, id, &params.node_id, |s| {
        s.hide_column(&params.node_id, &params.column)
    })
    .await
}

/// Handles the hide.table method.
pub async fn handle_hide_table(
    state: &AppState,
    id: Option<Value>,
    params: NodeParams,
) -> Response {
    hide_with(state, id, &params.node_id, |s| s.hide_table(&params.node_id)).await
}

/// Handles the mode.set method.
pub async fn handle_set_mode(state: &AppState, id: Option<Value>, params: ModeParams) -> Response {
    let mut session = state.session.write().await;
    let changed = match session.set_mode(params.mode) {
        Ok(changed) => changed,
        Err(err) => return expand_error(id, err),
    };
    if changed {
        state.publish(&session);
    }
    Response::success(id, json!({ "changed": changed, "mode": session.mode() }))
}

/// Handles the rankdir.set method.
pub async fn handle_set_rankdir(
    state: &AppState,
    id: Option<Value>,
    params: RankDirParams,
) -> Response {
    let mut session = state.session.write().await;
    let changed = session.set_rankdir(params.rankdir);
    if changed {
        state.publish(&session);
    }
    Response::success(id, json!({ "changed": changed, "rankdir": session.rankdir() }))
}

/// Handles the depth.set method.
pub async fn handle_set_max_depth(
    state: &AppState,
    id: Option<Value>,
    params: MaxDepthParams,
) -> Response {
    let mut session = state.session.write().await;
    session.set_max_depth(params.direction, params.enabled);
    Response::success(id, session.config().clone())
}

/// Handles the columns.available method.
pub async fn handle_available_columns(
    state: &AppState,
    id: Option<Value>,
    params: NodeParams,
) -> Response {
    let session = state.session.read().await;
    match session
        .fetch_available_columns(state.resolver.as_ref(), &params.node_id)
        .await
    {
        Ok(columns) => Response::success(id, columns),
        Err(e) => expand_error(id, e),
    }
}

/// Handles the layout.apply method.
pub async fn handle_apply_layout(
    state: &AppState,
    id: Option<Value>,
    params: LayoutParams,
) -> Response {
    let mut session = state.session.write().await;
    let applied = session.apply_layout(state.layout.as_ref(), &params.geometry);
    if applied {
        state.publish(&session);
    }
    Response::success(id, json!({ "applied": applied }))
}
