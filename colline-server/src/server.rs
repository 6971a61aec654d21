//! WebSocket server implementation.
//!
//! Accepts renderer connections, routes JSON-RPC requests to handlers and
//! forwards graph broadcasts to every client.

use crate::broadcast::{BroadcastMessage, GraphUpdatePayload};
use crate::handlers::{
    handle_apply_layout, handle_available_columns, handle_expand, handle_hide_column,
    handle_hide_node, handle_hide_table, handle_search, handle_set_max_depth, handle_set_mode,
    handle_set_rankdir, handle_snapshot, AppState,
};
use crate::protocol::{
    ExpandParams, HideColumnParams, LayoutParams, MaxDepthParams, ModeParams, NodeParams,
    RankDirParams, Request, Response, SearchParams,
};
use crate::SharedSession;
use colline_graph::{LayeredLayout, LayoutEngine, LineageResolver, LineageSession};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Default port of the session server.
pub const DEFAULT_PORT: u16 = 7532;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub addr: SocketAddr,
}

impl ServerConfig {
    /// Loopback only, or every interface when `headless`.
    pub fn new(port: u16, headless: bool) -> Self {
        let ip = if headless {
            Ipv4Addr::UNSPECIFIED
        } else {
            Ipv4Addr::LOCALHOST
        };
        Self {
            addr: SocketAddr::from((ip, port)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PORT, false)
    }
}

/// The Colline session server.
pub struct SessionServer {
    config: ServerConfig,
    state: AppState,
}

impl SessionServer {
    /// Creates a server around a session, using [`LayeredLayout`] for
    /// `layout.apply`.
    pub fn new(
        session: LineageSession,
        resolver: Arc<dyn LineageResolver>,
        config: ServerConfig,
    ) -> Self {
        Self::with_layout(session, resolver, Arc::new(LayeredLayout::default()), config)
    }

    pub fn with_layout(
        session: LineageSession,
        resolver: Arc<dyn LineageResolver>,
        layout: Arc<dyn LayoutEngine>,
        config: ServerConfig,
    ) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            config,
            state: AppState {
                session: Arc::new(RwLock::new(session)),
                resolver,
                layout,
                updates,
            },
        }
    }

    /// Returns a handle to the shared session.
    pub fn session(&self) -> SharedSession {
        self.state.session.clone()
    }

    /// Subscribes to the broadcasts sent to clients.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.state.updates.subscribe()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the server, accepting connections forever.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(&self.config.addr).await?;
        info!("Colline server listening on {}", self.config.addr);
        self.serve(listener).await
    }

    /// Accepts connections on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("New connection from {}", addr);
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, state).await {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Handles a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: AppState,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    info!("WebSocket connection established with {}", addr);

    let (mut write, mut read) = ws_stream.split();
    let mut updates = state.updates.subscribe();
    // Requests run concurrently so a slow expand doesn't hold up a hide.
    let (reply_tx, mut replies) = mpsc::unbounded_channel::<Response>();

    // Start every client from the current graph.
    let initial = {
        let session = state.session.read().await;
        BroadcastMessage::GraphUpdate(GraphUpdatePayload::from_session(&session))
    };
    write
        .send(Message::Text(serde_json::to_string(&initial)?))
        .await?;

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let state = state.clone();
                        let reply_tx = reply_tx.clone();
                        tokio::spawn(async move {
                            let response = process_message(&text, &state).await;
                            let _ = reply_tx.send(response);
                        });
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("Client {} disconnected", addr);
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Message error from {}: {}", addr, e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            Some(response) = replies.recv() => {
                let json = serde_json::to_string(&response)?;
                write.send(Message::Text(json)).await?;
            }

            msg = updates.recv() => {
                match msg {
                    Ok(update) => {
                        let json = serde_json::to_string(&update)?;
                        if write.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Client {} lagged by {} messages", addr, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!("Connection closed: {}", addr);
    Ok(())
}

fn parse_params<T: DeserializeOwned>(id: &Option<Value>, params: Value) -> Result<T, Response> {
    serde_json::from_value(params).map_err(|e| Response::invalid_params(id.clone(), e.to_string()))
}

/// Processes a JSON-RPC message and returns a response.
pub async fn process_message(text: &str, state: &AppState) -> Response {
    let request: Request = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(_) => return Response::parse_error(),
    };

    let id = request.id.clone();
    let method = request.method.as_str();

    debug!("Processing method: {}", method);

    match method {
        "graph.snapshot" => handle_snapshot(state, id).await,

        "search" => match parse_params::<SearchParams>(&id, request.params) {
            Ok(params) => handle_search(state, id, params).await,
            Err(response) => response,
        },

        "expand" => match parse_params::<ExpandParams>(&id, request.params) {
            Ok(params) => handle_expand(state, id, params).await,
            Err(response) => response,
        },

        "hide.node" => match parse_params::<NodeParams>(&id, request.params) {
            Ok(params) => handle_hide_node(state, id, params).await,
            Err(response) => response,
        },

        "hide.column" => match parse_params::<HideColumnParams>(&id, request.params) {
            Ok(params) => handle_hide_column(state, id, params).await,
            Err(response) => response,
        },

        "hide.table" => match parse_params::<NodeParams>(&id, request.params) {
            Ok(params) => handle_hide_table(state, id, params).await,
            Err(response) => response,
        },

        "mode.set" => match parse_params::<ModeParams>(&id, request.params) {
            Ok(params) => handle_set_mode(state, id, params).await,
            Err(response) => response,
        },

        "rankdir.set" => match parse_params::<RankDirParams>(&id, request.params) {
            Ok(params) => handle_set_rankdir(state, id, params).await,
            Err(response) => response,
        },

        "depth.set" => match parse_params::<MaxDepthParams>(&id, request.params) {
            Ok(params) => handle_set_max_depth(state, id, params).await,
            Err(response) => response,
        },

        "columns.available" => match parse_params::<NodeParams>(&id, request.params) {
            Ok(params) => handle_available_columns(state, id, params).await,
            Err(response) => response,
        },

        "layout.apply" => match parse_params::<LayoutParams>(&id, request.params) {
            Ok(params) => handle_apply_layout(state, id, params).await,
            Err(response) => response,
        },

        _ => Response::method_not_found(id, method),
    }
}
