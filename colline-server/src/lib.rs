//! Colline Server - WebSocket bridge for lineage renderers
//!
//! A renderer connects over WebSocket and drives one shared
//! [`LineageSession`] with JSON-RPC 2.0 requests:
//!
//! | method              | params                                   |
//! |---------------------|------------------------------------------|
//! | `graph.snapshot`    | none                                     |
//! | `search`            | `sources`, `columns?`, `depth?`          |
//! | `expand`            | `nodeId`, `column?`, `direction`         |
//! | `hide.node`         | `nodeId`                                 |
//! | `hide.column`       | `nodeId`, `column`                       |
//! | `hide.table`        | `nodeId`                                 |
//! | `mode.set`          | `mode` (`table` / `column`)              |
//! | `rankdir.set`       | `rankdir` (`LR`, `RL`, `TB`, `BT`)       |
//! | `depth.set`         | `direction`, `enabled`                   |
//! | `columns.available` | `nodeId`                                 |
//! | `layout.apply`      | `geometry` (node id to width and height) |
//!
//! Every change is pushed to all clients as a `GraphUpdate` carrying the
//! whole graph.

use colline_graph::LineageSession;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session state shared across connections.
pub type SharedSession = Arc<RwLock<LineageSession>>;

mod broadcast;
mod handlers;
pub mod protocol;
mod server;

pub use broadcast::{BroadcastMessage, ExpandStatusPayload, GraphUpdatePayload};
pub use handlers::AppState;
pub use protocol::{Request, Response, RpcError};
pub use server::{process_message, ServerConfig, ServerError, SessionServer, DEFAULT_PORT};
