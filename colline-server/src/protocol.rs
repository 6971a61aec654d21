//! JSON-RPC 2.0 message types and method parameters.

use colline_core::{Depth, Direction, DisplayMode};
use colline_graph::{NodeGeometry, RankDir};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const NODE_NOT_FOUND: i32 = -32001;
pub const BUSY: i32 = -32002;
pub const RESOLVER_ERROR: i32 = -32003;

/// An incoming request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// The reply to one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl Response {
    pub fn success<T: Serialize>(id: Option<Value>, result: T) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self {
                jsonrpc: "2.0".to_string(),
                id,
                result: Some(value),
                error: None,
            },
            Err(e) => Self::error(id, -32603, format!("Internal error: {}", e)),
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }

    pub fn parse_error() -> Self {
        Self::error(None, PARSE_ERROR, "Parse error")
    }

    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, message)
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", method))
    }
}

/// Parameters for `search`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub sources: Vec<String>,
    /// Columns to open per source table.
    #[serde(default)]
    pub columns: BTreeMap<String, Vec<String>>,
    pub depth: Option<Depth>,
}

/// Parameters for `expand`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandParams {
    pub node_id: String,
    pub column: Option<String>,
    pub direction: Direction,
}

/// Parameters for `hide.node`, `hide.table` and `columns.available`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeParams {
    pub node_id: String,
}

/// Parameters for `hide.column`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HideColumnParams {
    pub node_id: String,
    pub column: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeParams {
    pub mode: DisplayMode,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankDirParams {
    pub rankdir: RankDir,
}

/// Parameters for `depth.set`.
#[derive(Debug, Clone, Deserialize)]
pub struct MaxDepthParams {
    pub direction: Direction,
    pub enabled: bool,
}

/// Parameters for `layout.apply`: the measured size of every rendered node.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutParams {
    pub geometry: HashMap<String, NodeGeometry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_params_default_to_null() {
        let request: Request =
            serde_json::from_str(r#"{"jsonrpc": "2.0", "id": 1, "method": "graph.snapshot"}"#)
                .unwrap();
        assert_eq!(request.method, "graph.snapshot");
        assert_eq!(request.params, Value::Null);
    }

    #[test]
    fn test_success_omits_error() {
        let response = Response::success(Some(json!(7)), json!({"ok": true}));
        let text = serde_json::to_value(&response).unwrap();
        assert_eq!(text, json!({"jsonrpc": "2.0", "id": 7, "result": {"ok": true}}));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Response::parse_error().error.unwrap().code, PARSE_ERROR);
        let response = Response::method_not_found(Some(json!(1)), "graph.delete");
        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
        assert_eq!(error.message, "Method not found: graph.delete");
    }

    #[test]
    fn test_expand_params_shape() {
        let params: ExpandParams = serde_json::from_value(json!({
            "nodeId": "42",
            "column": "week_ver",
            "direction": "upstream"
        }))
        .unwrap();
        assert_eq!(params.node_id, "42");
        assert_eq!(params.direction, Direction::Upstream);

        let params: SearchParams =
            serde_json::from_value(json!({"sources": ["obt_sales_order"], "depth": -1})).unwrap();
        assert_eq!(params.depth, Some(Depth::Unbounded));
        assert!(params.columns.is_empty());
    }
}
