//! Query-string encoding and error bodies.

use colline_core::ResolverQuery;
use serde::Deserialize;

/// Query parameters for `GET /lineage`.
///
/// A single table with at most one column goes out as `source` / `column`,
/// the form every server version understands. Anything wider uses
/// `sources` (comma separated) and `columns` (a JSON object of table to
/// column list).
pub fn lineage_params(query: &ResolverQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::with_capacity(5);

    match query.single() {
        Some((source, column)) => {
            params.push(("source", source.to_string()));
            if let Some(column) = column {
                params.push(("column", column.to_string()));
            }
        }
        None => {
            params.push(("sources", query.sources.join(",")));
            if !query.columns.is_empty() {
                // a BTreeMap of strings always serializes
                let columns = serde_json::to_string(&query.columns).unwrap_or_default();
                params.push(("columns", columns));
            }
        }
    }

    params.push(("depth", query.depth.as_param().to_string()));
    params.push(("show_column", query.show_column.to_string()));
    if query.reverse {
        params.push(("reverse", "true".to_string()));
    }

    params
}

/// Query parameters for the legacy `GET /reverse_lineage`, which only
/// takes one table and column.
pub(crate) fn reverse_lineage_params(query: &ResolverQuery) -> Option<Vec<(&'static str, String)>> {
    let (source, column) = query.single()?;
    let mut params = vec![("source", source.to_string())];
    if let Some(column) = column {
        params.push(("column", column.to_string()));
    }
    Some(params)
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
    detail: Option<serde_json::Value>,
}

/// Extracts the server's own message from an error response body.
///
/// Understands `{"error": ..}` and FastAPI's `{"detail": ..}`; anything
/// else is returned as is, or replaced by the status line when empty.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(error) = parsed.error {
            return error;
        }
        match parsed.detail {
            Some(serde_json::Value::String(detail)) => return detail,
            Some(detail) => return detail.to_string(),
            None => {}
        }
    }

    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        body.to_string()
    }
}
