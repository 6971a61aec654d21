//! Handle ids.
//!
//! Edges attach to named handles on their endpoint nodes. Column handles are
//! `{column}__source` / `{column}__target`; table handles use the node id in
//! place of the column name so a table-level edge still has somewhere to
//! attach.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the handle's name and its side.
pub const HANDLE_SEPARATOR: &str = "__";

const SOURCE_SUFFIX: &str = "source";
const TARGET_SUFFIX: &str = "target";

/// Which end of an edge a handle sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleSide {
    /// Outgoing side of a column or table.
    Source,
    /// Incoming side of a column or table.
    Target,
}

impl HandleSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleSide::Source => SOURCE_SUFFIX,
            HandleSide::Target => TARGET_SUFFIX,
        }
    }
}

impl std::fmt::Display for HandleSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("handle '{0}' has no '__' separator")]
    MissingSeparator(String),
    #[error("handle '{0}' has an empty name")]
    EmptyName(String),
    #[error("handle '{handle}' has unknown side '{side}'")]
    UnknownSide { handle: String, side: String },
}

/// Builds a handle id for `name` on the given side.
pub fn handle_id(name: &str, side: HandleSide) -> String {
    format!("{}{}{}", name, HANDLE_SEPARATOR, side.as_str())
}

/// `{name}__source`
pub fn source_handle(name: &str) -> String {
    handle_id(name, HandleSide::Source)
}

/// `{name}__target`
pub fn target_handle(name: &str) -> String {
    handle_id(name, HandleSide::Target)
}

/// Splits a handle id into its name and side.
///
/// Splits on the last separator so column names that themselves contain
/// `__` survive the round trip.
pub fn parse_handle(handle: &str) -> Result<(&str, HandleSide), HandleError> {
    let (name, side) = handle
        .rsplit_once(HANDLE_SEPARATOR)
        .ok_or_else(|| HandleError::MissingSeparator(handle.to_string()))?;

    if name.is_empty() {
        return Err(HandleError::EmptyName(handle.to_string()));
    }

    let side = match side {
        SOURCE_SUFFIX => HandleSide::Source,
        TARGET_SUFFIX => HandleSide::Target,
        other => {
            return Err(HandleError::UnknownSide {
                handle: handle.to_string(),
                side: other.to_string(),
            })
        }
    };

    Ok((name, side))
}

/// Returns the column (or node id, for table handles) a handle refers to.
pub fn handle_name(handle: &str) -> Option<&str> {
    parse_handle(handle).ok().map(|(name, _)| name)
}
