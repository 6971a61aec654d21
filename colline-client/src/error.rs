//! Client errors.

use crate::config::ConfigError;
use colline_graph::ResolverError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The API answered with a non-success status. `message` is its own
    /// error text.
    #[error("{message}")]
    Server { status: u16, message: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<ClientError> for ResolverError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Server { status, message } => ResolverError::Server { status, message },
            ClientError::Http(e) if e.is_decode() => ResolverError::Decode(e.to_string()),
            ClientError::Serde(e) => ResolverError::Decode(e.to_string()),
            other => ResolverError::Transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_passes_through() {
        let err = ClientError::Server {
            status: 400,
            message: "Column not found".to_string(),
        };
        assert_eq!(err.to_string(), "Column not found");
        assert_eq!(
            ResolverError::from(err),
            ResolverError::Server {
                status: 400,
                message: "Column not found".to_string()
            }
        );
    }

    #[test]
    fn test_decode_errors_map_to_decode() {
        let err: ClientError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(ResolverError::from(err), ResolverError::Decode(_)));
    }
}
