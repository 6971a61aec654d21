//! Colline Client - Lineage resolver over HTTP
//!
//! [`HttpResolver`] talks to the lineage API (`/lineage`, `/reverse_lineage`,
//! `/schemas`, `/sources`, `/columns`) and implements
//! [`colline_graph::LineageResolver`] so a session can expand through it.

mod client;
mod config;
mod error;
mod params;

pub use client::HttpResolver;
pub use config::{ClientConfig, ConfigError, API_URL_ENV};
pub use error::ClientError;
pub use params::{error_message, lineage_params};
