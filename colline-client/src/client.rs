//! HTTP resolver.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::params::{error_message, lineage_params, reverse_lineage_params};
use async_trait::async_trait;
use colline_core::{CatalogOption, Fragment, ResolverQuery, SourceGroup};
use colline_graph::{LineageResolver, ResolverError};
use std::time::Duration;
use tracing::debug;

/// The lineage API over HTTP.
#[derive(Clone)]
pub struct HttpResolver {
    client: reqwest::Client,
    base_url: String,
    legacy_reverse: bool,
}

impl HttpResolver {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            legacy_reverse: config.legacy_reverse,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches a lineage fragment.
    pub async fn lineage(&self, query: &ResolverQuery) -> Result<Fragment, ClientError> {
        if query.reverse && self.legacy_reverse {
            if let Some(params) = reverse_lineage_params(query) {
                return self.get_json("/reverse_lineage", &params).await;
            }
        }
        self.get_json("/lineage", &lineage_params(query)).await
    }

    /// Lists the schemas of the dbt project.
    pub async fn schemas(&self) -> Result<Vec<CatalogOption>, ClientError> {
        let no_params: [(&str, &str); 0] = [];
        self.get_json("/schemas", &no_params).await
    }

    /// Lists the tables of a schema, grouped by folder.
    pub async fn sources(&self, schema: &str) -> Result<Vec<SourceGroup>, ClientError> {
        self.get_json("/sources", &[("schema", schema)]).await
    }

    /// Lists the columns of a table.
    pub async fn columns(
        &self,
        schema: &str,
        table_name: &str,
    ) -> Result<Vec<CatalogOption>, ClientError> {
        self.get_json("/columns", &[("schema", schema), ("source", table_name)])
            .await
    }

    async fn get_json<T, Q>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);
        let response = self.client.get(url).query(query).send().await?;
        self.parse_response(response).await
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            Ok(serde_json::from_str(&text)?)
        } else {
            Err(ClientError::Server {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &text),
            })
        }
    }
}

#[async_trait]
impl LineageResolver for HttpResolver {
    async fn fetch(&self, query: &ResolverQuery) -> Result<Fragment, ResolverError> {
        self.lineage(query).await.map_err(ResolverError::from)
    }

    async fn columns(
        &self,
        schema: &str,
        table_name: &str,
    ) -> Result<Vec<CatalogOption>, ResolverError> {
        HttpResolver::columns(self, schema, table_name)
            .await
            .map_err(ResolverError::from)
    }
}
