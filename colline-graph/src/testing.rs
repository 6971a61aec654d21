//! In-memory resolver for tests.

use crate::expander::{LineageResolver, ResolverError};
use async_trait::async_trait;
use colline_core::{CatalogOption, Fragment, ResolverQuery};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replies with queued responses in order and records every query.
/// Once the queue runs dry it answers with an empty fragment.
#[derive(Default)]
pub struct ScriptedResolver {
    responses: Mutex<VecDeque<Result<Fragment, ResolverError>>>,
    queries: Mutex<Vec<ResolverQuery>>,
    columns: Vec<CatalogOption>,
}

impl ScriptedResolver {
    pub fn new(responses: Vec<Result<Fragment, ResolverError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| CatalogOption::new(*c)).collect();
        self
    }

    pub fn push(&self, response: Result<Fragment, ResolverError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn queries(&self) -> Vec<ResolverQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl LineageResolver for ScriptedResolver {
    async fn fetch(&self, query: &ResolverQuery) -> Result<Fragment, ResolverError> {
        self.queries.lock().unwrap().push(query.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Fragment::default()))
    }

    async fn columns(
        &self,
        _schema: &str,
        _table_name: &str,
    ) -> Result<Vec<CatalogOption>, ResolverError> {
        Ok(self.columns.clone())
    }
}
