//! Direct-database backend
//!
//! The fallback when no dedicated search engine is configured: there is no
//! secondary index to maintain, so `index`/`delete` are no-ops and `search`
//! runs a substring query straight against the primary store. Trades search
//! quality for zero operational footprint.

use std::sync::Arc;

use async_trait::async_trait;

use super::IndexBackend;
use crate::errors::{IndexResult, IndexerError};
use crate::store::IssueStore;
use crate::types::{IndexMutationRecord, SearchMatch, SearchResults};

pub struct DbBackend {
    store: Arc<dyn IssueStore>,
}

impl DbBackend {
    #[must_use]
    pub fn new(store: Arc<dyn IssueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl IndexBackend for DbBackend {
    async fn init(&mut self) -> IndexResult<bool> {
        // The "index" is the primary store itself, so it always pre-exists
        // and population never runs.
        Ok(true)
    }

    async fn ping(&self) -> bool {
        self.store.ping().await
    }

    async fn index(&self, _batch: &[IndexMutationRecord]) -> IndexResult<()> {
        Ok(())
    }

    async fn delete(&self, _ids: &[i64]) -> IndexResult<()> {
        Ok(())
    }

    async fn search(
        &self,
        keyword: &str,
        repo_ids: &[i64],
        limit: usize,
        offset: usize,
    ) -> IndexResult<SearchResults> {
        let (total, ids) = self
            .store
            .search_issue_ids(keyword, repo_ids, limit, offset)
            .await
            .map_err(|err| IndexerError::SearchExecution(err.to_string()))?;
        let hits = ids
            .into_iter()
            .map(|id| SearchMatch { id, score: 0.0 })
            .collect();
        Ok(SearchResults { total, hits })
    }

    async fn close(&self) {}
}
