//! Hard wall-clock timeout around broker searches
//!
//! The broker client may retry or poll for longer than its per-request
//! timeouts suggest. The guard runs the search on its own task and stops
//! waiting once the budget is spent; the abandoned task is detached and left
//! to finish or fail on its own.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::client::SearchClient;
use super::models::{ResultSet, SearchQuery};
use crate::constants::search;
use crate::errors::{SearchError, SearchResult};

/// Runs searches under an independent timeout
pub struct SearchGuard<C: ?Sized> {
    client: Arc<C>,
    timeout: Duration,
}

impl<C: SearchClient + ?Sized + 'static> SearchGuard<C> {
    pub fn new(client: Arc<C>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Guard with the default budget
    pub fn with_default_timeout(client: Arc<C>) -> Self {
        Self::new(client, search::DEFAULT_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Search with the configured budget
    pub async fn search(&self, query: SearchQuery, limit: Option<u32>) -> SearchResult<ResultSet> {
        self.search_with_timeout(query, limit, self.timeout).await
    }

    /// Search, giving up after `budget` of wall-clock time
    ///
    /// # Errors
    ///
    /// Returns `SearchError::Timeout` when the budget runs out, the search's
    /// own error when it fails first, and `SearchError::TaskFailed` when the
    /// search task panics.
    pub async fn search_with_timeout(
        &self,
        query: SearchQuery,
        limit: Option<u32>,
        budget: Duration,
    ) -> SearchResult<ResultSet> {
        let client = Arc::clone(&self.client);
        let dataset_id = query.dataset_id().to_string();
        let mut task = tokio::spawn(async move { client.search(&query, limit).await });

        match tokio::time::timeout(budget, &mut task).await {
            Ok(joined) => {
                debug!("Search for {} finished within {:?}", dataset_id, budget);
                joined.map_err(|e| SearchError::TaskFailed {
                    reason: e.to_string(),
                })?
            }
            Err(_) => {
                warn!(
                    "Search for {} exceeded {:?}, leaving it to finish in the background",
                    dataset_id, budget
                );
                drop(task);
                Err(SearchError::Timeout {
                    seconds: budget.as_secs(),
                })
            }
        }
    }
}
