// Overview stats query
use std::sync::Arc;

use crate::client::ApiClient;
use crate::models::OverviewStats;

use super::{FetchState, Query};

/// One-shot query for `GET /stats/overview`, issued on construction.
pub struct OverviewStatsQuery {
    query: Query<OverviewStats>,
    client: Arc<ApiClient>,
}

impl OverviewStatsQuery {
    /// Issues the initial request immediately. Must be called within a
    /// tokio runtime.
    pub fn new(client: Arc<ApiClient>) -> Self {
        let this = Self {
            query: Query::new(),
            client,
        };
        this.refetch();
        this
    }

    pub fn refetch(&self) {
        let client = Arc::clone(&self.client);
        self.query
            .fetch(move |cancel| async move { client.overview_stats(&cancel).await });
    }

    pub fn snapshot(&self) -> FetchState<OverviewStats> {
        self.query.snapshot()
    }
}

impl Drop for OverviewStatsQuery {
    fn drop(&mut self) {
        self.query.cancel();
    }
}
