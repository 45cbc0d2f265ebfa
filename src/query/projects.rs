// Paginated project list query
use parking_lot::Mutex;
use std::sync::Arc;

use crate::client::ApiClient;
use crate::models::{ProjectQuery, ProjectsPage};

use super::{FetchState, Query};

/// Query for `GET /projects`. Changing the parameters cancels the
/// previous in-flight request before issuing the new one; debouncing of
/// free-text search is the caller's concern.
pub struct ProjectsQuery {
    query: Query<ProjectsPage>,
    client: Arc<ApiClient>,
    params: Mutex<ProjectQuery>,
}

impl ProjectsQuery {
    /// Issues the initial request immediately. Must be called within a
    /// tokio runtime.
    pub fn new(client: Arc<ApiClient>, params: ProjectQuery) -> Self {
        let this = Self {
            query: Query::new(),
            client,
            params: Mutex::new(params),
        };
        this.refetch();
        this
    }

    pub fn params(&self) -> ProjectQuery {
        self.params.lock().clone()
    }

    /// Re-issues with new parameters (search, filter, sort or page
    /// change).
    pub fn set_params(&self, params: ProjectQuery) {
        *self.params.lock() = params;
        self.refetch();
    }

    pub fn refetch(&self) {
        let client = Arc::clone(&self.client);
        let params = self.params();
        self.query
            .fetch(move |cancel| async move { client.list_projects(&params, &cancel).await });
    }

    pub fn snapshot(&self) -> FetchState<ProjectsPage> {
        self.query.snapshot()
    }
}

impl Drop for ProjectsQuery {
    fn drop(&mut self) {
        self.query.cancel();
    }
}
