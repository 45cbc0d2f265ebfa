//! Fetch/poll state containers for screen-bound data.
//!
//! A [`Query`] owns the `{data, loading, error}` triple for one data
//! need. Issuing a fetch cancels the previous in-flight request and
//! bumps a generation counter; only the newest request may write state,
//! so a stale, slower response never overwrites fresher data.

pub mod batch_status;
pub mod overview;
pub mod projects;

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

pub use batch_status::{BatchStatusPoller, POLL_INTERVAL};
pub use overview::OverviewStatsQuery;
pub use projects::ProjectsQuery;

/// Snapshot of a query's state.
#[derive(Debug, Clone)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub loading: bool,
    /// Cancellations are suppressed; only real failures land here.
    pub error: Option<Arc<ApiError>>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

/// Async state container. Cheap to clone; all clones share state.
/// Requests must be issued from within a tokio runtime.
pub struct Query<T> {
    inner: Arc<QueryInner<T>>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct QueryInner<T> {
    state: Mutex<FetchState<T>>,
    generation: AtomicU64,
    active: Mutex<Option<CancellationToken>>,
}

impl<T: Clone + Send + 'static> Query<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QueryInner {
                state: Mutex::new(FetchState::default()),
                generation: AtomicU64::new(0),
                active: Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> FetchState<T> {
        self.inner.state.lock().clone()
    }

    /// Issues a request, cancelling any in-flight one. `loading` is set
    /// until settlement.
    pub fn fetch<F, Fut>(&self, load: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        self.fetch_with(None, false, load);
    }

    /// Like [`Query::fetch`] but with an optional parent token (the
    /// request dies with it) and a quiet mode that leaves `loading`
    /// untouched, used by polling ticks.
    pub(crate) fn fetch_with<F, Fut>(&self, parent: Option<&CancellationToken>, quiet: bool, load: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let token = match parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };

        let generation = {
            let mut active = self.inner.active.lock();
            if let Some(previous) = active.take() {
                previous.cancel();
            }
            *active = Some(token.clone());
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        {
            let mut state = self.inner.state.lock();
            if !quiet {
                state.loading = true;
            }
            state.error = None;
        }

        let inner = Arc::clone(&self.inner);
        let future = load(token);
        tokio::spawn(async move {
            let result = future.await;
            inner.apply(generation, result);
        });
    }

    /// Cancels the in-flight request, if any. State keeps its last
    /// settled value.
    pub fn cancel(&self) {
        if let Some(token) = self.inner.active.lock().take() {
            token.cancel();
        }
    }
}

impl<T: Clone + Send + 'static> Default for Query<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueryInner<T> {
    fn apply(&self, generation: u64, result: Result<T, ApiError>) {
        // A newer request owns the state now; drop this settlement.
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let mut state = self.state.lock();
        match result {
            Ok(data) => {
                state.data = Some(data);
                state.error = None;
                state.loading = false;
            }
            Err(ApiError::Cancelled) => {
                state.loading = false;
            }
            Err(err) => {
                state.error = Some(Arc::new(err));
                state.loading = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Resolves with `value` after `delay`, or `Cancelled` if the token
    /// fires first.
    fn delayed(
        value: u32,
        delay: Duration,
    ) -> impl FnOnce(CancellationToken) -> std::pin::Pin<Box<dyn Future<Output = Result<u32, ApiError>> + Send>>
    {
        move |token| {
            Box::pin(async move {
                tokio::select! {
                    _ = token.cancelled() => Err(ApiError::Cancelled),
                    _ = tokio::time::sleep(delay) => Ok(value),
                }
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_request_wins_over_a_slower_one() {
        let query: Query<u32> = Query::new();

        query.fetch(delayed(1, Duration::from_millis(500)));
        tokio::task::yield_now().await;
        query.fetch(delayed(2, Duration::from_millis(50)));

        tokio::time::sleep(Duration::from_millis(600)).await;

        let state = query.snapshot();
        assert_eq!(state.data, Some(2));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_leaves_prior_data_untouched() {
        let query: Query<u32> = Query::new();

        query.fetch(delayed(1, Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(query.snapshot().data, Some(1));

        query.fetch(delayed(2, Duration::from_millis(500)));
        tokio::task::yield_now().await;
        query.cancel();
        tokio::time::sleep(Duration::from_millis(600)).await;

        let state = query.snapshot();
        assert_eq!(state.data, Some(1));
        assert!(!state.loading);
        assert!(state.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_surface_as_error_state() {
        let query: Query<u32> = Query::new();

        query.fetch(|_| async {
            Err(ApiError::Http {
                status: 500,
                message: "HTTP 500: Internal Server Error".to_string(),
            })
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let state = query.snapshot();
        assert!(state.data.is_none());
        assert!(!state.loading);
        let error = state.error.expect("error should be set");
        assert!(matches!(*error, ApiError::Http { status: 500, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loading_is_set_while_in_flight() {
        let query: Query<u32> = Query::new();
        query.fetch(delayed(1, Duration::from_millis(100)));
        assert!(query.snapshot().loading);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!query.snapshot().loading);
        assert_eq!(query.snapshot().data, Some(1));
    }
}
