// Polling query for an active batch
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::client::ApiClient;
use crate::models::BatchStatus;

use super::{FetchState, Query};

/// Cadence of the status poll.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Polls `GET .../batches/{batchId}/status` while enabled and a batch
/// id is present: one immediate request, then one per interval. The
/// timer and any in-flight request are cancelled when the poller is
/// reconfigured, stopped or dropped.
pub struct BatchStatusPoller {
    query: Query<BatchStatus>,
    client: Arc<ApiClient>,
    project_id: String,
    batch_id: Mutex<Option<String>>,
    poll_loop: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl BatchStatusPoller {
    pub fn new(client: Arc<ApiClient>, project_id: impl Into<String>) -> Self {
        Self {
            query: Query::new(),
            client,
            project_id: project_id.into(),
            batch_id: Mutex::new(None),
            poll_loop: Mutex::new(None),
        }
    }

    /// Reconfigures the poller. Any running loop stops first; a new one
    /// starts when `enabled` and a batch id is present. Must be called
    /// within a tokio runtime.
    pub fn set_batch(&self, batch_id: Option<String>, enabled: bool) {
        self.stop();
        *self.batch_id.lock() = batch_id.clone();
        if !enabled {
            return;
        }
        if let Some(batch_id) = batch_id {
            self.start_loop(batch_id);
        }
    }

    /// Stops the poll loop and cancels the in-flight request.
    pub fn stop(&self) {
        if let Some((token, handle)) = self.poll_loop.lock().take() {
            token.cancel();
            handle.abort();
        }
    }

    /// Single status request outside the polling cadence.
    pub fn refetch(&self) {
        let Some(batch_id) = self.batch_id.lock().clone() else {
            return;
        };
        let client = Arc::clone(&self.client);
        let project_id = self.project_id.clone();
        self.query.fetch_with(None, true, move |cancel| async move {
            client.batch_status(&project_id, &batch_id, &cancel).await
        });
    }

    pub fn snapshot(&self) -> FetchState<BatchStatus> {
        self.query.snapshot()
    }

    fn start_loop(&self, batch_id: String) {
        let token = CancellationToken::new();
        let query = self.query.clone();
        let client = Arc::clone(&self.client);
        let project_id = self.project_id.clone();

        // The initial request shows as loading; poll ticks refresh
        // quietly.
        issue(&query, Some(&token), false, &client, &project_id, &batch_id);

        let loop_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    _ = ticker.tick() => {
                        issue(&query, Some(&loop_token), true, &client, &project_id, &batch_id);
                    }
                }
            }
        });

        *self.poll_loop.lock() = Some((token, handle));
    }
}

fn issue(
    query: &Query<BatchStatus>,
    parent: Option<&CancellationToken>,
    quiet: bool,
    client: &Arc<ApiClient>,
    project_id: &str,
    batch_id: &str,
) {
    let client = Arc::clone(client);
    let project_id = project_id.to_string();
    let batch_id = batch_id.to_string();
    query.fetch_with(parent, quiet, move |cancel| async move {
        client.batch_status(&project_id, &batch_id, &cancel).await
    });
}

impl Drop for BatchStatusPoller {
    fn drop(&mut self) {
        self.stop();
        self.query.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::FileUpload;
    use crate::config::Config;
    use crate::mock::MockService;
    use crate::models::{CreateProjectRequest, Discipline, ProjectStatus, StartBatchRequest};
    use crate::storage::Store;

    fn mock_client() -> (tempfile::TempDir, Arc<ApiClient>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("data")).unwrap();
        let mock = Arc::new(MockService::new(store));
        let config = Config {
            mock_mode: true,
            ..Config::default()
        };
        (dir, Arc::new(ApiClient::new(config, mock)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_follows_a_batch_to_completion() {
        let (_dir, client) = mock_client();
        let cancel = CancellationToken::new();

        let project = client
            .create_project(
                &CreateProjectRequest {
                    name: "Pátio".to_string(),
                    code: "PI-2025".to_string(),
                    client: None,
                },
                &cancel,
            )
            .await
            .unwrap();
        let files: Vec<FileUpload> = (0..3)
            .map(|i| FileUpload {
                name: format!("planta_{}.pdf", i),
                bytes: b"%PDF".to_vec(),
            })
            .collect();
        let upload = client
            .upload_batch(&project.id, &files, &cancel)
            .await
            .unwrap();
        client
            .start_batch(
                &project.id,
                &upload.batch_id,
                &StartBatchRequest {
                    discipline: Discipline::Civil,
                    engine: "azure-di".to_string(),
                },
                &cancel,
            )
            .await
            .unwrap();

        let poller = BatchStatusPoller::new(Arc::clone(&client), project.id.clone());
        poller.set_batch(Some(upload.batch_id.clone()), true);

        // Virtual time; simulation and poll both run on it.
        tokio::time::sleep(Duration::from_secs(600)).await;

        let state = poller.snapshot();
        let status = state.data.expect("status should be polled");
        assert_eq!(status.status, ProjectStatus::Completed);
        assert_eq!(status.progress, 100);
        assert_eq!(status.counters.total, 3);
        assert!(status.counters.ok + status.counters.failed <= 3);
        assert!(state.error.is_none());

        poller.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_poller_issues_no_requests() {
        let (_dir, client) = mock_client();
        let poller = BatchStatusPoller::new(client, "prj_x");
        poller.set_batch(Some("bat_x".to_string()), false);

        tokio::time::sleep(Duration::from_secs(10)).await;

        let state = poller.snapshot();
        assert!(state.data.is_none());
        assert!(state.error.is_none());
        assert!(!state.loading);
    }
}
