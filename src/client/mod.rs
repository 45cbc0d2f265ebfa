//! API client for the takeoff REST surface.
//!
//! Every operation picks its backend once, from configuration: mock
//! mode routes to the injected [`MockService`] (identical response
//! shapes), otherwise the remote endpoint is called with the transport
//! retry policy. Errors from the remote path surface to the caller;
//! there is no exception-driven rerouting.

pub mod http;

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::ApiError;
use crate::mock::MockService;
use crate::models::{
    BatchStatus, BatchUploadResponse, CreateProjectRequest, OverviewStats, Project, ProjectQuery,
    ProjectsPage, StartBatchRequest,
};

pub use http::{FileUpload, MAX_RETRIES, RETRY_DELAY};

pub struct ApiClient {
    config: Config,
    mock: Arc<MockService>,
}

impl ApiClient {
    pub fn new(config: Config, mock: Arc<MockService>) -> Self {
        Self { config, mock }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn use_mock(&self) -> bool {
        self.config.mock_mode
    }

    fn base_url(&self) -> &str {
        &self.config.api_base_url
    }

    /// `GET /stats/overview`
    pub async fn overview_stats(
        &self,
        cancel: &CancellationToken,
    ) -> Result<OverviewStats, ApiError> {
        ensure_live(cancel)?;
        if self.use_mock() {
            return self.mock.overview_stats();
        }
        http::get_json(self.base_url(), "/stats/overview", cancel).await
    }

    /// `GET /projects?search=&discipline=&sort=&page=`
    pub async fn list_projects(
        &self,
        query: &ProjectQuery,
        cancel: &CancellationToken,
    ) -> Result<ProjectsPage, ApiError> {
        ensure_live(cancel)?;
        if self.use_mock() {
            return self.mock.list_projects(query);
        }
        let path = format!("/projects?{}", query.to_query_string());
        http::get_json(self.base_url(), &path, cancel).await
    }

    /// `POST /projects`
    pub async fn create_project(
        &self,
        dto: &CreateProjectRequest,
        cancel: &CancellationToken,
    ) -> Result<Project, ApiError> {
        ensure_live(cancel)?;
        if self.use_mock() {
            return self.mock.create_project(dto);
        }
        http::post_json(self.base_url(), "/projects", dto, cancel).await
    }

    /// `POST /projects/{id}/batches/uploads` (multipart, field `files`)
    pub async fn upload_batch(
        &self,
        project_id: &str,
        files: &[FileUpload],
        cancel: &CancellationToken,
    ) -> Result<BatchUploadResponse, ApiError> {
        ensure_live(cancel)?;
        if self.use_mock() {
            let names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
            return self.mock.upload_batch(project_id, &names);
        }
        let path = format!("/projects/{}/batches/uploads", project_id);
        http::upload(self.base_url(), &path, files, cancel).await
    }

    /// `POST /projects/{id}/batches/{batchId}/start`
    pub async fn start_batch(
        &self,
        project_id: &str,
        batch_id: &str,
        payload: &StartBatchRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ApiError> {
        ensure_live(cancel)?;
        if self.use_mock() {
            return self.mock.start_batch(project_id, batch_id, payload);
        }
        let path = format!("/projects/{}/batches/{}/start", project_id, batch_id);
        http::post_unit(self.base_url(), &path, payload, cancel).await
    }

    /// `GET /projects/{id}/batches/{batchId}/status`
    pub async fn batch_status(
        &self,
        project_id: &str,
        batch_id: &str,
        cancel: &CancellationToken,
    ) -> Result<BatchStatus, ApiError> {
        ensure_live(cancel)?;
        if self.use_mock() {
            return self.mock.get_batch_status(project_id, batch_id);
        }
        let path = format!("/projects/{}/batches/{}/status", project_id, batch_id);
        http::get_json(self.base_url(), &path, cancel).await
    }

    /// `GET /projects/{id}/batches/{batchId}/files/{fileId}/log`
    pub async fn file_log(
        &self,
        project_id: &str,
        batch_id: &str,
        file_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ApiError> {
        ensure_live(cancel)?;
        if self.use_mock() {
            return self.mock.get_file_log(project_id, batch_id, file_id);
        }
        let path = format!(
            "/projects/{}/batches/{}/files/{}/log",
            project_id, batch_id, file_id
        );
        http::get_text(self.base_url(), &path, cancel).await
    }

    /// `GET /projects/{id}/batches/{batchId}/report`
    pub async fn batch_report(
        &self,
        project_id: &str,
        batch_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, ApiError> {
        ensure_live(cancel)?;
        if self.use_mock() {
            return self.mock.get_batch_report(project_id, batch_id);
        }
        let path = format!("/projects/{}/batches/{}/report", project_id, batch_id);
        http::get_bytes(self.base_url(), &path, cancel).await
    }
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), ApiError> {
    if cancel.is_cancelled() {
        Err(ApiError::Cancelled)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Discipline;
    use crate::storage::Store;

    fn mock_client() -> (tempfile::TempDir, ApiClient) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("data")).unwrap();
        let mock = Arc::new(MockService::new(store));
        let config = Config {
            mock_mode: true,
            ..Config::default()
        };
        (dir, ApiClient::new(config, mock))
    }

    #[tokio::test]
    async fn test_mock_mode_serves_the_full_surface() {
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

        let files = vec![FileUpload {
            name: "planta.pdf".to_string(),
            bytes: b"%PDF".to_vec(),
        }];
        let upload = client
            .upload_batch(&project.id, &files, &cancel)
            .await
            .unwrap();
        assert_eq!(upload.files.len(), 1);

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

        let status = client
            .batch_status(&project.id, &upload.batch_id, &cancel)
            .await
            .unwrap();
        assert_eq!(status.counters.total, 1);

        let page = client
            .list_projects(&ProjectQuery::default(), &cancel)
            .await
            .unwrap();
        assert_eq!(page.total, 1);

        let stats = client.overview_stats(&cancel).await.unwrap();
        assert_eq!(stats.total_processed, 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_is_rejected_before_dispatch() {
        let (_dir, client) = mock_client();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.overview_stats(&cancel).await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }
}
