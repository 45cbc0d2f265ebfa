//! Takeoff data layer: project CRUD, PDF batch upload, processing
//! status polling and report download for a takeoff dashboard, backed
//! by either a real REST API or the built-in mock service.

pub mod client;
pub mod config;
pub mod error;
pub mod mock;
pub mod models;
pub mod query;
pub mod storage;

use std::sync::Arc;

pub use client::{ApiClient, FileUpload};
pub use config::Config;
pub use error::ApiError;
pub use mock::MockService;
pub use query::{BatchStatusPoller, FetchState, OverviewStatsQuery, ProjectsQuery, Query};
pub use storage::{Store, StoreError};

/// Application-wide wiring, constructed once at startup and handed to
/// consumers.
pub struct AppContext {
    pub config: Config,
    pub mock: Arc<MockService>,
    pub client: Arc<ApiClient>,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self, ApiError> {
        let store = Store::open(&config.data_dir)?;
        let mock = Arc::new(MockService::with_timing(
            store,
            mock::SIM_TICK,
            config.sim_seed,
        ));
        if config.mock_mode {
            mock.seed_if_empty()?;
        }
        let client = Arc::new(ApiClient::new(config.clone(), Arc::clone(&mock)));
        Ok(Self {
            config,
            mock,
            client,
        })
    }

    /// Context wired from the process environment.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::new(Config::from_env())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_seeds_the_mock_store_in_mock_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("data"),
            ..Config::default()
        };
        let context = AppContext::new(config).unwrap();

        let projects = context.mock.store().load_projects().unwrap();
        assert_eq!(projects.len(), 3);
    }

    #[test]
    fn test_context_skips_seeding_without_mock_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: dir.path().join("data"),
            mock_mode: false,
            ..Config::default()
        };
        let context = AppContext::new(config).unwrap();

        let projects = context.mock.store().load_projects().unwrap();
        assert!(projects.is_empty());
    }
}
