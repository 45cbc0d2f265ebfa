//! Environment-sourced configuration.

use std::env;
use std::path::PathBuf;

/// Default API prefix, matching the dashboard's dev-server proxy.
pub const DEFAULT_API_BASE_URL: &str = "/api";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL prefixed to every remote request path. Remote mode
    /// needs an absolute URL here.
    pub api_base_url: String,
    /// Serve every API call from the local mock service.
    pub mock_mode: bool,
    /// Root directory of the mock store.
    pub data_dir: PathBuf,
    /// Fixed seed for the progress simulation; unset means entropy.
    pub sim_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            // Offline/demo posture by default; flip off to hit a real
            // backend.
            mock_mode: true,
            data_dir: default_data_dir(),
            sim_seed: None,
        }
    }
}

impl Config {
    /// Reads `TAKEOFF_API_BASE_URL`, `TAKEOFF_MOCK_MODE`,
    /// `TAKEOFF_DATA_DIR` and `TAKEOFF_SIM_SEED`, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(value) = env::var("TAKEOFF_API_BASE_URL") {
            if !value.is_empty() {
                config.api_base_url = value;
            }
        }
        if let Ok(value) = env::var("TAKEOFF_MOCK_MODE") {
            config.mock_mode = parse_flag(&value);
        }
        if let Ok(value) = env::var("TAKEOFF_DATA_DIR") {
            if !value.is_empty() {
                config.data_dir = PathBuf::from(value);
            }
        }
        if let Ok(value) = env::var("TAKEOFF_SIM_SEED") {
            config.sim_seed = value.parse().ok();
        }
        config
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "on" | "yes")
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("takeoff")
        .join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url, "/api");
        assert!(config.mock_mode);
        assert!(config.sim_seed.is_none());
        assert!(config.data_dir.ends_with("takeoff/data"));
    }

    #[test]
    fn test_flag_parsing() {
        assert!(parse_flag("1"));
        assert!(parse_flag("true"));
        assert!(parse_flag(" on "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("off"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn test_from_env_overrides() {
        env::set_var("TAKEOFF_API_BASE_URL", "http://localhost:4010/api");
        env::set_var("TAKEOFF_MOCK_MODE", "0");
        env::set_var("TAKEOFF_DATA_DIR", "/tmp/takeoff-test");
        env::set_var("TAKEOFF_SIM_SEED", "42");

        let config = Config::from_env();
        assert_eq!(config.api_base_url, "http://localhost:4010/api");
        assert!(!config.mock_mode);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/takeoff-test"));
        assert_eq!(config.sim_seed, Some(42));

        env::remove_var("TAKEOFF_API_BASE_URL");
        env::remove_var("TAKEOFF_MOCK_MODE");
        env::remove_var("TAKEOFF_DATA_DIR");
        env::remove_var("TAKEOFF_SIM_SEED");
    }
}
