//! Configuration for remote store operations.

use std::path::Path;
use std::time::Duration;

use catchup_client::MaximumTotalTime;
use serde::{Deserialize, Serialize};

use crate::error::{CatchupError, Result};

/// Default retry budget for one store file request: 20 minutes.
pub const DEFAULT_STORE_COPY_MAX_RETRY_TIME_PER_REQUEST: u64 = 20 * 60;

/// Configuration for [`RemoteStore`](crate::RemoteStore).
///
/// Missing fields take their defaults when loading from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatchupConfig {
    /// Seconds a single store file request may keep retrying.
    pub store_copy_max_retry_time_per_request: u64,
}

impl Default for CatchupConfig {
    fn default() -> Self {
        Self {
            store_copy_max_retry_time_per_request: DEFAULT_STORE_COPY_MAX_RETRY_TIME_PER_REQUEST,
        }
    }
}

impl CatchupConfig {
    /// Parse from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CatchupError::Config(e.to_string()))
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| CatchupError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// The per-request retry budget for store file copies.
    pub fn store_copy_budget(&self) -> MaximumTotalTime {
        MaximumTotalTime::new(Duration::from_secs(self.store_copy_max_retry_time_per_request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budget_is_twenty_minutes() {
        let config = CatchupConfig::default();
        assert_eq!(config.store_copy_budget().budget(), Duration::from_secs(1200));
    }

    #[test]
    fn test_from_json() {
        let config =
            CatchupConfig::from_json(r#"{"store_copy_max_retry_time_per_request": 30}"#).unwrap();
        assert_eq!(config.store_copy_max_retry_time_per_request, 30);
    }

    #[test]
    fn test_missing_fields_default() {
        assert_eq!(CatchupConfig::from_json("{}").unwrap(), CatchupConfig::default());
    }

    #[test]
    fn test_bad_json_is_config_error() {
        assert!(matches!(
            CatchupConfig::from_json(r#"{"store_copy_max_retry_time_per_request": "soon"}"#),
            Err(CatchupError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            CatchupConfig::load("/definitely/not/here.json"),
            Err(CatchupError::Config(_))
        ));
    }
}
