//! Service configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::StoreScope;

/// Settings shared by the service and the CLI.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Root directory of the file-backed trust store
    pub store_root: PathBuf,
    pub scope: StoreScope,
    /// Upper bound for one store or provider call
    pub provider_timeout_ms: u64,
    pub check_certificate: bool,
    /// Store-open retries while an install holds the store
    pub busy_retries: u32,
    pub busy_backoff_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("./cadesign-store"),
            scope: StoreScope::CurrentUser,
            provider_timeout_ms: 30_000,
            check_certificate: true,
            busy_retries: 3,
            busy_backoff_ms: 50,
        }
    }
}

impl ServiceConfig {
    /// Load a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn busy_backoff(&self) -> Duration {
        Duration::from_millis(self.busy_backoff_ms)
    }
}
