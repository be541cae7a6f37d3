//! Dispatcher configuration

use serde::{Deserialize, Serialize};

use crate::constants::workers;
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the work dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Number of concurrent workers to spawn
    pub worker_count: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            worker_count: workers::default_worker_count(),
        }
    }
}

impl DispatchConfig {
    /// Configuration with a fixed worker count
    pub fn with_worker_count(worker_count: usize) -> Self {
        Self { worker_count }
    }

    /// Validate configuration values
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_count == 0 || self.worker_count > workers::MAX_WORKER_COUNT {
            return Err(ConfigError::InvalidValue {
                field: "worker_count".to_string(),
                value: self.worker_count.to_string(),
                reason: format!("Must be between 1 and {}", workers::MAX_WORKER_COUNT),
            });
        }
        Ok(())
    }

    /// Workers actually needed for `jobs` entries
    pub fn effective_workers(&self, jobs: usize) -> usize {
        self.worker_count.min(jobs).max(1)
    }
}
