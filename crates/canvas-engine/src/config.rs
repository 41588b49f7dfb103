//! Scheduler configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::defaults;
use crate::error::{EngineError, Result};

/// Which nodes a run clears before executing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// The seeds and everything downstream of them
    #[default]
    Downstream,
    /// Only the seeds themselves
    TargetOnly,
    /// Nothing; completed nodes are reused as-is
    Keep,
}

/// Configuration for a scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum node executions in flight at once
    pub max_concurrency: usize,
    /// Reset policy used when a run does not specify one
    pub default_reset: ResetPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::MAX_CONCURRENCY,
            default_reset: ResetPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    ///
    /// A missing file yields the default configuration.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !fs::try_exists(path).await? {
            log::debug!("No engine config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await?;
        let config = Self::from_json_str(&contents)?;
        log::info!("Loaded engine config from {:?}", path);
        Ok(config)
    }

    /// Check that the configuration can drive a scheduler
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(EngineError::config("maxConcurrency must be at least 1"));
        }
        Ok(())
    }
}
