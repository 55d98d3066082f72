//! Miner configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stratum::NonceSpace;

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid configuration JSON.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for one mining run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Number of parallel workers, one stratum each.
    pub workers: usize,
    /// Nonce range split across the workers.
    pub nonce_space: NonceSpace,
    /// How long to wait for workers to stop after the search ends.
    pub grace_period_ms: u64,
    /// Wall-clock search budget. `None` searches until the space is covered.
    pub time_budget_ms: Option<u64>,
    /// Cap on nonces hashed by each worker.
    pub max_attempts_per_worker: Option<u64>,
    /// Duplicate random draws allowed before probing for the next untried nonce.
    pub redraw_limit: u32,
    /// Seed for reproducible draws. Worker `i` uses `seed + i`.
    pub seed: Option<u64>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            workers: 4,
            nonce_space: NonceSpace::default(),
            grace_period_ms: 1000,
            time_budget_ms: None,
            max_attempts_per_worker: None,
            redraw_limit: 64,
            seed: None,
        }
    }
}

impl MinerConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_nonce_space(mut self, nonce_space: NonceSpace) -> Self {
        self.nonce_space = nonce_space;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget_ms = Some(budget.as_millis() as u64);
        self
    }

    pub fn with_max_attempts(mut self, attempts: u64) -> Self {
        self.max_attempts_per_worker = Some(attempts);
        self
    }

    pub fn with_redraw_limit(mut self, limit: u32) -> Self {
        self.redraw_limit = limit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_ms.map(Duration::from_millis)
    }
}
