//! Worker and search errors.

use serde::Serialize;
use thiserror::Error;

use crate::block::BlockError;
use crate::guess::GuessError;

/// Why a single worker stopped without finishing its search.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum WorkerError {
    /// The guesser could not evaluate a nonce.
    #[error(transparent)]
    Guess(#[from] GuessError),
    /// The worker thread panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Errors from a mining run.
#[derive(Debug, Error)]
pub enum MineError {
    /// The block template cannot be mined.
    #[error("invalid block template: {0}")]
    InvalidTemplate(#[from] BlockError),
    /// At least one worker is required.
    #[error("worker count must be at least 1")]
    NoWorkers,
    /// The nonce space cannot give every worker a nonempty stratum.
    #[error("nonce space of {space} nonces cannot be split across {workers} workers")]
    SpaceTooSmall {
        /// Nonces available.
        space: u128,
        /// Workers requested.
        workers: usize,
    },
    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// Every worker failed before any found a solution.
    #[error("all {} workers failed", .failures.len())]
    AllWorkersFailed {
        /// One entry per worker, by stratum index.
        failures: Vec<(usize, WorkerError)>,
    },
}
