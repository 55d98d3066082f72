//! Parallel proof-of-work mining for Zimcoin blocks.
//!
//! This crate provides:
//! - Block templates, SHA256 block ids and difficulty targets
//! - A pluggable nonce guesser (the proof-of-work predicate)
//! - Stratified partitioning of the nonce space
//! - Randomized per-worker search without repeats
//! - A coordinator that runs workers in parallel, keeps the first solution
//!   and stops everyone else

pub mod block;
pub mod config;
pub mod coordinator;
pub mod difficulty;
pub mod error;
pub mod guess;
pub mod hash;
pub mod slot;
pub mod stratum;
pub mod tried;
pub mod worker;

pub use block::{Block, BlockError, BlockTemplate, MAX_TRANSACTIONS};
pub use config::{ConfigError, MinerConfig};
pub use coordinator::{mine, Coordinator, MineOutcome, MineReport};
pub use difficulty::{difficulty_to_target, expected_attempts, format_attempts, hash_meets_target};
pub use error::{MineError, WorkerError};
pub use guess::{FnGuesser, Guess, GuessError, NonceGuesser, TemplateGuesser};
pub use slot::ResultChannel;
pub use stratum::{NonceSpace, Stratum};
pub use tried::TriedSet;
pub use worker::{ExhaustReason, WorkerOutcome, WorkerReport, WorkerState};
