//! Stratum search worker.
//!
//! A worker owns one stratum and draws untried nonces from it at random
//! until it finds a valid one, covers the stratum, runs out of budget, or is
//! told to stop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::error::WorkerError;
use crate::guess::NonceGuesser;
use crate::slot::ResultChannel;
use crate::stratum::Stratum;
use crate::tried::TriedSet;

/// Attempts between wall-clock deadline checks.
const DEADLINE_CHECK_INTERVAL: u64 = 64;

/// Worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Searching,
    Found,
    Exhausted,
    Terminated,
    Failed,
}

/// Why a worker stopped without a solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExhaustReason {
    /// Every nonce in the stratum was tried.
    StratumCovered,
    /// The search deadline passed.
    Deadline,
    /// The per-worker attempt cap was reached.
    AttemptBudget,
}

/// How a worker's search ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum WorkerOutcome {
    /// Found a valid nonce. `published` is false if another worker got
    /// there first.
    Found { nonce: u64, published: bool },
    Exhausted(ExhaustReason),
    Terminated,
    Failed(WorkerError),
}

impl WorkerOutcome {
    pub fn state(&self) -> WorkerState {
        match self {
            WorkerOutcome::Found { .. } => WorkerState::Found,
            WorkerOutcome::Exhausted(_) => WorkerState::Exhausted,
            WorkerOutcome::Terminated => WorkerState::Terminated,
            WorkerOutcome::Failed(_) => WorkerState::Failed,
        }
    }
}

/// Final account of one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub stratum: Stratum,
    pub outcome: WorkerOutcome,
    /// Distinct nonces hashed.
    pub attempts: u64,
    /// Random draws discarded as already tried.
    pub duplicate_draws: u64,
}

impl WorkerReport {
    pub fn index(&self) -> usize {
        self.stratum.index
    }

    pub(crate) fn failed(stratum: Stratum, error: WorkerError) -> Self {
        WorkerReport {
            stratum,
            outcome: WorkerOutcome::Failed(error),
            attempts: 0,
            duplicate_draws: 0,
        }
    }
}

/// Limits that end a worker's search early.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchBudget {
    pub deadline: Option<Instant>,
    pub max_attempts: Option<u64>,
    pub redraw_limit: u32,
}

/// Search state for one stratum.
pub struct Worker {
    tried: TriedSet,
    rng: ChaCha8Rng,
    budget: SearchBudget,
    attempts: u64,
}

impl Worker {
    /// Create a worker. With a seed the draw order is reproducible.
    pub fn new(stratum: Stratum, budget: SearchBudget, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(stratum.index as u64)),
            None => ChaCha8Rng::from_entropy(),
        };
        Worker {
            tried: TriedSet::new(stratum),
            rng,
            budget,
            attempts: 0,
        }
    }

    /// Search until a terminal state.
    ///
    /// `terminate` is polled before every draw. A valid nonce is offered to
    /// `results`; only the first offer across all workers is kept.
    pub fn run<G: NonceGuesser>(
        mut self,
        guesser: &G,
        results: &ResultChannel<G::Solution>,
        terminate: &AtomicBool,
    ) -> WorkerReport {
        let outcome = self.search(guesser, results, terminate);
        WorkerReport {
            stratum: *self.tried.stratum(),
            outcome,
            attempts: self.attempts,
            duplicate_draws: self.tried.duplicate_draws(),
        }
    }

    fn search<G: NonceGuesser>(
        &mut self,
        guesser: &G,
        results: &ResultChannel<G::Solution>,
        terminate: &AtomicBool,
    ) -> WorkerOutcome {
        loop {
            if terminate.load(Ordering::Relaxed) {
                return WorkerOutcome::Terminated;
            }
            if let Some(max) = self.budget.max_attempts {
                if self.attempts >= max {
                    return WorkerOutcome::Exhausted(ExhaustReason::AttemptBudget);
                }
            }
            if let Some(deadline) = self.budget.deadline {
                if self.attempts % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= deadline {
                    return WorkerOutcome::Exhausted(ExhaustReason::Deadline);
                }
            }

            let Some(nonce) = self.tried.draw(&mut self.rng, self.budget.redraw_limit) else {
                return WorkerOutcome::Exhausted(ExhaustReason::StratumCovered);
            };
            self.attempts += 1;

            let guess = match guesser.try_nonce(nonce) {
                Ok(guess) => guess,
                Err(e) => return WorkerOutcome::Failed(WorkerError::Guess(e)),
            };
            if guess.valid {
                let published = results.publish(guesser.solution(nonce, guess.hash));
                return WorkerOutcome::Found { nonce, published };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guess::{FnGuesser, Guess, GuessError};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn stratum(first: u64, last: u64) -> Stratum {
        Stratum { index: 0, first, last }
    }

    fn budget() -> SearchBudget {
        SearchBudget {
            redraw_limit: 16,
            ..SearchBudget::default()
        }
    }

    fn never_valid(_nonce: u64) -> Result<Guess, GuessError> {
        Ok(Guess { valid: false, hash: [0xFF; 32] })
    }

    #[test]
    fn test_finds_and_publishes() {
        let guesser = FnGuesser::new(|nonce| Ok(Guess { valid: nonce == 57, hash: [0u8; 32] }));
        let results = ResultChannel::new();
        let worker = Worker::new(stratum(0, 99), budget(), Some(1));

        let report = worker.run(&guesser, &results, &AtomicBool::new(false));
        assert_eq!(report.outcome.state(), WorkerState::Found);
        assert_eq!(report.outcome, WorkerOutcome::Found { nonce: 57, published: true });
        assert!(report.attempts >= 1 && report.attempts <= 100);
        assert_eq!(results.take(), Some(57));
    }

    #[test]
    fn test_late_finder_is_not_published() {
        let guesser = FnGuesser::new(|nonce| Ok(Guess { valid: nonce == 3, hash: [0u8; 32] }));
        let results = ResultChannel::new();
        results.publish(999);

        let worker = Worker::new(stratum(0, 9), budget(), None);
        let report = worker.run(&guesser, &results, &AtomicBool::new(false));
        assert_eq!(report.outcome, WorkerOutcome::Found { nonce: 3, published: false });
        assert_eq!(results.take(), Some(999));
    }

    #[test]
    fn test_exhausts_stratum_without_repeats() {
        let seen = Mutex::new(HashSet::new());
        let guesser = FnGuesser::new(|nonce| {
            assert!(seen.lock().unwrap().insert(nonce), "nonce {} evaluated twice", nonce);
            never_valid(nonce)
        });
        let results = ResultChannel::new();

        let worker = Worker::new(stratum(500, 699), budget(), Some(9));
        let report = worker.run(&guesser, &results, &AtomicBool::new(false));
        assert_eq!(report.outcome, WorkerOutcome::Exhausted(ExhaustReason::StratumCovered));
        assert_eq!(report.attempts, 200);
        assert_eq!(seen.lock().unwrap().len(), 200);
        assert_eq!(results.take(), None);
    }

    #[test]
    fn test_terminate_before_first_draw() {
        let guesser = FnGuesser::new(never_valid);
        let results = ResultChannel::new();
        let worker = Worker::new(stratum(0, 99), budget(), None);
        let report = worker.run(&guesser, &results, &AtomicBool::new(true));
        assert_eq!(report.outcome, WorkerOutcome::Terminated);
        assert_eq!(report.attempts, 0);
    }

    #[test]
    fn test_guess_error_fails_worker() {
        let guesser = FnGuesser::new(|nonce| Err(GuessError::new(nonce, "malformed template")));
        let results = ResultChannel::new();
        let worker = Worker::new(stratum(0, 99), budget(), None);
        let report = worker.run(&guesser, &results, &AtomicBool::new(false));
        assert!(matches!(report.outcome, WorkerOutcome::Failed(WorkerError::Guess(_))));
        assert_eq!(report.outcome.state(), WorkerState::Failed);
    }

    #[test]
    fn test_attempt_budget() {
        let guesser = FnGuesser::new(never_valid);
        let results = ResultChannel::new();
        let budget = SearchBudget {
            max_attempts: Some(10),
            ..budget()
        };
        let worker = Worker::new(stratum(0, 999), budget, None);
        let report = worker.run(&guesser, &results, &AtomicBool::new(false));
        assert_eq!(report.outcome, WorkerOutcome::Exhausted(ExhaustReason::AttemptBudget));
        assert_eq!(report.attempts, 10);
    }

    #[test]
    fn test_deadline() {
        let guesser = FnGuesser::new(never_valid);
        let results = ResultChannel::new();
        let budget = SearchBudget {
            deadline: Some(Instant::now() - Duration::from_millis(1)),
            ..budget()
        };
        let worker = Worker::new(stratum(0, u64::MAX), budget, None);
        let report = worker.run(&guesser, &results, &AtomicBool::new(false));
        assert_eq!(report.outcome, WorkerOutcome::Exhausted(ExhaustReason::Deadline));
        assert_eq!(report.attempts, 0);
    }

    #[test]
    fn test_seeded_workers_repeat_their_draws() {
        let run = || {
            let order = Mutex::new(Vec::new());
            let guesser = FnGuesser::new(|nonce| {
                order.lock().unwrap().push(nonce);
                never_valid(nonce)
            });
            let budget = SearchBudget {
                max_attempts: Some(20),
                ..budget()
            };
            let worker = Worker::new(stratum(0, 1_000_000), budget, Some(42));
            worker.run(&guesser, &ResultChannel::new(), &AtomicBool::new(false));
            order.into_inner().unwrap()
        };
        assert_eq!(run(), run());
    }
}
