//! Parallel mining coordinator.
//!
//! Splits the nonce space into strata, runs one worker thread per stratum,
//! and waits for the first solution or for every worker to give up. Once
//! the search ends all workers are told to stop and the coordinator waits a
//! bounded grace period for them to exit.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Sender};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::block::{Block, BlockTemplate};
use crate::config::MinerConfig;
use crate::error::{MineError, WorkerError};
use crate::guess::{NonceGuesser, TemplateGuesser};
use crate::slot::ResultChannel;
use crate::stratum::Stratum;
use crate::worker::{SearchBudget, Worker, WorkerOutcome, WorkerReport};

/// Summary of a mining run.
#[derive(Debug, Clone, Serialize)]
pub struct MineReport {
    /// Reports from workers that exited within the grace period, by index.
    pub workers: Vec<WorkerReport>,
    /// Workers that had not exited when the grace period ran out.
    pub stragglers: Vec<usize>,
    /// Workers still running when the coordinator returned.
    pub live_workers: usize,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
}

impl MineReport {
    /// Total distinct nonces hashed across all reporting workers.
    pub fn total_attempts(&self) -> u64 {
        self.workers.iter().map(|w| w.attempts).sum()
    }

    /// Reports of workers that failed.
    pub fn failures(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers
            .iter()
            .filter(|w| matches!(w.outcome, WorkerOutcome::Failed(_)))
    }
}

/// The result of a mining run.
#[derive(Debug)]
pub struct MineOutcome<T> {
    /// The first solution published, if any.
    pub solution: Option<T>,
    pub report: MineReport,
}

/// State shared between the coordinator and its workers.
struct Shared<G: NonceGuesser> {
    guesser: G,
    results: ResultChannel<G::Solution>,
    terminate: AtomicBool,
    /// Workers that have not yet finished searching.
    remaining: AtomicUsize,
    /// Worker threads that have not yet exited.
    live: AtomicUsize,
}

/// Decrements the live-worker count when a worker thread exits, including
/// by unwinding.
struct LiveGuard<'a>(&'a AtomicUsize);

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Runs stratified parallel nonce searches.
#[derive(Debug, Clone, Default)]
pub struct Coordinator {
    config: MinerConfig,
}

impl Coordinator {
    pub fn new(config: MinerConfig) -> Self {
        Coordinator { config }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    /// Mine a Zimcoin block template.
    pub fn mine(&self, template: BlockTemplate) -> Result<MineOutcome<Block>, MineError> {
        let guesser = TemplateGuesser::new(template)?;
        self.mine_with(guesser)
    }

    /// Search the configured nonce space with any guesser.
    ///
    /// Returns `Ok` with no solution when every worker exhausted its
    /// stratum or budget. Returns `AllWorkersFailed` when every worker
    /// failed and none found a solution.
    pub fn mine_with<G>(&self, guesser: G) -> Result<MineOutcome<G::Solution>, MineError>
    where
        G: NonceGuesser + 'static,
    {
        let started = Instant::now();
        let strata = self.config.nonce_space.partition(self.config.workers)?;
        let worker_count = strata.len();
        let budget = SearchBudget {
            deadline: self.config.time_budget().map(|budget| started + budget),
            max_attempts: self.config.max_attempts_per_worker,
            redraw_limit: self.config.redraw_limit,
        };

        info!(
            workers = worker_count,
            first = self.config.nonce_space.first,
            last = self.config.nonce_space.last,
            "starting nonce search"
        );

        let shared = Arc::new(Shared {
            guesser,
            results: ResultChannel::new(),
            terminate: AtomicBool::new(false),
            remaining: AtomicUsize::new(worker_count),
            live: AtomicUsize::new(0),
        });
        let (ack_tx, ack_rx) = unbounded::<WorkerReport>();

        let mut handles: Vec<Option<JoinHandle<()>>> = Vec::with_capacity(worker_count);
        for stratum in &strata {
            match spawn_worker(*stratum, budget, self.config.seed, &shared, ack_tx.clone()) {
                Ok(handle) => handles.push(Some(handle)),
                Err(e) => {
                    warn!(
                        worker = stratum.index,
                        error = %e,
                        "failed to spawn worker, aborting search"
                    );
                    shared.terminate.store(true, Ordering::Release);
                    for handle in handles.into_iter().flatten() {
                        let _ = handle.join();
                    }
                    return Err(MineError::Spawn(e));
                }
            }
        }
        drop(ack_tx);

        shared.results.wait();
        shared.terminate.store(true, Ordering::Release);
        debug!("search signalled, terminating workers");

        let grace_deadline = Instant::now() + self.config.grace_period();
        let mut reports: Vec<WorkerReport> = Vec::with_capacity(worker_count);
        while reports.len() < worker_count {
            match ack_rx.recv_deadline(grace_deadline) {
                Ok(report) => {
                    if let Some(handle) = handles[report.index()].take() {
                        let _ = handle.join();
                    }
                    reports.push(report);
                }
                Err(_) => break,
            }
        }
        reports.sort_by_key(WorkerReport::index);

        let stragglers: Vec<usize> = handles
            .iter()
            .enumerate()
            .filter(|(_, handle)| handle.is_some())
            .map(|(index, _)| index)
            .collect();
        for index in &stragglers {
            warn!(worker = index, "worker did not acknowledge termination within grace period");
        }

        let solution = shared.results.take();
        let report = MineReport {
            workers: reports,
            stragglers,
            live_workers: shared.live.load(Ordering::Acquire),
            elapsed: started.elapsed(),
        };

        if solution.is_none()
            && report.stragglers.is_empty()
            && report.failures().count() == worker_count
        {
            let failures = report
                .workers
                .iter()
                .filter_map(|w| match &w.outcome {
                    WorkerOutcome::Failed(e) => Some((w.index(), e.clone())),
                    _ => None,
                })
                .collect();
            return Err(MineError::AllWorkersFailed { failures });
        }

        info!(
            found = solution.is_some(),
            attempts = report.total_attempts(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "nonce search finished"
        );

        Ok(MineOutcome { solution, report })
    }
}

fn spawn_worker<G>(
    stratum: Stratum,
    budget: SearchBudget,
    seed: Option<u64>,
    shared: &Arc<Shared<G>>,
    ack: Sender<WorkerReport>,
) -> std::io::Result<JoinHandle<()>>
where
    G: NonceGuesser + 'static,
{
    let shared = Arc::clone(shared);
    shared.live.fetch_add(1, Ordering::AcqRel);
    let spawned = thread::Builder::new()
        .name(format!("zim-miner-{}", stratum.index))
        .spawn({
            let shared = Arc::clone(&shared);
            move || {
                let report = {
                    let _live = LiveGuard(&shared.live);
                    let worker = Worker::new(stratum, budget, seed);
                    panic::catch_unwind(AssertUnwindSafe(|| {
                        worker.run(&shared.guesser, &shared.results, &shared.terminate)
                    }))
                    .unwrap_or_else(|payload| {
                        let error = WorkerError::Panicked(panic_message(&*payload));
                        WorkerReport::failed(stratum, error)
                    })
                };

                match &report.outcome {
                    WorkerOutcome::Failed(e) => warn!(
                        worker = stratum.index,
                        error = %e,
                        "worker failed, treating stratum as exhausted"
                    ),
                    outcome => debug!(
                        worker = stratum.index,
                        state = ?outcome.state(),
                        outcome = ?outcome,
                        attempts = report.attempts,
                        "worker finished"
                    ),
                }

                if shared.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    shared.results.close();
                }
                let _ = ack.send(report);
            }
        });

    if spawned.is_err() {
        shared.live.fetch_sub(1, Ordering::AcqRel);
    }
    spawned
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Mine a block template with `workers` parallel workers and default
/// settings otherwise.
pub fn mine(template: BlockTemplate, workers: usize) -> Result<Option<Block>, MineError> {
    let config = MinerConfig::default().with_workers(workers);
    Ok(Coordinator::new(config).mine(template)?.solution)
}
