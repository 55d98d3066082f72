//! Command-line driver for the Zimcoin parallel miner.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zim_miner_core::{
    expected_attempts, format_attempts, BlockTemplate, Coordinator, MinerConfig, NonceSpace,
};

#[derive(Debug, Parser)]
#[command(name = "zim-miner", version)]
#[command(about = "Mine a Zimcoin block with parallel stratified nonce search", long_about = None)]
struct Cli {
    /// JSON miner config; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Proof-of-work difficulty
    #[arg(short, long, default_value_t = 1000)]
    difficulty: u128,

    /// Previous block id (32 bytes hex)
    #[arg(long, default_value_t = "00".repeat(32))]
    previous: String,

    /// Miner public key hash (20 bytes hex)
    #[arg(long, default_value_t = "00".repeat(20))]
    miner: String,

    /// Transaction id to include (32 bytes hex), repeatable
    #[arg(long = "txid")]
    txids: Vec<String>,

    /// Block height
    #[arg(long, default_value_t = 0)]
    height: u64,

    /// Block timestamp, defaults to now
    #[arg(long)]
    timestamp: Option<u64>,

    /// Lowest nonce to search
    #[arg(long)]
    min_nonce: Option<u64>,

    /// Highest nonce to search
    #[arg(long)]
    max_nonce: Option<u64>,

    /// Seed for reproducible nonce draws
    #[arg(long)]
    seed: Option<u64>,

    /// Stop searching after this many milliseconds
    #[arg(long)]
    time_budget_ms: Option<u64>,
}

impl Cli {
    fn miner_config(&self) -> Result<MinerConfig> {
        let mut config = match &self.config {
            Some(path) => MinerConfig::from_json_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => MinerConfig::default(),
        };
        if let Some(workers) = self.workers {
            config = config.with_workers(workers);
        }
        if self.min_nonce.is_some() || self.max_nonce.is_some() {
            let current = config.nonce_space;
            config = config.with_nonce_space(NonceSpace::new(
                self.min_nonce.unwrap_or(current.first),
                self.max_nonce.unwrap_or(current.last),
            ));
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(budget) = self.time_budget_ms {
            config = config.with_time_budget(Duration::from_millis(budget));
        }
        Ok(config)
    }

    fn template(&self) -> Result<BlockTemplate> {
        let timestamp = match self.timestamp {
            Some(ts) => ts,
            None => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let template = BlockTemplate::from_hex(
            &self.previous,
            self.height,
            &self.miner,
            &self.txids,
            timestamp,
            self.difficulty,
        )?;
        Ok(template)
    }
}

fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.miner_config()?;
    let template = cli.template()?;

    info!(
        workers = config.workers,
        difficulty = template.difficulty,
        height = template.height,
        expected_attempts = %format_attempts(expected_attempts(template.difficulty)),
        "mining block"
    );

    let outcome = Coordinator::new(config).mine(template)?;
    let attempts = format_attempts(outcome.report.total_attempts() as f64);
    if !outcome.report.stragglers.is_empty() {
        warn!(stragglers = ?outcome.report.stragglers, "some workers were still running at exit");
    }

    match outcome.solution {
        Some(block) => {
            info!(
                nonce = block.nonce,
                block_id = %block.block_id_hex(),
                attempts = %attempts,
                "block mined"
            );
            println!("{}", serde_json::to_string_pretty(&block)?);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            warn!(attempts = %attempts, "no solution found");
            Ok(ExitCode::FAILURE)
        }
    }
}
