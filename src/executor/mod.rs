//! Round controllers: drive a run on every rank.
//!
//! The coordinator hands out assignments and collects results; workers follow
//! their assignments and run the timed exchanges. Matrix and bisection modes
//! differ only in how this dialogue is organised, so both sit behind
//! `RoundController`.

pub mod bisection;
pub mod matrix;

pub use bisection::BisectionController;
pub use matrix::MatrixController;

use crate::error::Result;
use crate::models::{Config, RunResults};
use crate::session::Session;
use crate::stats::{StatisticsEngine, StatsSummary};
use crate::types::{TestMode, ROOT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Settings a controller needs from the run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub mode: TestMode,
    pub retries: usize,
    pub payload_size: usize,
    pub seed: Option<u64>,
}

impl From<&Config> for ExecutionConfig {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.mode,
            retries: config.retry_count(),
            payload_size: config.payload_size,
            seed: config.seed,
        }
    }
}

/// Protocol of one test mode, run identically on every rank
#[async_trait]
pub trait RoundController: Send + Sync {
    fn mode(&self) -> TestMode;

    /// Coordinator side; returns the finished results
    async fn run_coordinator(&self, session: &mut Session) -> Result<RunResults>;

    /// Worker side
    async fn run_worker(&self, session: &mut Session) -> Result<()>;

    /// Dispatch on the session's rank. Only the coordinator gets results.
    async fn run(&self, session: &mut Session) -> Result<Option<RunResults>> {
        if session.rank() == ROOT {
            Ok(Some(self.run_coordinator(session).await?))
        } else {
            self.run_worker(session).await?;
            Ok(None)
        }
    }
}

/// Controller for the configured mode
pub fn create_controller(config: &ExecutionConfig) -> Box<dyn RoundController> {
    match config.mode {
        TestMode::Matrix => Box::new(MatrixController::new(config.retries)),
        TestMode::Bisection | TestMode::RandomBisection => {
            Box::new(BisectionController::new(config.mode, config.retries, config.seed))
        }
    }
}

/// Everything the coordinator knows once a run is over
#[derive(Debug, Clone)]
pub struct ExecutionResults {
    pub run_id: String,
    pub mode: TestMode,
    pub world_size: usize,
    pub payload_size: usize,
    pub retries: usize,
    pub results: RunResults,
    pub latency_stats: StatsSummary,
    pub throughput_stats: StatsSummary,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionResults {
    pub fn worker_count(&self) -> usize {
        self.world_size.saturating_sub(1)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// Run `controller` on this session; the coordinator returns aggregated results
pub async fn execute(
    session: &mut Session,
    controller: &dyn RoundController,
    run_id: &str,
) -> Result<Option<ExecutionResults>> {
    let started_at = Utc::now();
    let outcome = controller.run(session).await?;
    session.logger().log_phase(controller.mode().name(), started_at).await;

    let results = match outcome {
        Some(results) => results,
        None => return Ok(None),
    };
    let stats = StatisticsEngine::analyze(&results)?;
    let config = ExecutionConfig::from(session.config());

    Ok(Some(ExecutionResults {
        run_id: run_id.to_string(),
        mode: controller.mode(),
        world_size: session.world_size(),
        payload_size: config.payload_size,
        retries: config.retries,
        results,
        latency_stats: stats.latency,
        throughput_stats: stats.throughput,
        started_at,
        completed_at: Utc::now(),
    }))
}
