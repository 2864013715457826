//! Core types for worker pipelines and orchestration runs.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;
use crate::store::StoreError;
use crate::task::Task;

/// Why a worker pipeline stopped before reaching `Done`.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The per-task budget ran out.
    #[error("Timed out")]
    Timeout,

    /// Anything else that went wrong while collecting.
    #[error("{0}")]
    Runtime(String),

    /// The task document could not be written. Fatal to the run.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Errors that abort an orchestration run.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StoreError),

    /// A worker panicked and its task document could not be recovered.
    #[error("Worker failed: {0}")]
    Join(String),
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Try the browser collector before web search.
    pub use_tier_one: bool,

    /// Per-task budget; the orchestrator default when `None`.
    pub time_budget: Option<Duration>,
}

impl RunOptions {
    pub fn with_tier_one(mut self, enabled: bool) -> Self {
        self.use_tier_one = enabled;
        self
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }
}

/// Outcome of one orchestration run.
///
/// # Invariants
/// - `tasks` and `task_paths` have the same length and order
/// - every task is in a terminal status
#[derive(Debug, Clone)]
pub struct RunResult {
    pub tasks: Vec<Task>,
    pub task_paths: Vec<PathBuf>,
    pub final_summary: String,
}
