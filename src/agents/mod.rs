//! Agents module - research execution.
//!
//! # Components
//! - **Worker**: drives one task through the tiered collection pipeline
//! - **Orchestrator**: decomposes a prompt, fans workers out, aggregates
//!
//! # Isolation
//! Each worker owns its task and is the only writer of that task's document.
//! The orchestrator touches a task before spawn and after join only, so a
//! worker that fails, times out or panics never affects its siblings.

mod orchestrator;
mod types;
mod worker;

pub use orchestrator::{run_orchestration, Orchestrator};
pub use types::{OrchestratorError, PipelineError, RunOptions, RunResult};
pub use worker::{naive_summary, Worker};
