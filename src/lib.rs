//! # Parallel Research
//!
//! Turns one free-form request into a few independent research tasks, runs
//! them concurrently and aggregates the results into a final plan.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!    prompt ───▶  │   Orchestrator   │ ──▶ Planner (Gemini | heuristic)
//!                 └────────┬─────────┘
//!            ┌─────────────┼─────────────┐
//!            ▼             ▼             ▼
//!        ┌────────┐    ┌────────┐    ┌────────┐
//!        │ Worker │    │ Worker │    │ Worker │  Tier 1 browser → Tier 2 search
//!        └───┬────┘    └───┬────┘    └───┬────┘
//!            ▼             ▼             ▼
//!        tasks/<id>.md (one document per task, rewritten on every change)
//! ```
//!
//! ## Task Flow
//! 1. Decompose the prompt into 1-3 task descriptors
//! 2. Persist one `Todo` task document per descriptor
//! 3. Run one worker per task; each ends `Done` or `Blocked`
//! 4. Concatenate the documents and summarize them
//!
//! ## Modules
//! - `agents`: worker pipeline and orchestrator
//! - `task`: task entity, findings and the status machine
//! - `store`: markdown task documents with atomic rewrites
//! - `planner`: decomposition and summarization (model-backed or heuristic)
//! - `llm`: Gemini client and retry policy
//! - `tools`: browser and web search collectors

pub mod agents;
pub mod config;
pub mod llm;
pub mod outcome;
pub mod planner;
pub mod store;
pub mod task;
pub mod tools;
pub mod util;

pub use agents::{run_orchestration, Orchestrator, RunOptions, RunResult};
pub use config::Config;
pub use outcome::{CallOutcome, Capability};
pub use store::{StoreError, TaskStore};
pub use task::{Finding, Task, TaskId, TaskStatus};
