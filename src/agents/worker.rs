//! Worker pipeline: drives one task from `Todo` to `Done` or `Blocked`.
//!
//! # Flow
//! ```text
//! 1. Todo -> InProgress, log the budget
//! 2. Tier 1 (browser), if requested and available; failures fall through
//! 3. Tier 2 (web search) when Tier 1 produced nothing
//! 4. Record findings, log the count, write the naive summary
//! 5. InProgress -> Done
//! ```
//! Everything after step 1 runs under the task's deadline. A timeout or a
//! collector error ends the task `Blocked` with a progress note; only storage
//! failures escape to the caller.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{timeout_at, Instant};

use super::types::PipelineError;
use crate::outcome::Capability;
use crate::store::{StoreError, TaskStore};
use crate::task::{Finding, Task, TaskStatus};
use crate::tools::{BrowserAgent, BrowserScenario, SearchBackend, MAX_BROWSER_FINDINGS};

/// Findings quoted in the naive per-task summary.
const SUMMARY_FINDINGS: usize = 3;

/// Executes worker pipelines with a fixed set of collectors.
pub struct Worker {
    search: Arc<dyn SearchBackend>,
    browser: Capability<Arc<dyn BrowserAgent>>,
    search_max_results: usize,
    browser_max_steps: usize,
}

impl Worker {
    pub fn new(search: Arc<dyn SearchBackend>, browser: Capability<Arc<dyn BrowserAgent>>) -> Self {
        Self {
            search,
            browser,
            search_max_results: 5,
            browser_max_steps: 8,
        }
    }

    pub fn with_limits(mut self, search_max_results: usize, browser_max_steps: usize) -> Self {
        self.search_max_results = search_max_results;
        self.browser_max_steps = browser_max_steps;
        self
    }

    pub fn browser_available(&self) -> bool {
        self.browser.is_available()
    }

    /// Run the pipeline for `task` and return it in a terminal status.
    ///
    /// # Preconditions
    /// - `task.status() == Todo` and its document exists in `store`
    ///
    /// # Errors
    /// Only storage failures; every other problem is recorded in the task.
    pub async fn execute(
        &self,
        mut task: Task,
        store: &TaskStore,
        budget: Duration,
        use_tier_one: bool,
    ) -> Result<Task, StoreError> {
        let deadline = Instant::now() + budget;
        store.update_status(&mut task, TaskStatus::InProgress)?;
        store.append_progress(
            &mut task,
            &format!("worker started with budget {}", format_budget(budget)),
        )?;
        tracing::info!("Task {} started: {}", task.id(), task.title());

        let outcome = match timeout_at(deadline, self.collect(&mut task, store, deadline, use_tier_one)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout),
        };

        match outcome {
            Ok(()) => {
                store.update_status(&mut task, TaskStatus::Done)?;
                tracing::info!("Task {} done with {} findings", task.id(), task.findings().len());
            }
            Err(PipelineError::Storage(e)) => return Err(e),
            Err(PipelineError::Timeout) => {
                tracing::warn!("Task {} timed out after {:?}", task.id(), budget);
                store.append_progress(&mut task, "Timed out")?;
                store.update_status(&mut task, TaskStatus::Blocked)?;
            }
            Err(PipelineError::Runtime(message)) => {
                tracing::warn!("Task {} failed: {}", task.id(), message);
                store.append_progress(&mut task, &format!("Error: {}", message))?;
                store.update_status(&mut task, TaskStatus::Blocked)?;
            }
        }
        Ok(task)
    }

    async fn collect(
        &self,
        task: &mut Task,
        store: &TaskStore,
        deadline: Instant,
        use_tier_one: bool,
    ) -> Result<(), PipelineError> {
        let query = task.search_query().trim().to_string();
        if query.is_empty() {
            return Err(PipelineError::Runtime("task has no objective or title to search for".to_string()));
        }

        let mut findings = Vec::new();
        if use_tier_one {
            findings = self.browse(task, store, &query, deadline).await?;
        }

        if findings.is_empty() {
            findings = timeout_at(deadline, self.search.search(&query, self.search_max_results))
                .await
                .map_err(|_| PipelineError::Timeout)?
                .map_err(|e| PipelineError::Runtime(format!("search failed: {}", e)))?;
        }

        let count = findings.len();
        for finding in findings {
            store.append_finding(task, finding)?;
        }
        store.append_progress(task, &format!("Collected {} findings", count))?;

        let summary = naive_summary(task.findings());
        store.set_summary(task, &summary)?;
        Ok(())
    }

    /// Tier 1. Every failure here is soft: it is noted and Tier 2 takes over.
    async fn browse(
        &self,
        task: &mut Task,
        store: &TaskStore,
        query: &str,
        deadline: Instant,
    ) -> Result<Vec<Finding>, PipelineError> {
        let agent = match &self.browser {
            Capability::Available(agent) => agent,
            Capability::Unavailable(reason) => {
                tracing::debug!("Tier 1 skipped for task {}: {}", task.id(), reason);
                return Ok(Vec::new());
            }
        };

        let scenario = BrowserScenario::new(query);
        tracing::debug!("Tier 1 for task {}: {}", task.id(), scenario.instructions());
        match timeout_at(deadline, agent.run(&scenario, self.browser_max_steps)).await {
            Ok(Ok(run)) => {
                let findings = run.candidate_findings(MAX_BROWSER_FINDINGS);
                store.append_progress(task, &format!("Browser collected {} links", findings.len()))?;
                Ok(findings)
            }
            Ok(Err(e)) => {
                tracing::warn!("Browser collector failed for task {}: {}", task.id(), e);
                store.append_progress(task, &format!("Browser failed, fallback to search: {}", e))?;
                Ok(Vec::new())
            }
            Err(_) => {
                tracing::warn!("Browser collector timed out for task {}", task.id());
                store.append_progress(task, "Browser timed out, fallback to search")?;
                Ok(Vec::new())
            }
        }
    }
}

/// One `- item (url)` line for each of the first three URL-bearing findings.
pub fn naive_summary(findings: &[Finding]) -> String {
    findings
        .iter()
        .filter_map(Finding::summary_line)
        .take(SUMMARY_FINDINGS)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_budget(budget: Duration) -> String {
    if budget.subsec_nanos() == 0 {
        format!("{}s", budget.as_secs())
    } else {
        format!("{:?}", budget)
    }
}
