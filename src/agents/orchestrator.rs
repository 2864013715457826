//! Orchestrator - top of a research run.
//!
//! # Responsibilities
//! 1. Decompose the prompt into 1-3 task descriptors
//! 2. Create and persist one task per descriptor
//! 3. Run one worker pipeline per task concurrently and join them all
//! 4. Aggregate the task documents and summarize them
//!
//! Collaborators are resolved once at construction. If the planner is
//! unavailable, or its decomposition call fails, the whole run uses the
//! heuristic planner and the truncation summary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use super::types::{OrchestratorError, RunOptions, RunResult};
use super::worker::Worker;
use crate::config::Config;
use crate::llm::{GeminiClient, LlmClient};
use crate::outcome::{CallOutcome, Capability};
use crate::planner::{fallback_summary, heuristic_decompose, LlmPlanner, Planner, TaskDescriptor, MAX_TASKS};
use crate::store::TaskStore;
use crate::task::{Task, TaskId, TaskStatus};
use crate::tools::{resolve_browser, resolve_search};

/// Separator between task documents in the aggregate.
const DOCUMENT_SEPARATOR: &str = "\n\n---\n\n";

/// Runs prompts end to end against one task store.
pub struct Orchestrator {
    store: TaskStore,
    planner: Capability<Arc<dyn Planner>>,
    worker: Arc<Worker>,
    time_budget: Duration,
}

impl Orchestrator {
    pub fn new(
        store: TaskStore,
        planner: Capability<Arc<dyn Planner>>,
        worker: Worker,
        time_budget: Duration,
    ) -> Self {
        Self {
            store,
            planner,
            worker: Arc::new(worker),
            time_budget,
        }
    }

    /// Resolve every collaborator from `config`.
    ///
    /// `model` overrides the configured Gemini model for this orchestrator.
    ///
    /// # Errors
    /// Only if the task store directory cannot be created.
    pub fn from_config(config: &Config, model: Option<&str>) -> Result<Self, OrchestratorError> {
        let store = TaskStore::new(&config.tasks_dir)?;
        let model = model.filter(|m| !m.trim().is_empty()).unwrap_or(config.model.as_str());

        let planner = match GeminiClient::new(config.google_api_key.as_deref(), model) {
            Ok(client) => {
                tracing::info!("Planner: Gemini model {}", client.model());
                let client: Arc<dyn LlmClient> = Arc::new(client);
                Capability::Available(Arc::new(LlmPlanner::new(client)) as Arc<dyn Planner>)
            }
            Err(e) => {
                tracing::info!("Planner unavailable ({}), runs will use the heuristic planner", e);
                Capability::Unavailable(e.to_string())
            }
        };

        let worker = Worker::new(resolve_search(&config.search), resolve_browser(&config.browser))
            .with_limits(config.search.max_results, config.browser.max_steps);

        Ok(Self::new(store, planner, worker, config.task_time_budget))
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn planner_available(&self) -> bool {
        self.planner.is_available()
    }

    /// Run `prompt` to completion.
    ///
    /// # Postconditions
    /// - one task per descriptor, each in `Done` or `Blocked`
    /// - `final_summary` is non-empty
    ///
    /// # Errors
    /// Storage failures, or a worker that crashed beyond recovery.
    pub async fn run(&self, prompt: &str, options: RunOptions) -> Result<RunResult, OrchestratorError> {
        let (descriptors, planner) = self.decompose(prompt).await;
        tracing::info!("Decomposed prompt into {} tasks", descriptors.len());

        let tasks = self.create_tasks(descriptors)?;

        let budget = options.time_budget.unwrap_or(self.time_budget);
        let tasks = self.fan_out(tasks, budget, options.use_tier_one).await?;

        let task_paths: Vec<PathBuf> = tasks.iter().map(|t| self.store.path_for(t.id())).collect();
        let combined = self.aggregate(&tasks)?;
        let final_summary = self.summarize(planner, &combined).await;

        Ok(RunResult {
            tasks,
            task_paths,
            final_summary,
        })
    }

    /// Descriptors for `prompt`, plus the planner to keep using for this run
    /// (`None` once the run has fallen back).
    async fn decompose(&self, prompt: &str) -> (Vec<TaskDescriptor>, Option<Arc<dyn Planner>>) {
        let planner = match &self.planner {
            Capability::Available(planner) => planner.clone(),
            Capability::Unavailable(reason) => {
                tracing::info!("Using heuristic decomposition: {}", reason);
                return (heuristic_decompose(prompt), None);
            }
        };

        match planner.decompose(prompt).await {
            CallOutcome::Success(mut descriptors) if !descriptors.is_empty() => {
                descriptors.truncate(MAX_TASKS);
                (descriptors, Some(planner))
            }
            CallOutcome::Success(_) => {
                tracing::warn!("Planner returned no tasks, using heuristic planner for this run");
                (heuristic_decompose(prompt), None)
            }
            outcome => {
                tracing::warn!("Decomposition {}, using heuristic planner for this run", outcome);
                (heuristic_decompose(prompt), None)
            }
        }
    }

    /// Materialize and persist one `Todo` task per descriptor.
    pub fn create_tasks(&self, descriptors: Vec<TaskDescriptor>) -> Result<Vec<Task>, OrchestratorError> {
        let mut tasks = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let mut task = Task::new(descriptor.title, descriptor.objective, descriptor.constraints);
            self.store.create(&task)?;
            self.store.append_progress(&mut task, "created")?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    /// Spawn one worker per task and wait for all of them.
    async fn fan_out(&self, tasks: Vec<Task>, budget: Duration, use_tier_one: bool) -> Result<Vec<Task>, OrchestratorError> {
        let ids: Vec<TaskId> = tasks.iter().map(Task::id).collect();
        let handles = tasks.into_iter().map(|task| {
            let worker = Arc::clone(&self.worker);
            let store = self.store.clone();
            tokio::spawn(async move { worker.execute(task, &store, budget, use_tier_one).await })
        });
        let joined = join_all(handles).await;

        let mut finished = Vec::with_capacity(ids.len());
        for (id, result) in ids.into_iter().zip(joined) {
            match result {
                Ok(Ok(task)) => finished.push(task),
                Ok(Err(e)) => {
                    tracing::error!("Task {} could not be persisted: {}", id, e);
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::error!("Worker for task {} crashed: {}", id, e);
                    finished.push(self.recover(id)?);
                }
            }
        }
        Ok(finished)
    }

    /// Reload a task whose worker crashed and close it as `Blocked`.
    fn recover(&self, id: TaskId) -> Result<Task, OrchestratorError> {
        let mut task = self
            .store
            .load(id)
            .map_err(|e| OrchestratorError::Join(format!("task {}: {}", id, e)))?;
        if task.status().is_terminal() {
            return Ok(task);
        }
        if task.status() == TaskStatus::Todo {
            self.store.update_status(&mut task, TaskStatus::InProgress)?;
        }
        self.store.append_progress(&mut task, "Error: worker crashed")?;
        self.store.update_status(&mut task, TaskStatus::Blocked)?;
        Ok(task)
    }

    /// Every task document in task order, each under a heading with its title.
    fn aggregate(&self, tasks: &[Task]) -> Result<String, OrchestratorError> {
        let mut docs = Vec::with_capacity(tasks.len());
        for task in tasks {
            let text = self.store.read_full_text(task.id())?;
            docs.push(format!("# Task {}\n\n{}", task.title(), text));
        }
        Ok(docs.join(DOCUMENT_SEPARATOR))
    }

    async fn summarize(&self, planner: Option<Arc<dyn Planner>>, combined: &str) -> String {
        let Some(planner) = planner else {
            return fallback_summary(combined);
        };
        match planner.summarize(combined).await {
            CallOutcome::Success(summary) if !summary.trim().is_empty() => summary,
            CallOutcome::Success(_) => {
                tracing::warn!("Planner returned an empty summary, using truncation");
                fallback_summary(combined)
            }
            outcome => {
                tracing::warn!("Summarization {}, using truncation", outcome);
                fallback_summary(combined)
            }
        }
    }
}

/// Load configuration from the environment and run `prompt` once.
///
/// `model_name` overrides `GEMINI_MODEL` for this run.
pub async fn run_orchestration(
    prompt: &str,
    use_tier_one: bool,
    model_name: Option<&str>,
) -> Result<RunResult, OrchestratorError> {
    let config = Config::from_env()?;
    let orchestrator = Orchestrator::from_config(&config, model_name)?;
    orchestrator
        .run(prompt, RunOptions::default().with_tier_one(use_tier_one))
        .await
}
