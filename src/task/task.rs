//! Core Task type: one research unit with its audit trail and evidence.
//!
//! # Invariants
//! - `id` is unique and never reused
//! - `updated >= created`, advanced on every mutation
//! - `citations` is the deduplicated, first-seen projection of `findings[].url`
//! - `status` only moves `Todo -> InProgress -> {Done, Blocked}`

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::finding::Finding;

/// Plan labels every materialized task starts with.
pub const DEFAULT_PLAN: [&str; 3] = ["search", "record findings", "summarize"];

/// Unique identifier for a task.
///
/// # Properties
/// - Globally unique (random v4 UUID)
/// - Immutable once created
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Create a new unique task ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a task in its lifecycle.
///
/// # State Machine
/// ```text
/// Todo -> InProgress -> Done
///                   \-> Blocked
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up by a worker
    Todo,
    /// A worker pipeline is driving the task
    InProgress,
    /// Collection finished
    Done,
    /// Timed out or failed; terminal for this run
    Blocked,
}

impl TaskStatus {
    /// Wire name used in task documents.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    /// `true` for Done and Blocked.
    ///
    /// # Property
    /// `is_terminal() => !can_transition_to(any)`
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Blocked)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Todo, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Done)
                | (TaskStatus::InProgress, TaskStatus::Blocked)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped line of a task's progress log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub at: DateTime<Utc>,
    pub note: String,
}

/// A research task owned by exactly one worker pipeline while it runs.
///
/// Mutations go through [`crate::store::TaskStore`], which applies them here
/// and then rewrites the persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    title: String,
    objective: String,
    status: TaskStatus,
    owner: Option<String>,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    inputs: BTreeMap<String, serde_yaml::Value>,
    constraints: Vec<String>,
    plan_steps: Vec<String>,
    progress_log: Vec<ProgressEntry>,
    findings: Vec<Finding>,
    citations: Vec<String>,
    summary: Option<String>,
}

impl Task {
    /// Create a new task in `Todo` with a fresh id and the default plan.
    ///
    /// # Postconditions
    /// - `status == Todo`, `created == updated`
    /// - progress, findings and citations are empty
    pub fn new(
        title: impl Into<String>,
        objective: impl Into<String>,
        constraints: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            title: title.into(),
            objective: objective.into(),
            status: TaskStatus::Todo,
            owner: None,
            created: now,
            updated: now,
            inputs: BTreeMap::new(),
            constraints,
            plan_steps: DEFAULT_PLAN.iter().map(|s| s.to_string()).collect(),
            progress_log: Vec::new(),
            findings: Vec::new(),
            citations: Vec::new(),
            summary: None,
        }
    }

    /// Rebuild a task from persisted parts. Citations are recomputed from
    /// `findings` so the projection invariant always holds.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        id: TaskId,
        title: String,
        objective: String,
        status: TaskStatus,
        owner: Option<String>,
        created: DateTime<Utc>,
        updated: DateTime<Utc>,
        inputs: BTreeMap<String, serde_yaml::Value>,
        constraints: Vec<String>,
        plan_steps: Vec<String>,
        progress_log: Vec<ProgressEntry>,
        findings: Vec<Finding>,
        summary: Option<String>,
    ) -> Self {
        let mut task = Self {
            id,
            title,
            objective,
            status,
            owner,
            created,
            updated,
            inputs,
            constraints,
            plan_steps,
            progress_log,
            findings,
            citations: Vec::new(),
            summary,
        };
        let urls: Vec<String> = task.findings.iter().filter_map(|f| f.url.clone()).collect();
        for url in urls {
            task.cite(&url);
        }
        task
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Inputs are free-form: any YAML value (scalar, list or mapping).
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    // Getters

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    pub fn inputs(&self) -> &BTreeMap<String, serde_yaml::Value> {
        &self.inputs
    }

    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    pub fn plan_steps(&self) -> &[String] {
        &self.plan_steps
    }

    pub fn progress_log(&self) -> &[ProgressEntry] {
        &self.progress_log
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Query used by collectors: the objective, or the title when empty.
    pub fn search_query(&self) -> &str {
        if self.objective.trim().is_empty() {
            &self.title
        } else {
            &self.objective
        }
    }

    // Mutations. Each one advances `updated`; persistence is the store's job.

    /// Move to `next` if the state machine allows it.
    ///
    /// # Errors
    /// `TaskError::InvalidTransition` for regressions, skips and repeats.
    pub(crate) fn transition(&mut self, next: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition_to(next) {
            return Err(TaskError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    pub(crate) fn push_progress(&mut self, note: impl Into<String>) {
        let at = Utc::now();
        self.progress_log.push(ProgressEntry {
            at,
            note: note.into(),
        });
        self.touch_at(at);
    }

    /// Append a finding and extend citations with its URL when unseen.
    pub(crate) fn push_finding(&mut self, finding: Finding) {
        if let Some(url) = finding.url.as_deref() {
            self.cite(url);
        }
        self.findings.push(finding);
        self.touch();
    }

    fn cite(&mut self, url: &str) {
        if !url.is_empty() && !self.citations.iter().any(|c| c == url) {
            self.citations.push(url.to_string());
        }
    }

    pub(crate) fn replace_summary(&mut self, summary: impl Into<String>) {
        self.summary = Some(summary.into());
        self.touch();
    }

    fn touch(&mut self) {
        self.touch_at(Utc::now());
    }

    fn touch_at(&mut self, at: DateTime<Utc>) {
        // Clocks can step backwards; never let `updated` precede earlier stamps.
        if at > self.updated {
            self.updated = at;
        }
    }
}

/// Errors that can occur during task operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}
