//! Decomposition and summarization.
//!
//! [`Planner`] is the seam the orchestrator talks to. [`LlmPlanner`] drives a
//! model client; the deterministic fallbacks in [`heuristic`] are used for the
//! whole run when no model is available or a model call fails.

pub mod heuristic;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::llm::{generate_with_retry, LlmClient, RetryConfig};
use crate::outcome::CallOutcome;

pub use heuristic::{fallback_summary, heuristic_decompose, FALLBACK_SUMMARY_CHARS};

/// Upper bound on descriptors a decomposition may yield.
pub const MAX_TASKS: usize = 3;

const SYSTEM_DECOMPOSE: &str = "You are an expert task planner and orchestrator. \
Given a single user prompt, produce a small list of 1-3 atomic tasks that can run in parallel. \
Return only concise task titles and objectives with constraints that help web research.";

const SYSTEM_SUMMARIZE: &str = "You are an executive assistant. \
Summarize the combined research into a short, actionable plan. \
Prefer clarity, bullet points, and include short rationale.";

const DECOMPOSE_SCHEMA_HINT: &str = "Return JSON list with objects: \
{title, objective, constraints (array of short strings)}. Max 3 tasks.";

/// Raw unit of work produced by decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub title: String,
    pub objective: String,
    #[serde(default)]
    pub constraints: Vec<String>,
}

impl TaskDescriptor {
    pub fn new(title: &str, objective: &str, constraints: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            objective: objective.to_string(),
            constraints: constraints.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Decomposition and summarization collaborator.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Split `prompt` into 1 to [`MAX_TASKS`] descriptors.
    async fn decompose(&self, prompt: &str) -> CallOutcome<Vec<TaskDescriptor>>;

    /// Produce the final plan from the concatenated task documents.
    async fn summarize(&self, markdown: &str) -> CallOutcome<String>;
}

/// Planner backed by a language model.
pub struct LlmPlanner {
    client: Arc<dyn LlmClient>,
    retry: RetryConfig,
}

impl LlmPlanner {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn decompose(&self, prompt: &str) -> CallOutcome<Vec<TaskDescriptor>> {
        let user = format!("{}\n\nUSER PROMPT:\n{}", DECOMPOSE_SCHEMA_HINT, prompt);
        generate_with_retry(self.client.as_ref(), &self.retry, SYSTEM_DECOMPOSE, &user)
            .await
            .map(|raw| parse_task_descriptors(&raw, prompt))
    }

    async fn summarize(&self, markdown: &str) -> CallOutcome<String> {
        let user = format!(
            "Summarize the following task results into an actionable plan with citations at the end.\n\n{}",
            markdown
        );
        generate_with_retry(self.client.as_ref(), &self.retry, SYSTEM_SUMMARIZE, &user).await
    }
}

/// Descriptor used when model output cannot be interpreted.
fn fallback_descriptor(prompt: &str) -> TaskDescriptor {
    TaskDescriptor::new(
        "Research and compile results",
        prompt,
        &["Use reputable sources", "Include 3+ citations"],
    )
}

/// Tolerantly interpret model output as a list of descriptors.
///
/// Accepts a bare JSON array or an object with a `tasks` array, optionally
/// wrapped in markdown code fences. Anything else (including an empty list)
/// yields the single fallback descriptor wrapping `prompt`.
pub fn parse_task_descriptors(raw: &str, prompt: &str) -> Vec<TaskDescriptor> {
    let text = raw.trim().replace("```json", "").replace("```", "");

    let value: serde_json::Value = match serde_json::from_str(text.trim()) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Decomposition output is not JSON, using fallback task: {}", e);
            return vec![fallback_descriptor(prompt)];
        }
    };

    let items = match value {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("tasks") {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let descriptors: Vec<TaskDescriptor> = items
        .iter()
        .filter_map(descriptor_from_value)
        .take(MAX_TASKS)
        .collect();

    if descriptors.is_empty() {
        tracing::warn!("Decomposition output has no usable tasks, using fallback task");
        return vec![fallback_descriptor(prompt)];
    }
    descriptors
}

fn descriptor_from_value(value: &serde_json::Value) -> Option<TaskDescriptor> {
    let object = value.as_object()?;
    let text_field = |key: &str| {
        object
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let title = text_field("title").unwrap_or_else(|| "Task".to_string());
    let objective = text_field("objective").unwrap_or_else(|| title.clone());
    let constraints = match object.get("constraints") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|c| c.as_str())
            .map(str::to_string)
            .collect(),
        Some(serde_json::Value::String(single)) => vec![single.clone()],
        _ => Vec::new(),
    };

    Some(TaskDescriptor {
        title,
        objective,
        constraints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedClient;
    use crate::llm::LlmError;

    #[test]
    fn test_parse_plain_array() {
        let raw = r#"[{"title":"Flights","objective":"Find flights","constraints":["cheap"]}]"#;
        let parsed = parse_task_descriptors(raw, "prompt");
        assert_eq!(parsed, vec![TaskDescriptor::new("Flights", "Find flights", &["cheap"])]);
    }

    #[test]
    fn test_parse_fenced_tasks_object() {
        let raw = "```json\n{\"tasks\": [{\"title\":\"A\",\"objective\":\"a\"},{\"title\":\"B\"}]}\n```";
        let parsed = parse_task_descriptors(raw, "prompt");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].title, "A");
        assert!(parsed[0].constraints.is_empty());
        assert_eq!(parsed[1].objective, "B");
    }

    #[test]
    fn test_parse_truncates_to_three() {
        let raw = r#"[{"title":"1"},{"title":"2"},{"title":"3"},{"title":"4"},{"title":"5"}]"#;
        let parsed = parse_task_descriptors(raw, "prompt");
        assert_eq!(parsed.len(), MAX_TASKS);
        assert_eq!(parsed[2].title, "3");
    }

    #[test]
    fn test_parse_garbage_falls_back() {
        for raw in ["not json at all", "[]", "{\"steps\": []}", "42", "[1, 2]"] {
            let parsed = parse_task_descriptors(raw, "plan my week");
            assert_eq!(parsed.len(), 1, "input: {}", raw);
            assert_eq!(parsed[0].title, "Research and compile results");
            assert_eq!(parsed[0].objective, "plan my week");
            assert_eq!(parsed[0].constraints, vec!["Use reputable sources", "Include 3+ citations"]);
        }
    }

    #[test]
    fn test_missing_title_gets_placeholder() {
        let parsed = parse_task_descriptors(r#"[{"objective":"compare laptops"}]"#, "p");
        assert_eq!(parsed[0].title, "Task");
        assert_eq!(parsed[0].objective, "compare laptops");
    }

    #[tokio::test]
    async fn test_llm_planner_decompose_sends_prompt() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(
            r#"[{"title":"Compare","objective":"compare runtimes"}]"#.to_string(),
        )]));
        let planner = LlmPlanner::new(client.clone()).with_retry(RetryConfig::immediate(3));

        let outcome = planner.decompose("rust async runtimes").await;
        let descriptors = outcome.success().unwrap();
        assert_eq!(descriptors[0].title, "Compare");

        let calls = client.calls.lock().unwrap();
        assert!(calls[0].ends_with("USER PROMPT:\nrust async runtimes"));
        assert!(calls[0].starts_with(DECOMPOSE_SCHEMA_HINT));
    }

    #[tokio::test]
    async fn test_llm_planner_surfaces_exhausted_retries() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(LlmError::server_error(503, "busy".into())),
            Err(LlmError::server_error(503, "busy".into())),
            Err(LlmError::server_error(503, "busy".into())),
        ]));
        let planner = LlmPlanner::new(client.clone()).with_retry(RetryConfig::immediate(3));

        let outcome = planner.summarize("# Task A").await;
        assert!(matches!(outcome, CallOutcome::TransientError { attempts: 3, .. }));
        assert_eq!(client.call_count(), 3);
    }
}
