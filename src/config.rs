//! Configuration management for parallel research runs.
//!
//! Configuration can be set via environment variables:
//! - `GOOGLE_API_KEY` - Optional. Gemini credentials. Without it every run uses the heuristic planner.
//! - `GEMINI_MODEL` - Optional. Model name. Defaults to `gemini-1.5-flash-002`.
//! - `TASKS_DIR` - Optional. Directory holding task documents. Defaults to `tasks`.
//! - `TASK_TIME_BUDGET_SECS` - Optional. Per-task worker budget. Defaults to `60`.
//! - `SEARCH_ENABLED` - Optional. Defaults to `true`.
//! - `SEARCH_MAX_RESULTS` - Optional. Defaults to `5`.
//! - `TAVILY_API_KEY` - Optional. Use Tavily instead of DuckDuckGo for search.
//! - `BROWSER_ENABLED` - Optional. Enable the browser collector. Defaults to `false`.
//! - `BROWSER_CDP_URL` - Optional. Chrome DevTools endpoint. Defaults to `http://127.0.0.1:9222`.
//! - `BROWSER_MAX_STEPS` - Optional. Page visits per browser run. Defaults to `8`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::llm::DEFAULT_GEMINI_MODEL;
use crate::util::parse_bool;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Tier 2 search configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub enabled: bool,

    /// Result cap per query
    pub max_results: usize,

    /// Tavily API key; DuckDuckGo HTML is used when absent
    pub tavily_api_key: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_results: 5,
            tavily_api_key: None,
        }
    }
}

/// Tier 1 browser configuration.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub enabled: bool,

    /// DevTools endpoint of a running Chrome/Chromium
    pub cdp_url: String,

    pub max_steps: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cdp_url: "http://127.0.0.1:9222".to_string(),
            max_steps: 8,
        }
    }
}

/// Run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub google_api_key: Option<String>,

    /// Default model; a run may override it
    pub model: String,

    /// Base directory of the task document store
    pub tasks_dir: PathBuf,

    /// Time budget of each worker pipeline
    pub task_time_budget: Duration,

    pub search: SearchConfig,

    pub browser: BrowserConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |name: &str, default: bool| non_empty(name).map_or(default, |v| parse_bool(&v));

        let google_api_key = non_empty("GOOGLE_API_KEY");
        let model = non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
        let tasks_dir = non_empty("TASKS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("tasks"));
        let budget_secs: u64 = parse_number("TASK_TIME_BUDGET_SECS", non_empty("TASK_TIME_BUDGET_SECS"), 60)?;

        let search = SearchConfig {
            enabled: flag("SEARCH_ENABLED", true),
            max_results: parse_number("SEARCH_MAX_RESULTS", non_empty("SEARCH_MAX_RESULTS"), 5)?,
            tavily_api_key: non_empty("TAVILY_API_KEY"),
        };

        let defaults = BrowserConfig::default();
        let browser = BrowserConfig {
            enabled: flag("BROWSER_ENABLED", false),
            cdp_url: non_empty("BROWSER_CDP_URL").unwrap_or(defaults.cdp_url),
            max_steps: parse_number("BROWSER_MAX_STEPS", non_empty("BROWSER_MAX_STEPS"), defaults.max_steps)?,
        };

        Ok(Self {
            google_api_key,
            model,
            tasks_dir,
            task_time_budget: Duration::from_secs(budget_secs),
            search,
            browser,
        })
    }

    /// Create a config with explicit values (useful for testing).
    pub fn new(tasks_dir: PathBuf, google_api_key: Option<String>) -> Self {
        Self {
            google_api_key,
            model: DEFAULT_GEMINI_MODEL.to_string(),
            tasks_dir,
            task_time_budget: Duration::from_secs(60),
            search: SearchConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

fn parse_number<T>(name: &str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(name.to_string(), format!("{}", e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert!(config.google_api_key.is_none());
        assert_eq!(config.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.tasks_dir, PathBuf::from("tasks"));
        assert_eq!(config.task_time_budget, Duration::from_secs(60));
        assert!(config.search.enabled);
        assert_eq!(config.search.max_results, 5);
        assert!(!config.browser.enabled);
        assert_eq!(config.browser.max_steps, 8);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GOOGLE_API_KEY", "secret"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("TASKS_DIR", "/tmp/research"),
            ("TASK_TIME_BUDGET_SECS", "5"),
            ("SEARCH_ENABLED", "off"),
            ("BROWSER_ENABLED", "YES"),
            ("BROWSER_MAX_STEPS", "3"),
        ])
        .unwrap();
        assert_eq!(config.google_api_key.as_deref(), Some("secret"));
        assert_eq!(config.model, "gemini-2.0-flash");
        assert_eq!(config.tasks_dir, PathBuf::from("/tmp/research"));
        assert_eq!(config.task_time_budget, Duration::from_secs(5));
        assert!(!config.search.enabled);
        assert!(config.browser.enabled);
        assert_eq!(config.browser.max_steps, 3);
    }

    #[test]
    fn test_blank_key_is_absent() {
        let config = load(&[("GOOGLE_API_KEY", "   ")]).unwrap();
        assert!(config.google_api_key.is_none());
    }

    #[test]
    fn test_invalid_number() {
        let err = load(&[("TASK_TIME_BUDGET_SECS", "soon")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref name, _) if name == "TASK_TIME_BUDGET_SECS"));
    }
}
