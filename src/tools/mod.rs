//! Collectors used by worker pipelines.
//!
//! Two tiers gather findings for a task:
//! - Tier 1, an optional browser agent driving a real Chrome over CDP
//! - Tier 2, text web search (Tavily or DuckDuckGo HTML)
//!
//! Both are resolved once per orchestrator into a [`Capability`]; a missing
//! or disabled collector is an explicit `Unavailable`, never a runtime check.

mod browser;
mod web;

pub use browser::{resolve_browser, BrowserAgent, BrowserRun, BrowserScenario, MAX_BROWSER_FINDINGS};
#[cfg(feature = "browser")]
pub use browser::CdpBrowserAgent;
pub use web::{NoSearch, WebSearch};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SearchConfig;
use crate::task::Finding;

/// Tier 2 text search.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Up to `max_results` findings for `query`. No results is `Ok(vec![])`.
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<Finding>>;
}

/// Build the search backend for a run.
///
/// Search is always available: a disabled or misconfigured backend degrades
/// to [`NoSearch`] so Tier 2 yields empty results instead of failing.
pub fn resolve_search(config: &SearchConfig) -> Arc<dyn SearchBackend> {
    if !config.enabled {
        tracing::info!("Web search disabled, Tier 2 will return no findings");
        return Arc::new(NoSearch);
    }
    match WebSearch::new(config.tavily_api_key.clone()) {
        Ok(search) => {
            tracing::info!("Web search backend: {}", search.name());
            Arc::new(search)
        }
        Err(e) => {
            tracing::warn!("Web search unavailable ({}), Tier 2 will return no findings", e);
            Arc::new(NoSearch)
        }
    }
}
