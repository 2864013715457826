//! Tier 1 browser collector.
//!
//! The CDP implementation connects to a Chrome/Chromium browser running with
//! remote debugging enabled and is compiled with the `browser` feature.
//! Start Chrome with: `google-chrome --remote-debugging-port=9222`

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::BrowserConfig;
use crate::outcome::Capability;
use crate::task::Finding;

/// Most findings Tier 1 contributes to one task.
pub const MAX_BROWSER_FINDINGS: usize = 5;

/// What the browser agent is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserScenario {
    pub query: String,
}

impl BrowserScenario {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into() }
    }

    /// Natural-language instructions for the agent.
    pub fn instructions(&self) -> String {
        format!(
            "Research: {}. Find 3-5 authoritative sources with brief snippets. Return links.",
            self.query
        )
    }
}

/// Result of one browser agent run. Every field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowserRun {
    pub links: Vec<String>,
    pub urls: Vec<String>,
    pub sources: Vec<String>,
    pub final_result: Option<String>,
}

impl BrowserRun {
    /// `Source` findings for the first `cap` non-empty links, in
    /// links/urls/sources order, each carrying the final text as snippet.
    pub fn candidate_findings(&self, cap: usize) -> Vec<Finding> {
        let snippet = self
            .final_result
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        self.links
            .iter()
            .chain(&self.urls)
            .chain(&self.sources)
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .take(cap)
            .map(|u| {
                let finding = Finding::new("Source").with_url(u);
                match snippet {
                    Some(text) => finding.with_snippet(text),
                    None => finding,
                }
            })
            .collect()
    }
}

/// Tier 1 collector: an agent that browses for sources.
#[async_trait]
pub trait BrowserAgent: Send + Sync {
    async fn run(&self, scenario: &BrowserScenario, max_steps: usize) -> anyhow::Result<BrowserRun>;
}

/// Resolve the browser capability for a run.
pub fn resolve_browser(config: &BrowserConfig) -> Capability<Arc<dyn BrowserAgent>> {
    if !config.enabled {
        return Capability::Unavailable("browser collector disabled (BROWSER_ENABLED)".to_string());
    }
    resolve_enabled(config)
}

#[cfg(feature = "browser")]
fn resolve_enabled(config: &BrowserConfig) -> Capability<Arc<dyn BrowserAgent>> {
    tracing::info!("Browser collector enabled at {}", config.cdp_url);
    Capability::Available(Arc::new(CdpBrowserAgent::new(config.cdp_url.clone())))
}

#[cfg(not(feature = "browser"))]
fn resolve_enabled(_config: &BrowserConfig) -> Capability<Arc<dyn BrowserAgent>> {
    tracing::warn!("BROWSER_ENABLED is set but this build lacks the `browser` feature");
    Capability::Unavailable("built without the `browser` feature".to_string())
}

#[cfg(feature = "browser")]
pub use cdp::CdpBrowserAgent;

#[cfg(feature = "browser")]
mod cdp {
    use chromiumoxide::browser::Browser;
    use chromiumoxide::Page;
    use futures::StreamExt;

    use super::*;

    const RESULT_LINKS_SCRIPT: &str = r#"
        (() => Array.from(document.querySelectorAll('a.result__a'))
            .map(a => a.href)
            .filter(h => h && h.startsWith('http')))()
    "#;

    const PAGE_SUMMARY_SCRIPT: &str = r#"
        (() => {
            const meta = document.querySelector('meta[name="description"]');
            const text = (meta && meta.content) || (document.body && document.body.innerText) || '';
            return text.replace(/\s+/g, ' ').trim().slice(0, 300);
        })()
    "#;

    /// Browser agent over the Chrome DevTools Protocol.
    ///
    /// One step is one page load: the search results page first, then
    /// result pages until the step budget or the link cap is reached.
    pub struct CdpBrowserAgent {
        cdp_url: String,
    }

    impl CdpBrowserAgent {
        pub fn new(cdp_url: String) -> Self {
            Self { cdp_url }
        }

        async fn visit(page: &Page, url: &str) -> anyhow::Result<(String, Option<String>, String)> {
            page.goto(url).await?;
            let resolved = page.url().await?.unwrap_or_else(|| url.to_string());
            let title = page.get_title().await?;
            let summary: String = page
                .evaluate(PAGE_SUMMARY_SCRIPT)
                .await?
                .into_value()
                .unwrap_or_default();
            Ok((resolved, title, summary))
        }
    }

    #[async_trait]
    impl BrowserAgent for CdpBrowserAgent {
        async fn run(&self, scenario: &BrowserScenario, max_steps: usize) -> anyhow::Result<BrowserRun> {
            let (browser, mut handler) = Browser::connect(&self.cdp_url).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to connect to Chrome at {}. Make sure Chrome is running with --remote-debugging-port=9222. Error: {}",
                    self.cdp_url,
                    e
                )
            })?;

            let handler_task = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if let Err(e) = event {
                        tracing::warn!("Browser event error: {}", e);
                    }
                }
            });

            tracing::info!("Browser agent started: {}", scenario.instructions());
            let page = browser.new_page("about:blank").await?;
            let result = self.browse(&page, scenario, max_steps).await;
            page.close().await.ok();
            handler_task.abort();
            result
        }
    }

    impl CdpBrowserAgent {
        async fn browse(&self, page: &Page, scenario: &BrowserScenario, max_steps: usize) -> anyhow::Result<BrowserRun> {
            let mut run = BrowserRun::default();
            if max_steps == 0 {
                return Ok(run);
            }

            let search_url = format!(
                "https://html.duckduckgo.com/html/?q={}",
                urlencoding::encode(&scenario.query)
            );
            page.goto(search_url.as_str()).await?;
            let links: Vec<String> = page
                .evaluate(RESULT_LINKS_SCRIPT)
                .await?
                .into_value()
                .unwrap_or_default();
            run.links = links.into_iter().take(MAX_BROWSER_FINDINGS).collect();
            tracing::debug!("Browser found {} result links for {:?}", run.links.len(), scenario.query);

            let mut notes = Vec::new();
            for link in run.links.iter().take(max_steps.saturating_sub(1)) {
                match Self::visit(page, link).await {
                    Ok((resolved, title, summary)) => {
                        if resolved != *link {
                            run.urls.push(resolved);
                        }
                        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
                            if !summary.is_empty() {
                                notes.push(format!("{}: {}", title.trim(), summary));
                            }
                        }
                    }
                    Err(e) => tracing::debug!("Browser could not load {}: {}", link, e),
                }
            }

            if !notes.is_empty() {
                run.final_result = Some(notes.join("\n"));
            }
            Ok(run)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_instructions() {
        let scenario = BrowserScenario::new("rust async runtimes");
        assert_eq!(
            scenario.instructions(),
            "Research: rust async runtimes. Find 3-5 authoritative sources with brief snippets. Return links."
        );
    }

    #[test]
    fn test_candidate_findings_capped_and_ordered() {
        let run = BrowserRun {
            links: vec!["https://a.example".into(), "".into(), "https://b.example".into()],
            urls: vec!["https://c.example".into(), "https://d.example".into()],
            sources: vec!["https://e.example".into(), "https://f.example".into()],
            final_result: Some("shared text".into()),
        };
        let findings = run.candidate_findings(MAX_BROWSER_FINDINGS);
        let urls: Vec<_> = findings.iter().filter_map(|f| f.url.as_deref()).collect();
        assert_eq!(
            urls,
            vec![
                "https://a.example",
                "https://b.example",
                "https://c.example",
                "https://d.example",
                "https://e.example"
            ]
        );
        assert!(findings.iter().all(|f| f.item == "Source"));
        assert!(findings.iter().all(|f| f.snippet.as_deref() == Some("shared text")));
    }

    #[test]
    fn test_candidate_findings_without_text() {
        let run = BrowserRun {
            sources: vec!["https://a.example".into()],
            final_result: Some("   ".into()),
            ..Default::default()
        };
        let findings = run.candidate_findings(MAX_BROWSER_FINDINGS);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].snippet, None);
        assert!(BrowserRun::default().candidate_findings(5).is_empty());
    }

    #[test]
    fn test_disabled_browser_is_unavailable() {
        let capability = resolve_browser(&BrowserConfig::default());
        assert!(!capability.is_available());
    }
}
