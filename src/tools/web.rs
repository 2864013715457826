//! Web search backends.
//!
//! Web search uses Tavily API if an API key is configured, otherwise falls back to DuckDuckGo HTML.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::SearchBackend;
use crate::task::Finding;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; ParallelResearch/0.1)";

/// Search the web using Tavily API (preferred) or DuckDuckGo fallback.
pub struct WebSearch {
    client: reqwest::Client,
    tavily_api_key: Option<String>,
}

impl WebSearch {
    pub fn new(tavily_api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            tavily_api_key: tavily_api_key.filter(|k| !k.is_empty()),
        })
    }
}

/// Search backend that never finds anything.
pub struct NoSearch;

#[async_trait]
impl SearchBackend for NoSearch {
    fn name(&self) -> &str {
        "none"
    }

    async fn search(&self, _query: &str, _max_results: usize) -> anyhow::Result<Vec<Finding>> {
        Ok(Vec::new())
    }
}

/// Tavily API request body.
#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    include_answer: bool,
    include_raw_content: bool,
}

/// Tavily API response.
#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

/// A single result from Tavily.
#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl From<TavilyResult> for Finding {
    fn from(result: TavilyResult) -> Self {
        let item = if result.title.trim().is_empty() {
            "Result".to_string()
        } else {
            result.title
        };
        Finding::new(item)
            .with_url(result.url)
            .with_snippet(result.content)
            .normalized()
    }
}

#[async_trait]
impl SearchBackend for WebSearch {
    fn name(&self) -> &str {
        if self.tavily_api_key.is_some() {
            "tavily"
        } else {
            "duckduckgo"
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<Finding>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let mut findings = match &self.tavily_api_key {
            Some(api_key) => self.search_tavily(api_key, query, max_results).await?,
            None => self.search_duckduckgo(query).await?,
        };
        findings.truncate(max_results);
        tracing::debug!("{} returned {} results for {:?}", self.name(), findings.len(), query);
        Ok(findings)
    }
}

impl WebSearch {
    /// Search using Tavily API.
    async fn search_tavily(&self, api_key: &str, query: &str, max_results: usize) -> anyhow::Result<Vec<Finding>> {
        let request = TavilySearchRequest {
            api_key,
            query,
            max_results,
            include_answer: false,
            include_raw_content: false,
        };

        let response = self
            .client
            .post("https://api.tavily.com/search")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Tavily API error ({}): {}", status, error_text);
        }

        let tavily_response: TavilySearchResponse = response.json().await?;
        Ok(tavily_response.results.into_iter().map(Finding::from).collect())
    }

    /// Fallback search using DuckDuckGo HTML (may be blocked by CAPTCHA).
    async fn search_duckduckgo(&self, query: &str) -> anyhow::Result<Vec<Finding>> {
        let url = format!("https://html.duckduckgo.com/html/?q={}", urlencoding::encode(query));
        let html = self.client.get(&url).send().await?.text().await?;

        if html.contains("anomaly-modal") || html.contains("Unfortunately, bots") {
            anyhow::bail!("DuckDuckGo blocked the request with CAPTCHA; configure TAVILY_API_KEY for reliable web search");
        }

        Ok(extract_ddg_results(&html))
    }
}

/// Extract search results from DuckDuckGo HTML.
pub(crate) fn extract_ddg_results(html: &str) -> Vec<Finding> {
    let mut results = Vec::new();

    for chunk in html.split("class=\"result__body\"").skip(1) {
        let anchor = chunk.split("class=\"result__a\"").nth(1);

        let title = anchor
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(|s| html_decode(s.trim()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Result".to_string());

        // The href may sit on either side of the class attribute.
        let href = chunk
            .split("class=\"result__a\"")
            .next()
            .and_then(|before| before.rsplit('<').next())
            .and_then(|tag| attribute_value(tag, "href"))
            .or_else(|| {
                anchor
                    .and_then(|s| s.split('>').next())
                    .and_then(|tag| attribute_value(tag, "href"))
            });

        let url = href.map(|h| resolve_ddg_link(&html_decode(&h)));

        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|s| s.split_once('>'))
            .map(|(_, rest)| {
                let end = ["</a>", "</div>", "</td>"]
                    .iter()
                    .filter_map(|close| rest.find(close))
                    .min()
                    .unwrap_or(rest.len());
                html_decode(&strip_tags(&rest[..end])).trim().to_string()
            });

        let mut finding = Finding::new(title);
        finding.url = url;
        finding.snippet = snippet;
        let finding = finding.normalized();
        if finding.url.is_some() {
            results.push(finding);
        }
    }

    results
}

/// Value of the first `name="..."` attribute in `fragment`.
fn attribute_value(fragment: &str, name: &str) -> Option<String> {
    let marker = format!("{}=\"", name);
    let start = fragment.find(&marker)? + marker.len();
    let end = fragment[start..].find('"')? + start;
    Some(fragment[start..end].to_string())
}

/// Unwrap DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=<encoded>&...`).
fn resolve_ddg_link(href: &str) -> String {
    if let Some(idx) = href.find("uddg=") {
        let encoded = href[idx + 5..].split('&').next().unwrap_or_default();
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    href.to_string()
}

fn strip_tags(s: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

/// Basic HTML entity decoding.
fn html_decode(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
