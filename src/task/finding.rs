//! Evidence collected for a task.

use serde::{Deserialize, Serialize};

/// One piece of evidence: a label, an optional source URL and excerpt.
///
/// Immutable once appended to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub item: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Finding {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            url: None,
            snippet: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// Empty `url` and `snippet` collapse to `None`; documents cannot tell them apart.
    pub fn normalized(mut self) -> Self {
        self.url = self.url.filter(|u| !u.is_empty());
        self.snippet = self.snippet.filter(|s| !s.is_empty());
        self
    }

    /// `item (url)` bullet text for the naive per-task summary.
    pub fn summary_line(&self) -> Option<String> {
        self.url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|url| format!("- {} ({})", self.item, url))
    }
}
