//! Deterministic decomposition and summarization used when no model is
//! available for the run.

use std::sync::OnceLock;

use regex::Regex;

use super::TaskDescriptor;
use crate::util::truncate_chars;

/// Characters of aggregated markdown kept by [`fallback_summary`].
pub const FALLBACK_SUMMARY_CHARS: usize = 1500;

fn is_travel_prompt(prompt: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)trip|travel|flight|hotel|itinerary").unwrap())
        .is_match(prompt)
}

/// Keyword-based decomposition: three travel tasks or one research task.
pub fn heuristic_decompose(prompt: &str) -> Vec<TaskDescriptor> {
    if is_travel_prompt(prompt) {
        return vec![
            TaskDescriptor::new(
                "Find flights",
                &format!("Find flight options: {}", prompt),
                &["Use reputable travel sites", "Include 2+ options"],
            ),
            TaskDescriptor::new(
                "Find accommodation",
                &format!("Find stays/lodging: {}", prompt),
                &["Include prices", "Provide booking links"],
            ),
            TaskDescriptor::new(
                "Draft itinerary",
                &format!("Draft a concise itinerary: {}", prompt),
                &["Daily highlights", "Top attractions"],
            ),
        ];
    }
    vec![TaskDescriptor::new(
        "Research key information",
        prompt,
        &["Include 3+ citations"],
    )]
}

/// Truncation summary: the first [`FALLBACK_SUMMARY_CHARS`] characters, with
/// an ellipsis when anything was cut.
pub fn fallback_summary(markdown: &str) -> String {
    let (head, truncated) = truncate_chars(markdown, FALLBACK_SUMMARY_CHARS);
    let ellipsis = if truncated { "..." } else { "" };
    format!("Summary (fallback):\n\n{}{}", head, ellipsis)
}
