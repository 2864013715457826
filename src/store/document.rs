//! Markdown rendering and parsing of task documents.
//!
//! Layout:
//! ```text
//! ---
//! <YAML front matter: id, status, owner, created, updated, title,
//!  objective, inputs, constraints, plan>
//! ---
//!
//! ## Progress
//! - <timestamp> - <note>
//!
//! ## Findings
//! - item: <item>
//!   url: <url>
//!   snippet: <snippet>
//!
//! ## Citations
//! - <url>
//!
//! ## Summary
//! <free text>
//! ```
//!
//! Front matter goes through `serde_yaml`, which quotes anything that could
//! be mistaken for structure. Every progress note, finding field and citation
//! is kept on a single line by [`escape_line`]. The summary is the last
//! section, so it is written verbatim.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Finding, ProgressEntry, Task, TaskStatus};

const DELIMITER: &str = "---";
const PROGRESS_HEADING: &str = "## Progress\n";
const FINDINGS_HEADING: &str = "\n\n## Findings\n";
const CITATIONS_HEADING: &str = "\n\n## Citations\n";
const SUMMARY_HEADING: &str = "\n\n## Summary\n";
/// Bullet written for an empty progress log.
const EMPTY_PROGRESS: &str = "- created";

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Malformed(String),
}

fn malformed(reason: impl Into<String>) -> DocumentError {
    DocumentError::Malformed(reason.into())
}

/// Front matter, in the order it appears in the document.
#[derive(Debug, Serialize, Deserialize)]
struct FrontMatter {
    id: String,
    status: TaskStatus,
    owner: Option<String>,
    created: String,
    updated: String,
    title: String,
    objective: String,
    #[serde(default)]
    inputs: BTreeMap<String, serde_yaml::Value>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    plan: Vec<String>,
}

/// RFC 3339 in UTC with exactly as many fractional digits as needed.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, DocumentError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| malformed(format!("invalid timestamp '{}': {}", value, e)))
}

/// Keep a value on one line: `\` → `\\`, LF → `\n`, CR → `\r`.
pub fn escape_line(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_line`]. Unknown escapes are kept as written.
pub fn unescape_line(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Render the full document for `task`. Same state, same bytes.
pub fn render(task: &Task) -> Result<String, DocumentError> {
    let header = FrontMatter {
        id: task.id().to_string(),
        status: task.status(),
        owner: task.owner().map(str::to_string),
        created: format_timestamp(&task.created()),
        updated: format_timestamp(&task.updated()),
        title: task.title().to_string(),
        objective: task.objective().to_string(),
        inputs: task.inputs().clone(),
        constraints: task.constraints().to_vec(),
        plan: task.plan_steps().to_vec(),
    };
    let header_yaml = serde_yaml::to_string(&header)?;

    let progress = if task.progress_log().is_empty() {
        EMPTY_PROGRESS.to_string()
    } else {
        task.progress_log()
            .iter()
            .map(|e| format!("- {} - {}", format_timestamp(&e.at), escape_line(&e.note)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let findings = task
        .findings()
        .iter()
        .map(|f| {
            format!(
                "- item: {}\n  url: {}\n  snippet: {}",
                escape_line(&f.item),
                escape_line(f.url.as_deref().unwrap_or("")),
                escape_line(f.snippet.as_deref().unwrap_or(""))
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let citations = task
        .citations()
        .iter()
        .map(|u| format!("- {}", escape_line(u)))
        .collect::<Vec<_>>()
        .join("\n");

    let mut doc = String::new();
    doc.push_str(DELIMITER);
    doc.push('\n');
    doc.push_str(header_yaml.trim_end());
    doc.push('\n');
    doc.push_str(DELIMITER);
    doc.push_str("\n\n");
    doc.push_str(PROGRESS_HEADING);
    doc.push_str(&progress);
    doc.push_str(FINDINGS_HEADING);
    doc.push_str(&findings);
    doc.push_str(CITATIONS_HEADING);
    doc.push_str(&citations);
    doc.push_str(SUMMARY_HEADING);
    doc.push_str(task.summary().unwrap_or(""));
    doc.push('\n');
    Ok(doc)
}

/// Parse a document produced by [`render`] back into a task.
pub fn parse(text: &str) -> Result<Task, DocumentError> {
    let rest = text
        .strip_prefix("---\n")
        .ok_or_else(|| malformed("missing opening front matter delimiter"))?;
    let close = rest
        .find("\n---\n")
        .ok_or_else(|| malformed("missing closing front matter delimiter"))?;
    let header: FrontMatter = serde_yaml::from_str(&rest[..close])?;
    let body = &rest[close + "\n---\n".len()..];

    let body = body
        .strip_prefix('\n')
        .and_then(|b| b.strip_prefix(PROGRESS_HEADING))
        .ok_or_else(|| malformed("missing Progress section"))?;
    let (progress, body) = split_section(body, FINDINGS_HEADING, "Findings")?;
    let (findings, body) = split_section(body, CITATIONS_HEADING, "Citations")?;
    let (_citations, summary) = split_section(body, SUMMARY_HEADING, "Summary")?;
    let summary = summary.strip_suffix('\n').unwrap_or(summary);

    let id = header
        .id
        .parse()
        .map_err(|e| malformed(format!("invalid id '{}': {}", header.id, e)))?;

    Ok(Task::from_parts(
        id,
        header.title,
        header.objective,
        header.status,
        header.owner,
        parse_timestamp(&header.created)?,
        parse_timestamp(&header.updated)?,
        header.inputs,
        header.constraints,
        header.plan,
        parse_progress(progress)?,
        parse_findings(findings)?,
        (!summary.is_empty()).then(|| summary.to_string()),
    ))
}

fn split_section<'a>(
    body: &'a str,
    heading: &str,
    name: &str,
) -> Result<(&'a str, &'a str), DocumentError> {
    body.split_once(heading)
        .ok_or_else(|| malformed(format!("missing {} section", name)))
}

fn parse_progress(section: &str) -> Result<Vec<ProgressEntry>, DocumentError> {
    if section.is_empty() || section == EMPTY_PROGRESS {
        return Ok(Vec::new());
    }
    section
        .lines()
        .map(|line| {
            let entry = line
                .strip_prefix("- ")
                .ok_or_else(|| malformed(format!("bad progress line '{}'", line)))?;
            let (stamp, note) = entry
                .split_once(" - ")
                .ok_or_else(|| malformed(format!("bad progress line '{}'", line)))?;
            Ok(ProgressEntry {
                at: parse_timestamp(stamp)?,
                note: unescape_line(note),
            })
        })
        .collect()
}

fn field<'a>(line: Option<&'a str>, prefix: &str) -> Result<&'a str, DocumentError> {
    let line = line.ok_or_else(|| malformed(format!("finding is missing '{}'", prefix.trim())))?;
    let value = line
        .strip_prefix(prefix)
        .ok_or_else(|| malformed(format!("expected '{}' in '{}'", prefix.trim(), line)))?;
    // Editors may strip the trailing space after an empty value.
    Ok(value.strip_prefix(' ').unwrap_or(value))
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| unescape_line(value))
}

fn parse_findings(section: &str) -> Result<Vec<Finding>, DocumentError> {
    let mut findings = Vec::new();
    let mut lines = section.lines().filter(|l| !l.is_empty());
    while let Some(first) = lines.next() {
        let item = field(Some(first), "- item:")?;
        let url = field(lines.next(), "  url:")?;
        let snippet = field(lines.next(), "  snippet:")?;
        findings.push(Finding {
            item: unescape_line(item),
            url: optional(url),
            snippet: optional(snippet),
        });
    }
    Ok(findings)
}

/// Lightweight front matter reader used when listing documents.
pub fn parse_frontmatter(content: &str) -> Option<serde_yaml::Value> {
    let rest = content.strip_prefix("---\n")?;
    let end = rest.find("\n---\n")?;
    serde_yaml::from_str(&rest[..end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        let mut task = Task::new(
            "Find flights: Tokyo",
            "Find flight options: Trip to Tokyo, 5 days in Nov, budget $1500",
            vec!["Use reputable travel sites".into(), "Include 2+ options".into()],
        )
        .with_input("origin", "SFO");
        task.push_progress("created");
        task.transition(TaskStatus::InProgress).unwrap();
        task.push_progress("worker started with budget 60s");
        task.push_finding(
            Finding::new("ANA fares")
                .with_url("https://ana.example/fares")
                .with_snippet("Round trip: $900\n---\nsee terms"),
        );
        task.push_finding(Finding::new("No link"));
        task.replace_summary("- ANA fares (https://ana.example/fares)");
        task
    }

    #[test]
    fn test_render_layout() {
        let task = sample();
        let doc = render(&task).unwrap();
        assert!(doc.starts_with("---\nid: "));
        let order = [
            "\nstatus: in_progress\n",
            "\nowner: null\n",
            "\ncreated: ",
            "\nupdated: ",
            "\ntitle: ",
            "\nobjective: ",
            "\ninputs:",
            "\nconstraints:",
            "\nplan:",
            "\n---\n\n## Progress\n",
            "\n\n## Findings\n- item: ANA fares\n  url: https://ana.example/fares\n  snippet: Round trip: $900\\n---\\nsee terms\n- item: No link\n  url: \n  snippet: \n\n## Citations\n- https://ana.example/fares\n\n## Summary\n",
        ];
        let mut cursor = 0;
        for needle in order {
            let pos = doc[cursor..].find(needle).unwrap_or_else(|| panic!("missing {:?}", needle));
            cursor += pos + needle.len();
        }
        assert!(doc.ends_with("## Summary\n- ANA fares (https://ana.example/fares)\n"));
    }

    #[test]
    fn test_empty_progress_renders_placeholder() {
        let task = Task::new("t", "o", vec![]);
        let doc = render(&task).unwrap();
        assert!(doc.contains("## Progress\n- created\n\n## Findings\n\n\n## Citations\n\n\n## Summary\n\n"));
        let parsed = parse(&doc).unwrap();
        assert!(parsed.progress_log().is_empty());
        assert_eq!(parsed, task);
    }

    #[test]
    fn test_render_is_deterministic() {
        let task = sample();
        assert_eq!(render(&task).unwrap(), render(&task).unwrap());
        assert_eq!(render(&task.clone()).unwrap(), render(&task).unwrap());
    }

    #[test]
    fn test_round_trip_recovers_task() {
        let task = sample();
        let parsed = parse(&render(&task).unwrap()).unwrap();
        assert_eq!(parsed, task);
        assert_eq!(render(&parsed).unwrap(), render(&task).unwrap());
    }

    #[test]
    fn test_hostile_text_round_trips() {
        let snippet = "price: $900\n---\n## Summary\nback\\slash\r\nend";
        let mut task = Task::new(
            "---\ntitle: injected",
            "objective: with colon\n---\nand delimiter",
            vec!["- dash".into(), "---".into()],
        )
        .with_owner("ops: team")
        .with_input("note", "---\n## Progress");
        task.push_progress("line one\n---\n- 2024-01-01T00:00:00Z - fake");
        task.push_finding(
            Finding::new("item: with colon\n  url: fake")
                .with_url("https://x.example/?a=b - c")
                .with_snippet(snippet),
        );
        task.replace_summary("---\n## Progress\n- created\n\ntrailing\n");

        let doc = render(&task).unwrap();
        let parsed = parse(&doc).unwrap();
        assert_eq!(parsed.findings()[0].snippet.as_deref(), Some(snippet));
        assert_eq!(parsed.title(), "---\ntitle: injected");
        assert_eq!(parsed.owner(), Some("ops: team"));
        assert_eq!(parsed.summary(), Some("---\n## Progress\n- created\n\ntrailing\n"));
        assert_eq!(parsed, task);
    }

    #[test]
    fn test_hand_edited_inputs_keep_their_types() {
        let doc = render(&sample()).unwrap();
        assert!(doc.contains("\ninputs:\n  origin: SFO\n"));
        let edited = doc.replace(
            "\ninputs:\n  origin: SFO\n",
            "\ninputs:\n  origin: SFO\n  nights: 5\n  travellers:\n    adults: 2\n    names:\n    - Ana\n    - Ben\n",
        );

        let parsed = parse(&edited).unwrap();
        let inputs = parsed.inputs();
        assert_eq!(inputs["origin"].as_str(), Some("SFO"));
        assert_eq!(inputs["nights"].as_u64(), Some(5));
        assert_eq!(inputs["travellers"]["adults"].as_u64(), Some(2));
        assert_eq!(inputs["travellers"]["names"][1].as_str(), Some("Ben"));
        assert_eq!(parse(&render(&parsed).unwrap()).unwrap(), parsed);
    }

    #[test]
    fn test_escape_round_trip() {
        for value in ["", "plain", "a\\nb", "\\", "\n\r\\\n", "tab\tok", "ünïcødé\n"] {
            let escaped = escape_line(value);
            assert!(!escaped.contains('\n') && !escaped.contains('\r'));
            assert_eq!(unescape_line(&escaped), value);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("no front matter").is_err());
        assert!(parse("---\nid: x\n").is_err());
        let doc = render(&sample()).unwrap();
        let broken = doc.replace("## Citations", "## Sources");
        assert!(parse(&broken).is_err());
    }

    #[test]
    fn test_parse_frontmatter_fields() {
        let doc = render(&sample()).unwrap();
        let fm = parse_frontmatter(&doc).unwrap();
        assert_eq!(fm.get("status").and_then(|v| v.as_str()), Some("in_progress"));
        assert!(parse_frontmatter("plain text").is_none());
    }
}
