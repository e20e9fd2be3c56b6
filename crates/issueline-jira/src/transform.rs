//! Record normalization: raw nested JIRA issues → flat target schema.
//!
//! Pure functions, no I/O. A record that cannot be repaired (no key, no
//! field container) normalizes to `None` and is dropped by the writer;
//! every absent optional field degrades to a defined default.

use serde::Serialize;
use serde_json::Value;

/// Upper bound on any cleaned text field, to bound output line size.
pub const MAX_TEXT_LEN: usize = 10_000;

/// Comments kept per record, in original order.
pub const MAX_COMMENTS: usize = 10;

/// Static downstream-processing instructions, identical on every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedTasks {
    pub summarization: &'static str,
    pub classification: &'static str,
    pub qna: &'static str,
    pub code_analysis: &'static str,
}

impl Default for DerivedTasks {
    fn default() -> Self {
        Self {
            summarization: "Summarize the issue and comments.",
            classification: "Classify the issue type and priority.",
            qna: "Generate Q&A pairs from description and comments.",
            code_analysis: "Analyze any code snippets or technical details.",
        }
    }
}

/// One issue in the flat output schema, serialized as one JSONL line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub reporter: String,
    pub assignee: Option<String>,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub comments: Vec<String>,
    pub derived_tasks: DerivedTasks,
}

/// Map one raw issue to the flat schema, or `None` when the issue lacks
/// a key or a `fields` object entirely.
pub fn normalize(record: &Value) -> Option<NormalizedRecord> {
    let key = record["key"].as_str().filter(|k| !k.is_empty())?;
    let fields = record.get("fields")?.as_object()?;

    let text = |name: &str| clean_text(fields.get(name).and_then(Value::as_str).unwrap_or(""));
    let display_name = |name: &str| {
        fields
            .get(name)
            .and_then(|v| v["displayName"].as_str())
            .map(String::from)
    };
    let timestamp = |name: &str| fields.get(name).and_then(Value::as_str).map(String::from);

    Some(NormalizedRecord {
        id: key.to_string(),
        title: text("summary"),
        description: text("description"),
        status: fields
            .get("status")
            .and_then(|v| v["name"].as_str())
            .unwrap_or("Unknown")
            .to_string(),
        reporter: display_name("reporter").unwrap_or_else(|| "Unknown".to_string()),
        assignee: display_name("assignee"),
        created: timestamp("created"),
        updated: timestamp("updated"),
        comments: extract_comments(fields.get("comment")),
        derived_tasks: DerivedTasks::default(),
    })
}

/// First `MAX_COMMENTS` non-empty cleaned comment bodies, in order.
fn extract_comments(comment_field: Option<&Value>) -> Vec<String> {
    let Some(comments) = comment_field.and_then(|v| v["comments"].as_array()) else {
        return Vec::new();
    };
    comments
        .iter()
        .map(|c| clean_text(c["body"].as_str().unwrap_or("")))
        .filter(|body| !body.is_empty())
        .take(MAX_COMMENTS)
        .collect()
}

/// Clean free text: every whitespace run (tabs, CR/LF variants included)
/// collapses to a single space, ends are trimmed, and the result is
/// capped at [`MAX_TEXT_LEN`] characters. Idempotent.
pub fn clean_text(text: &str) -> String {
    let mut cleaned = {
        let words: Vec<&str> = text.split_whitespace().collect();
        words.join(" ")
    };
    if let Some((idx, _)) = cleaned.char_indices().nth(MAX_TEXT_LEN) {
        cleaned.truncate(idx);
        // Truncation may expose a trailing space
        cleaned.truncate(cleaned.trim_end().len());
    }
    cleaned
}
