//! Column-mapping structures and the rule-based inference fallback.
//!
//! The mapping structs are the transient results of the three
//! [`SchemaInference`](crate::SchemaInference) operations. All fields are
//! optional and `Deserialize`, so an LLM-backed implementation can
//! deserialize its JSON responses directly into them.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::LoaderError;
use crate::frame::Frame;
use crate::helpers::{looks_like_timestamp, normalize_column_name};
use crate::SchemaInference;

/// Which source columns carry the chat export columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChatColumnMapping {
    pub content: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<String>,
    pub conversation_id: Option<String>,
}

impl ChatColumnMapping {
    pub fn is_complete(&self) -> bool {
        self.content.is_some()
            && self.role.is_some()
            && self.created_at.is_some()
            && self.conversation_id.is_some()
    }

    /// (source column, canonical name) pairs for every mapped field.
    pub fn rename_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        if let Some(c) = &self.content {
            pairs.push((c.as_str(), "content"));
        }
        if let Some(c) = &self.role {
            pairs.push((c.as_str(), "role"));
        }
        if let Some(c) = &self.created_at {
            pairs.push((c.as_str(), "created_at"));
        }
        if let Some(c) = &self.conversation_id {
            pairs.push((c.as_str(), "conversation_id"));
        }
        pairs
    }
}

/// Which source role labels mean "user" and "assistant".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoleValueMapping {
    pub user: Option<String>,
    pub assistant: Option<String>,
}

impl RoleValueMapping {
    pub fn is_complete(&self) -> bool {
        self.user.is_some() && self.assistant.is_some()
    }
}

/// Which source columns carry the task columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskColumnMapping {
    pub input: Option<String>,
    pub output: Option<String>,
    pub created_at: Option<String>,
    pub task_id: Option<String>,
    pub session_id: Option<String>,
}

impl TaskColumnMapping {
    /// (source column, canonical name) pairs for every mapped field.
    pub fn rename_pairs(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        if let Some(c) = &self.input {
            pairs.push((c.as_str(), "input"));
        }
        if let Some(c) = &self.output {
            pairs.push((c.as_str(), "output"));
        }
        if let Some(c) = &self.created_at {
            pairs.push((c.as_str(), "created_at"));
        }
        if let Some(c) = &self.task_id {
            pairs.push((c.as_str(), "task_id"));
        }
        if let Some(c) = &self.session_id {
            pairs.push((c.as_str(), "session_id"));
        }
        pairs
    }
}

// Synonym sets, normalized per normalize_column_name
const CONTENT_SYNONYMS: &[&str] = &[
    "content",
    "message",
    "text",
    "body",
    "messagecontent",
    "messagetext",
    "utterance",
];
const ROLE_SYNONYMS: &[&str] = &[
    "role",
    "sender",
    "speaker",
    "author",
    "side",
    "from",
    "participant",
];
const CREATED_AT_SYNONYMS: &[&str] = &[
    "createdat",
    "timestamp",
    "time",
    "date",
    "datetime",
    "created",
    "sentat",
];
const SESSION_SYNONYMS: &[&str] = &[
    "conversationid",
    "sessionid",
    "chatid",
    "threadid",
    "dialogid",
    "conversation",
    "session",
    "thread",
];
const INPUT_SYNONYMS: &[&str] = &[
    "input",
    "prompt",
    "question",
    "query",
    "userinput",
    "usermessage",
    "request",
];
const OUTPUT_SYNONYMS: &[&str] = &[
    "output",
    "response",
    "answer",
    "completion",
    "reply",
    "assistantmessage",
];
const TASK_ID_SYNONYMS: &[&str] = &["taskid", "messageid", "id", "uid"];

// Role labels, compared case-insensitively
const USER_LABELS: &[&str] = &["user", "human", "customer", "client", "member", "visitor"];
const ASSISTANT_LABELS: &[&str] = &["assistant", "ai", "bot", "agent", "model", "chatbot"];

/// Rule-based schema inference.
///
/// Matches column names against synonym sets after normalization, falls
/// back to value-shape detection for timestamp columns, and recognizes
/// common role labels. Used by the CLI and as the no-LLM path; a
/// production deployment substitutes an LLM-backed implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicInference;

impl HeuristicInference {
    fn match_column(frame: &Frame, synonyms: &[&str]) -> Option<String> {
        frame
            .columns()
            .iter()
            .find(|column| synonyms.contains(&normalize_column_name(column).as_str()))
            .cloned()
    }

    /// First column whose first non-null cell looks like a timestamp.
    fn timestamp_column(frame: &Frame) -> Option<String> {
        for column in frame.columns() {
            for row in 0..frame.len() {
                match frame.get(row, column) {
                    Some(Value::Null) => continue,
                    Some(value) => {
                        if looks_like_timestamp(value) {
                            return Some(column.clone());
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
        None
    }

    fn match_label(labels: &[String], known: &[&str]) -> Option<String> {
        labels
            .iter()
            .find(|label| known.contains(&label.trim().to_ascii_lowercase().as_str()))
            .cloned()
    }
}

impl SchemaInference for HeuristicInference {
    fn map_chat_columns(&self, frame: &Frame) -> Result<ChatColumnMapping, LoaderError> {
        let mapping = ChatColumnMapping {
            content: Self::match_column(frame, CONTENT_SYNONYMS),
            role: Self::match_column(frame, ROLE_SYNONYMS),
            created_at: Self::match_column(frame, CREATED_AT_SYNONYMS)
                .or_else(|| Self::timestamp_column(frame)),
            conversation_id: Self::match_column(frame, SESSION_SYNONYMS),
        };
        debug!(?mapping, "heuristic chat column mapping");
        Ok(mapping)
    }

    fn map_role_values(&self, frame: &Frame) -> Result<RoleValueMapping, LoaderError> {
        let labels = frame.distinct_strings("role");
        let mapping = RoleValueMapping {
            user: Self::match_label(&labels, USER_LABELS),
            assistant: Self::match_label(&labels, ASSISTANT_LABELS),
        };
        debug!(?mapping, "heuristic role value mapping");
        Ok(mapping)
    }

    fn map_task_columns(&self, frame: &Frame) -> Result<TaskColumnMapping, LoaderError> {
        let mapping = TaskColumnMapping {
            input: Self::match_column(frame, INPUT_SYNONYMS),
            output: Self::match_column(frame, OUTPUT_SYNONYMS),
            created_at: Self::match_column(frame, CREATED_AT_SYNONYMS)
                .or_else(|| Self::timestamp_column(frame)),
            task_id: Self::match_column(frame, TASK_ID_SYNONYMS),
            session_id: Self::match_column(frame, SESSION_SYNONYMS),
        };
        debug!(?mapping, "heuristic task column mapping");
        Ok(mapping)
    }
}
