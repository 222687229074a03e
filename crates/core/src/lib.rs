//! Core normalization logic for tabular conversation exports.
//!
//! This crate converts conversation logs of several input shapes (an
//! already-conforming task table, a generic chat export with role/content
//! columns, or an arbitrary table requiring column inference) into one
//! normalized task table with input/output/session columns.

mod convert;
mod error;
mod frame;
mod helpers;
pub mod infer;
pub mod pipeline;

pub use convert::{chat_to_tasks, normalize, NormalizeOptions};
pub use error::LoaderError;
pub use frame::Frame;
pub use helpers::{clean_text, looks_like_timestamp, normalize_column_name, value_text};
pub use infer::{ChatColumnMapping, HeuristicInference, RoleValueMapping, TaskColumnMapping};
pub use pipeline::{
    discover_input_files, process_all_files, process_file, write_jsonl_output, FileResult,
    PipelineResult,
};

/// Columns that make a table an already-conforming task table.
pub const REQUIRED_TASK_COLUMNS: &[&str] = &["input"];

/// Columns that make a table a generic chat export.
pub const REQUIRED_CHAT_COLUMNS: &[&str] = &["content", "role", "created_at", "conversation_id"];

/// Input text used for tasks whose conversation opens with an assistant turn.
pub const NO_INPUT_PLACEHOLDER: &str = "(no input)";

/// Trait for schema-mapping operations.
///
/// Implementors decide which source columns (and which role labels)
/// correspond to the canonical chat and task columns. A production
/// deployment backs this with an LLM whose JSON responses deserialize
/// into the mapping structs; [`HeuristicInference`] provides a
/// rule-based fallback.
pub trait SchemaInference {
    /// Map source columns onto the chat columns
    /// (content/role/created_at/conversation_id).
    fn map_chat_columns(&self, frame: &Frame) -> Result<ChatColumnMapping, LoaderError>;

    /// Map source role labels onto the canonical "user" and "assistant" labels.
    fn map_role_values(&self, frame: &Frame) -> Result<RoleValueMapping, LoaderError>;

    /// Map source columns onto the task columns
    /// (input/output/created_at/task_id/session_id).
    fn map_task_columns(&self, frame: &Frame) -> Result<TaskColumnMapping, LoaderError>;
}

// Blanket implementation for references to SchemaInference
impl<T: SchemaInference + ?Sized> SchemaInference for &T {
    fn map_chat_columns(&self, frame: &Frame) -> Result<ChatColumnMapping, LoaderError> {
        (*self).map_chat_columns(frame)
    }

    fn map_role_values(&self, frame: &Frame) -> Result<RoleValueMapping, LoaderError> {
        (*self).map_role_values(frame)
    }

    fn map_task_columns(&self, frame: &Frame) -> Result<TaskColumnMapping, LoaderError> {
        (*self).map_task_columns(frame)
    }
}
