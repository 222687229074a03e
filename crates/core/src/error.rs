//! Error type for loading and normalization.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("jsonl line {0} is not a JSON object")]
    JsonlRecord(usize),

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("row has {got} cells but frame has {expected} columns")]
    RowWidth { expected: usize, got: usize },

    /// Reported by `SchemaInference` implementations that can fail, such
    /// as an LLM-backed mapper whose request or response handling errors.
    /// The in-tree `HeuristicInference` is infallible and never emits it.
    #[error("schema inference failed: {0}")]
    Inference(String),

    #[error("no input files found under {0:?}")]
    NoInputFiles(PathBuf),
}
