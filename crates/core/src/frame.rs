//! Loosely-typed in-memory table for conversation exports.
//!
//! Exports arrive with arbitrary column names and mixed cell types, so the
//! frame stores cells as `serde_json::Value` and indexes them by column name.

use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::LoaderError;

/// An ordered set of named columns plus rows of loosely-typed cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    /// Create an empty frame with the given column names.
    pub fn new(columns: Vec<String>) -> Result<Self, LoaderError> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(LoaderError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a row. Short rows are padded with nulls; rows wider than the
    /// frame are rejected.
    pub fn push_row(&mut self, mut cells: Vec<Value>) -> Result<(), LoaderError> {
        if cells.len() > self.columns.len() {
            return Err(LoaderError::RowWidth {
                expected: self.columns.len(),
                got: cells.len(),
            });
        }
        cells.resize(self.columns.len(), Value::Null);
        self.rows.push(cells);
        Ok(())
    }

    /// Cell at (row, column), if both exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Rename a column in place. Renaming onto an existing column name is
    /// rejected; renaming a column to itself is a no-op.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), LoaderError> {
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(LoaderError::DuplicateColumn(to.to_string()));
        }
        let idx = self
            .column_index(from)
            .ok_or_else(|| LoaderError::MissingColumn(from.to_string()))?;
        self.columns[idx] = to.to_string();
        Ok(())
    }

    pub fn rename_columns(&mut self, pairs: &[(&str, &str)]) -> Result<(), LoaderError> {
        for (from, to) in pairs {
            self.rename_column(from, to)?;
        }
        Ok(())
    }

    /// Whether a column holds at least one non-empty cell. False when the
    /// column is absent, the frame has no rows, or every cell is null or an
    /// empty string.
    pub fn column_is_populated(&self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.rows.iter().any(|row| match &row[idx] {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
    }

    /// Replace string cells equal to `from` with `to` in the given column.
    pub fn replace_in_column(&mut self, name: &str, from: &str, to: &str) -> Result<(), LoaderError> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| LoaderError::MissingColumn(name.to_string()))?;
        for row in &mut self.rows {
            if row[idx].as_str() == Some(from) {
                row[idx] = Value::String(to.to_string());
            }
        }
        Ok(())
    }

    /// Distinct string values of a column, in first-seen order.
    pub fn distinct_strings(&self, name: &str) -> Vec<String> {
        let Some(idx) = self.column_index(name) else {
            return Vec::new();
        };
        let mut seen: Vec<String> = Vec::new();
        for row in &self.rows {
            if let Value::String(s) = &row[idx] {
                if !seen.iter().any(|v| v == s) {
                    seen.push(s.clone());
                }
            }
        }
        seen
    }

    /// A row as a JSON object, skipping null cells.
    pub fn row_object(&self, row: usize) -> Option<Map<String, Value>> {
        let cells = self.rows.get(row)?;
        let mut object = Map::new();
        for (name, cell) in self.columns.iter().zip(cells) {
            if !cell.is_null() {
                object.insert(name.clone(), cell.clone());
            }
        }
        Some(object)
    }

    /// Read a frame from a CSV file.
    pub fn from_csv_path(path: &Path) -> Result<Self, LoaderError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Read a frame from CSV data. Duplicate headers keep the first
    /// occurrence; cells under later duplicates are dropped.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, LoaderError> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();

        let mut columns: Vec<String> = Vec::new();
        let mut keep: Vec<bool> = Vec::new();
        for header in headers.iter() {
            let duplicate = columns.iter().any(|c| c == header);
            keep.push(!duplicate);
            if !duplicate {
                columns.push(header.to_string());
            }
        }

        let mut frame = Self::new(columns)?;
        for record in reader.records() {
            let record = record?;
            let cells: Vec<Value> = record
                .iter()
                .zip(&keep)
                .filter(|(_, keep)| **keep)
                .map(|(cell, _)| Value::String(cell.to_string()))
                .collect();
            frame.push_row(cells)?;
        }
        Ok(frame)
    }

    /// Read a frame from a JSONL file.
    pub fn from_jsonl_path(path: &Path) -> Result<Self, LoaderError> {
        let file = std::fs::File::open(path)?;
        Self::from_jsonl_reader(file)
    }

    /// Read a frame from JSONL data, one object per line. Columns are the
    /// union of all object keys, in first-seen order; missing keys read as
    /// null. Blank lines are skipped.
    pub fn from_jsonl_reader<R: Read>(reader: R) -> Result<Self, LoaderError> {
        let reader = BufReader::new(reader);

        let mut columns: Vec<String> = Vec::new();
        let mut objects: Vec<Map<String, Value>> = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(&line)?;
            let Value::Object(object) = value else {
                return Err(LoaderError::JsonlRecord(line_no + 1));
            };
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
            objects.push(object);
        }

        let mut frame = Self::new(columns)?;
        for mut object in objects {
            let cells: Vec<Value> = frame
                .columns
                .iter()
                .map(|column| object.remove(column).unwrap_or(Value::Null))
                .collect();
            frame.rows.push(cells);
        }
        Ok(frame)
    }
}
