//! Pipeline for normalizing export files into task records.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::convert::{normalize, NormalizeOptions};
use crate::error::LoaderError;
use crate::frame::Frame;
use crate::SchemaInference;

/// Result of normalizing a single file. `tasks` is `None` when no mapping
/// to the task format was found.
#[derive(Debug)]
pub struct FileResult {
    pub tasks: Option<Frame>,
    pub source_path: String,
}

/// Result of processing all files.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub total_files: usize,
    pub converted_files: usize,
    pub skipped_files: usize,
    pub total_tasks: usize,
}

/// Discover all CSV and JSONL files in a directory.
pub fn discover_input_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == "csv" || ext == "jsonl")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

/// Normalize a single export file. The reader is picked by extension
/// (`.jsonl` as JSON lines, anything else as CSV).
pub fn process_file<I>(
    path: &Path,
    inference: &I,
    options: &NormalizeOptions,
) -> Result<Option<Frame>, LoaderError>
where
    I: SchemaInference,
{
    let frame = if path.extension().map_or(false, |ext| ext == "jsonl") {
        Frame::from_jsonl_path(path)?
    } else {
        Frame::from_csv_path(path)?
    };
    normalize(frame, inference, options)
}

/// Normalize all export files under a directory in parallel.
///
/// Uses rayon. The inference backend must be `Sync + Send` to be shared
/// across threads.
pub fn process_all_files<I>(
    root: &Path,
    inference: &I,
    options: &NormalizeOptions,
) -> Result<Vec<FileResult>, LoaderError>
where
    I: SchemaInference + Sync + Send,
{
    let files = discover_input_files(root);

    if files.is_empty() {
        return Err(LoaderError::NoInputFiles(root.to_path_buf()));
    }

    let total_files = files.len();
    let processed_count = AtomicUsize::new(0);
    let error_count = AtomicUsize::new(0);

    let results: Vec<FileResult> = files
        .into_par_iter()
        .filter_map(|path| {
            let result = process_file(&path, inference, options);
            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            match result {
                Ok(tasks) => {
                    if count % 100 == 0 || count == total_files {
                        info!("processed {}/{} files", count, total_files);
                    }
                    Some(FileResult {
                        tasks,
                        source_path: path.to_string_lossy().to_string(),
                    })
                }
                Err(e) => {
                    error_count.fetch_add(1, Ordering::Relaxed);
                    warn!("error processing {:?}: {}", path, e);
                    None
                }
            }
        })
        .collect();

    let errors = error_count.load(Ordering::Relaxed);
    if errors > 0 {
        warn!("{} files failed to process", errors);
    }

    Ok(results)
}

/// Write normalized tasks to `tasks.jsonl` in the output directory,
/// one JSON object per task row.
pub fn write_jsonl_output(
    results: Vec<FileResult>,
    output_dir: &Path,
) -> Result<PipelineResult, LoaderError> {
    use std::fs::File;
    use std::io::{BufWriter, Write};

    std::fs::create_dir_all(output_dir)?;

    let tasks_path = output_dir.join("tasks.jsonl");
    let mut file = BufWriter::new(File::create(&tasks_path)?);

    let mut total_files = 0;
    let mut converted_files = 0;
    let mut skipped_files = 0;
    let mut total_tasks = 0;

    for result in results {
        total_files += 1;
        let Some(tasks) = result.tasks else {
            warn!("no task mapping found for {}", result.source_path);
            skipped_files += 1;
            continue;
        };
        converted_files += 1;

        for row in 0..tasks.len() {
            let Some(object) = tasks.row_object(row) else {
                continue;
            };
            let json_line = serde_json::to_string(&object)?;
            writeln!(file, "{}", json_line)?;
            total_tasks += 1;
        }
    }

    file.flush()?;

    Ok(PipelineResult {
        total_files,
        converted_files,
        skipped_files,
        total_tasks,
    })
}
