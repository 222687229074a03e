//! CLI tool for normalizing tabular conversation exports.
//!
//! This tool walks a directory of CSV/JSONL export files, detects each
//! file's shape, and writes the normalized tasks as JSONL. Column inference
//! uses the rule-based backend; an LLM-backed `SchemaInference` can be
//! substituted when embedding the core crate.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use task_loader_core::{
    process_all_files, write_jsonl_output, HeuristicInference, NormalizeOptions, PipelineResult,
    NO_INPUT_PLACEHOLDER,
};

/// Normalize conversation export files into the task format.
#[derive(Parser, Debug)]
#[command(name = "task-loader")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory containing CSV/JSONL export files
    #[arg(long)]
    input_root: PathBuf,

    /// Output directory for the normalized tasks
    #[arg(long)]
    output_dir: PathBuf,

    /// Input text used when a conversation opens with an assistant turn
    #[arg(long, default_value = NO_INPUT_PLACEHOLDER)]
    placeholder: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let options = NormalizeOptions {
        placeholder: args.placeholder.clone(),
    };

    println!("Processing export files from {:?}...", args.input_root);
    let results = process_all_files(&args.input_root, &HeuristicInference, &options)?;

    let total_files = results.len();
    println!("Processed {} files", total_files);

    println!("Writing output to {:?}...", args.output_dir);
    let result: PipelineResult = write_jsonl_output(results, &args.output_dir)?;

    let metadata_path = args.output_dir.join("metadata.json");
    let metadata = serde_json::json!({
        "config": {
            "input_root": args.input_root.to_string_lossy(),
            "output_dir": args.output_dir.to_string_lossy(),
            "placeholder": args.placeholder,
        },
        "counts": {
            "total_files": result.total_files,
            "converted_files": result.converted_files,
            "skipped_files": result.skipped_files,
            "total_tasks": result.total_tasks,
        },
        "files": {
            "tasks_path": args.output_dir.join("tasks.jsonl").to_string_lossy(),
        },
    });
    std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    println!("\n[summary]");
    println!("  Files processed: {}", result.total_files);
    println!("  Files converted: {}", result.converted_files);
    println!("  Files skipped (no mapping): {}", result.skipped_files);
    println!("  Tasks written: {}", result.total_tasks);
    println!("  Output: {:?}", args.output_dir.join("tasks.jsonl"));
    println!("  Metadata: {:?}", metadata_path);

    Ok(())
}
