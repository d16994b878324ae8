//! Output module for scrape artifacts and summaries
//!
//! This module handles:
//! - Writing the deduplicated records, shard report, and mappings
//! - Optional SQLite export of the same data
//! - Generating markdown summaries and printable statistics

mod json_output;
mod markdown;
mod sqlite_output;
pub mod stats;
mod traits;

pub use json_output::{
    load_history, load_jobs, load_mappings, load_shard_report, write_json, JsonArtifactSink,
};
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use sqlite_output::SqliteArtifactSink;
pub use stats::{compute_statistics, load_statistics, print_statistics, ScrapeStatistics};
pub use traits::{
    ArtifactSink, OutputError, OutputResult, RunArtifacts, ShardReport, ShardReportRow,
};

use crate::config::OutputConfig;
use crate::crawler::RunReport;
use std::path::Path;

/// Writes every configured artifact for a finished run
///
/// The JSON files are always written; the SQLite export only when a
/// database path is configured. The markdown summary comes last.
///
/// # Arguments
///
/// * `report` - The run report from the orchestrator
/// * `output` - Output paths from the configuration
///
/// # Returns
///
/// * `Ok(RunArtifacts)` - The artifacts that were written
/// * `Err(OutputError)` - A sink failed
pub fn export_run(report: &RunReport, output: &OutputConfig) -> OutputResult<RunArtifacts> {
    let artifacts = RunArtifacts::from_report(report);

    let mut sinks: Vec<Box<dyn ArtifactSink>> = vec![Box::new(JsonArtifactSink::new(output))];
    if let Some(path) = &output.database_path {
        sinks.push(Box::new(SqliteArtifactSink::new(path)));
    }

    for sink in &sinks {
        sink.write(&artifacts)?;
        tracing::info!(
            "Wrote {} records via {} sink",
            artifacts.records.len(),
            sink.name()
        );
    }

    let stats = compute_statistics(&artifacts.records, &artifacts.shard_report);
    generate_markdown_summary(&stats, Some(&artifacts.state), Path::new(&output.summary_path))?;
    tracing::info!("Summary written to {}", output.summary_path);

    Ok(artifacts)
}
