//! Artifact sink traits and types
//!
//! This module defines the trait interface for artifact sinks and the data
//! every sink receives at the end of a run.

use crate::crawler::RunReport;
use crate::records::JobRecord;
use crate::shard::ShardStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// One shard's line in the shard performance report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardReportRow {
    pub exp_level: String,
    pub job_type: String,
    pub workplace_type: String,
    pub labels: String,
    pub status: ShardStatus,
    pub job_count: usize,
    pub new_jobs: usize,
    pub pages_fetched: u32,
    pub attempts: u32,
}

/// Shard key to its report row
pub type ShardReport = BTreeMap<String, ShardReportRow>;

/// Everything a sink writes for one run
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    /// Run state, as displayed
    pub state: String,

    /// Deduplicated records, sorted by job id
    pub records: Vec<JobRecord>,

    pub shard_report: ShardReport,

    /// Job id to the shard keys it was found under
    pub mappings: BTreeMap<String, Vec<String>>,
}

impl RunArtifacts {
    pub fn from_report(report: &RunReport) -> Self {
        let shard_report = report
            .shards
            .iter()
            .map(|entry| {
                let row = ShardReportRow {
                    exp_level: entry.shard.experience_code.clone(),
                    job_type: entry.shard.job_type_code.clone(),
                    workplace_type: entry.shard.workplace_code.clone(),
                    labels: entry.shard.labels(),
                    status: entry.status,
                    job_count: entry.stats.job_count,
                    new_jobs: entry.stats.new_jobs,
                    pages_fetched: entry.stats.pages_fetched,
                    attempts: entry.stats.attempts,
                };
                (entry.shard.key(), row)
            })
            .collect();

        Self {
            state: report.state.to_string(),
            records: report.records.clone(),
            shard_report,
            mappings: report.mappings.clone(),
        }
    }
}

/// Destination for the finished record set and shard analytics
pub trait ArtifactSink {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    /// Writes the artifacts, replacing whatever the sink held before
    fn write(&self, artifacts: &RunArtifacts) -> OutputResult<()>;
}
