//! JSON artifact files
//!
//! Writes and reads back the three run artifacts:
//! - jobs: the deduplicated records, sorted by job id
//! - shard report: per-shard counts and statuses
//! - mappings: job id to shard keys
//!
//! A previous shard report doubles as the yield history that orders the
//! next run's plan.

use crate::config::OutputConfig;
use crate::output::traits::{ArtifactSink, OutputResult, RunArtifacts, ShardReport};
use crate::records::JobRecord;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Writes the artifacts as pretty-printed JSON files
#[derive(Debug, Clone)]
pub struct JsonArtifactSink {
    jobs_path: PathBuf,
    shard_report_path: PathBuf,
    mappings_path: PathBuf,
}

impl JsonArtifactSink {
    pub fn new(output: &OutputConfig) -> Self {
        Self {
            jobs_path: PathBuf::from(&output.jobs_path),
            shard_report_path: PathBuf::from(&output.shard_report_path),
            mappings_path: PathBuf::from(&output.mappings_path),
        }
    }
}

impl ArtifactSink for JsonArtifactSink {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write(&self, artifacts: &RunArtifacts) -> OutputResult<()> {
        write_json(&self.jobs_path, &artifacts.records)?;
        write_json(&self.shard_report_path, &artifacts.shard_report)?;
        write_json(&self.mappings_path, &artifacts.mappings)?;
        Ok(())
    }
}

/// Serializes `value` to `path`, creating parent directories
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> OutputResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> OutputResult<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

pub fn load_jobs(path: &Path) -> OutputResult<Vec<JobRecord>> {
    read_json(path)
}

pub fn load_shard_report(path: &Path) -> OutputResult<ShardReport> {
    read_json(path)
}

pub fn load_mappings(path: &Path) -> OutputResult<BTreeMap<String, Vec<String>>> {
    read_json(path)
}

/// Reads prior job counts per shard key from a previous shard report
///
/// A missing file means no history. An unreadable one is logged and also
/// treated as no history, so the plan falls back to its default order.
pub fn load_history(path: &Path) -> Option<HashMap<String, u64>> {
    match load_shard_report(path) {
        Ok(report) => {
            tracing::info!(
                "Loaded yield history for {} shards from {}",
                report.len(),
                path.display()
            );
            Some(
                report
                    .into_iter()
                    .map(|(key, row)| (key, row.job_count as u64))
                    .collect(),
            )
        }
        Err(crate::output::OutputError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("No yield history at {}", path.display());
            None
        }
        Err(e) => {
            tracing::warn!(
                "Ignoring unreadable yield history {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}
