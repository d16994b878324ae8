//! SQLite artifact sink
//!
//! This module writes the finished record set and shard analytics into a
//! SQLite database for downstream querying. Each run replaces the previous
//! contents in one transaction.

use crate::output::traits::{ArtifactSink, OutputResult, RunArtifacts};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS jobs (
    job_id          TEXT PRIMARY KEY,
    title           TEXT NOT NULL,
    company_name    TEXT NOT NULL,
    posted_at       TEXT,
    is_repost       INTEGER NOT NULL,
    apply_url       TEXT NOT NULL,
    source_channel  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS job_shards (
    job_id      TEXT NOT NULL REFERENCES jobs(job_id) ON DELETE CASCADE,
    shard_key   TEXT NOT NULL,
    PRIMARY KEY (job_id, shard_key)
);

CREATE INDEX IF NOT EXISTS idx_job_shards_shard ON job_shards(shard_key);

CREATE TABLE IF NOT EXISTS shard_stats (
    shard_key       TEXT PRIMARY KEY,
    exp_level       TEXT NOT NULL,
    job_type        TEXT NOT NULL,
    workplace_type  TEXT NOT NULL,
    labels          TEXT NOT NULL,
    status          TEXT NOT NULL,
    job_count       INTEGER NOT NULL,
    new_jobs        INTEGER NOT NULL,
    pages_fetched   INTEGER NOT NULL,
    attempts        INTEGER NOT NULL
);
";

/// SQLite-based artifact sink
pub struct SqliteArtifactSink {
    path: PathBuf,
}

impl SqliteArtifactSink {
    /// Creates a sink writing to the database at `path`
    ///
    /// The database and its tables are created on first write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> OutputResult<Connection> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }
}

impl ArtifactSink for SqliteArtifactSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn write(&self, artifacts: &RunArtifacts) -> OutputResult<()> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;

        tx.execute_batch(
            "
            DELETE FROM job_shards;
            DELETE FROM jobs;
            DELETE FROM shard_stats;
        ",
        )?;

        {
            let mut insert_job = tx.prepare(
                "INSERT INTO jobs
                    (job_id, title, company_name, posted_at, is_repost, apply_url, source_channel)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut insert_membership =
                tx.prepare("INSERT INTO job_shards (job_id, shard_key) VALUES (?1, ?2)")?;

            for record in &artifacts.records {
                insert_job.execute(params![
                    record.job_id,
                    record.title,
                    record.company_name,
                    record.posted_at.map(|t| t.to_rfc3339()),
                    record.is_repost,
                    record.apply_url,
                    record.source_channel.as_str(),
                ])?;
                for shard_key in &record.shard_memberships {
                    insert_membership.execute(params![record.job_id, shard_key])?;
                }
            }

            let mut insert_stats = tx.prepare(
                "INSERT INTO shard_stats
                    (shard_key, exp_level, job_type, workplace_type, labels, status,
                     job_count, new_jobs, pages_fetched, attempts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for (shard_key, row) in &artifacts.shard_report {
                insert_stats.execute(params![
                    shard_key,
                    row.exp_level,
                    row.job_type,
                    row.workplace_type,
                    row.labels,
                    row.status.as_str(),
                    row.job_count as i64,
                    row.new_jobs as i64,
                    row.pages_fetched,
                    row.attempts,
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!(
            "Wrote {} jobs and {} shard rows to {}",
            artifacts.records.len(),
            artifacts.shard_report.len(),
            self.path.display()
        );
        Ok(())
    }
}
