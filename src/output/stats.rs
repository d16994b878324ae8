//! Statistics over the scrape artifacts
//!
//! This module derives yield and coverage figures from the deduplicated
//! records and the shard report, either straight from a finished run or from
//! the files a previous run left on disk.

use crate::config::OutputConfig;
use crate::output::json_output::{load_jobs, load_shard_report};
use crate::output::traits::{OutputResult, ShardReport};
use crate::records::JobRecord;
use crate::shard::{codes, ShardStatus};
use std::collections::BTreeMap;
use std::path::Path;

/// How many shards the "top shards" table lists
pub const TOP_SHARD_COUNT: usize = 10;

/// One row of the top productive shards table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardYield {
    pub key: String,
    pub labels: String,
    pub job_count: usize,
    pub new_jobs: usize,
}

/// Scrape statistics summary
#[derive(Debug, Clone, Default)]
pub struct ScrapeStatistics {
    /// Unique jobs after deduplication
    pub total_jobs: usize,

    /// Unique jobs by the channel that supplied their fields
    pub jobs_by_channel: BTreeMap<String, usize>,

    /// Jobs flagged as reposts
    pub reposts: usize,

    pub total_shards: usize,

    /// Shard keys that finished normally, sorted
    pub exhausted_shards: Vec<String>,

    /// Shard keys that ran out of retries, sorted
    pub failed_shards: Vec<String>,

    /// Shards still pending or in progress when the report was written
    pub unfinished_shards: usize,

    /// Extracted records per experience label, duplicates included
    pub yield_by_experience: BTreeMap<String, usize>,

    /// Extracted records per employment type label
    pub yield_by_job_type: BTreeMap<String, usize>,

    /// Extracted records per workplace label
    pub yield_by_workplace: BTreeMap<String, usize>,

    /// Most productive shards, highest job count first
    pub top_shards: Vec<ShardYield>,

    /// Number of shards a job was found under, to how many jobs share it
    pub overlap: BTreeMap<usize, usize>,
}

impl ScrapeStatistics {
    /// Jobs that were found under more than one shard
    pub fn multi_shard_jobs(&self) -> usize {
        self.overlap
            .iter()
            .filter(|(shards, _)| **shards > 1)
            .map(|(_, jobs)| jobs)
            .sum()
    }

    /// Share of jobs found under more than one shard, in percent
    pub fn overlap_rate(&self) -> f64 {
        if self.total_jobs == 0 {
            0.0
        } else {
            (self.multi_shard_jobs() as f64 / self.total_jobs as f64) * 100.0
        }
    }
}

/// Computes statistics from records and a shard report
///
/// # Arguments
///
/// * `records` - Deduplicated job records
/// * `shard_report` - Per-shard counts and statuses
pub fn compute_statistics(records: &[JobRecord], shard_report: &ShardReport) -> ScrapeStatistics {
    let mut stats = ScrapeStatistics {
        total_jobs: records.len(),
        total_shards: shard_report.len(),
        ..ScrapeStatistics::default()
    };

    for record in records {
        *stats
            .jobs_by_channel
            .entry(record.source_channel.as_str().to_string())
            .or_insert(0) += 1;
        if record.is_repost {
            stats.reposts += 1;
        }
        *stats
            .overlap
            .entry(record.shard_memberships.len())
            .or_insert(0) += 1;
    }

    for (key, row) in shard_report {
        match row.status {
            ShardStatus::Exhausted => stats.exhausted_shards.push(key.clone()),
            ShardStatus::Failed => stats.failed_shards.push(key.clone()),
            ShardStatus::Pending | ShardStatus::InProgress => stats.unfinished_shards += 1,
        }

        *stats
            .yield_by_experience
            .entry(codes::experience_label(&row.exp_level).to_string())
            .or_insert(0) += row.job_count;
        *stats
            .yield_by_job_type
            .entry(codes::job_type_label(&row.job_type).to_string())
            .or_insert(0) += row.job_count;
        *stats
            .yield_by_workplace
            .entry(codes::workplace_label(&row.workplace_type).to_string())
            .or_insert(0) += row.job_count;
    }

    let mut top: Vec<ShardYield> = shard_report
        .iter()
        .filter(|(_, row)| row.job_count > 0)
        .map(|(key, row)| ShardYield {
            key: key.clone(),
            labels: row.labels.clone(),
            job_count: row.job_count,
            new_jobs: row.new_jobs,
        })
        .collect();
    // Ties keep key order, since the report is a BTreeMap and the sort is stable
    top.sort_by(|a, b| b.job_count.cmp(&a.job_count));
    top.truncate(TOP_SHARD_COUNT);
    stats.top_shards = top;

    stats
}

/// Loads statistics from the artifact files of a previous run
///
/// # Arguments
///
/// * `output` - Output paths from the configuration
///
/// # Returns
///
/// * `Ok(ScrapeStatistics)` - Successfully loaded statistics
/// * `Err(OutputError)` - The jobs file or shard report could not be read
pub fn load_statistics(output: &OutputConfig) -> OutputResult<ScrapeStatistics> {
    let records = load_jobs(Path::new(&output.jobs_path))?;
    let shard_report = load_shard_report(Path::new(&output.shard_report_path))?;
    Ok(compute_statistics(&records, &shard_report))
}

fn print_breakdown(title: &str, counts: &BTreeMap<String, usize>) {
    println!("{}:", title);
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1));
    for (label, count) in sorted {
        println!("  {}: {}", label, count);
    }
    println!();
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &ScrapeStatistics) {
    println!("=== Scrape Statistics ===\n");

    println!("Overview:");
    println!("  Unique jobs: {}", stats.total_jobs);
    for (channel, count) in &stats.jobs_by_channel {
        println!("    via {}: {}", channel, count);
    }
    println!("  Reposts: {}", stats.reposts);
    println!(
        "  Multi-shard jobs: {} ({:.1}%)",
        stats.multi_shard_jobs(),
        stats.overlap_rate()
    );
    println!();

    println!("Shards ({} total):", stats.total_shards);
    println!("  Exhausted: {}", stats.exhausted_shards.len());
    println!("  Failed: {}", stats.failed_shards.len());
    println!("  Unfinished: {}", stats.unfinished_shards);
    println!();

    if !stats.failed_shards.is_empty() {
        println!("Failed Shards (rerun candidates):");
        for key in &stats.failed_shards {
            println!("  - {}", key);
        }
        println!();
    }

    print_breakdown("Yield by Experience", &stats.yield_by_experience);
    print_breakdown("Yield by Employment Type", &stats.yield_by_job_type);
    print_breakdown("Yield by Workplace", &stats.yield_by_workplace);

    if !stats.top_shards.is_empty() {
        println!("Top Shards:");
        for shard in &stats.top_shards {
            println!(
                "  {} ({}): {} jobs, {} new",
                shard.key, shard.labels, shard.job_count, shard.new_jobs
            );
        }
    }
}
