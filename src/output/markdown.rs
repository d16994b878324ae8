//! Markdown summary generation
//!
//! This module generates human-readable markdown summaries of a scrape,
//! including totals, shard outcomes, per-dimension yield, and overlap.

use crate::output::stats::ScrapeStatistics;
use crate::output::traits::OutputResult;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Generates a markdown summary from scrape statistics
///
/// # Arguments
///
/// * `stats` - The computed statistics
/// * `run_state` - Final run state, when the summary follows a live run
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(
    stats: &ScrapeStatistics,
    run_state: Option<&str>,
    output_path: &Path,
) -> OutputResult<()> {
    let markdown = format_markdown_summary(stats, run_state);

    if let Some(dir) = output_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

fn push_yield_table(md: &mut String, heading: &str, column: &str, counts: &BTreeMap<String, usize>) {
    if counts.is_empty() {
        return;
    }
    md.push_str(&format!("### {}\n\n", heading));
    md.push_str(&format!("| {} | Jobs |\n", column));
    md.push_str("|---|---|\n");

    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1));
    for (label, count) in sorted {
        md.push_str(&format!("| {} | {} |\n", label, count));
    }
    md.push('\n');
}

/// Formats scrape statistics as markdown
///
/// # Arguments
///
/// * `stats` - The computed statistics
/// * `run_state` - Final run state, omitted when regenerating from files
///
/// # Returns
///
/// A formatted markdown string
pub fn format_markdown_summary(stats: &ScrapeStatistics, run_state: Option<&str>) -> String {
    let mut md = String::new();

    md.push_str("# Shardline Scrape Summary\n\n");

    md.push_str("## Run Information\n\n");
    if let Some(state) = run_state {
        md.push_str(&format!("- **Status**: {}\n", state));
    }
    md.push_str(&format!(
        "- **Generated**: {}\n\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));

    md.push_str("## Overall Statistics\n\n");
    md.push_str(&format!("- **Unique Jobs**: {}\n", stats.total_jobs));
    for (channel, count) in &stats.jobs_by_channel {
        md.push_str(&format!("- **Via {}**: {}\n", channel, count));
    }
    md.push_str(&format!("- **Reposts**: {}\n", stats.reposts));
    md.push_str(&format!(
        "- **Multi-shard Jobs**: {} ({:.2}%)\n\n",
        stats.multi_shard_jobs(),
        stats.overlap_rate()
    ));

    md.push_str("## Shard Outcomes\n\n");
    md.push_str("| Status | Shards |\n");
    md.push_str("|--------|--------|\n");
    md.push_str(&format!("| Exhausted | {} |\n", stats.exhausted_shards.len()));
    md.push_str(&format!("| Failed | {} |\n", stats.failed_shards.len()));
    md.push_str(&format!("| Unfinished | {} |\n", stats.unfinished_shards));
    md.push_str(&format!("| **Total** | {} |\n\n", stats.total_shards));

    if !stats.failed_shards.is_empty() {
        md.push_str("### Failed Shards\n\n");
        md.push_str("These combinations ran out of retries and need a rerun.\n\n");
        for key in &stats.failed_shards {
            md.push_str(&format!("- `{}`\n", key));
        }
        md.push('\n');
    }

    md.push_str("## Yield by Dimension\n\n");
    push_yield_table(&mut md, "Experience", "Level", &stats.yield_by_experience);
    push_yield_table(&mut md, "Employment Type", "Type", &stats.yield_by_job_type);
    push_yield_table(&mut md, "Workplace", "Workplace", &stats.yield_by_workplace);

    if !stats.top_shards.is_empty() {
        md.push_str("## Top Shards\n\n");
        md.push_str("| Shard | Labels | Jobs | New |\n");
        md.push_str("|-------|--------|------|-----|\n");
        for shard in &stats.top_shards {
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                shard.key, shard.labels, shard.job_count, shard.new_jobs
            ));
        }
        md.push('\n');
    }

    if !stats.overlap.is_empty() {
        md.push_str("## Shard Overlap\n\n");
        md.push_str("| Shards per Job | Jobs |\n");
        md.push_str("|----------------|------|\n");
        for (shards, jobs) in &stats.overlap {
            md.push_str(&format!("| {} | {} |\n", shards, jobs));
        }
        md.push('\n');
    }

    md
}
