//! Shardline main entry point
//!
//! This is the command-line interface for the Shardline job harvester.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use shardline::config::{load_config_with_hash, validate, Config};
use shardline::crawler::{
    HttpChannelClient, RunOptions, ScrapeOrchestrator, EXIT_AUTH_FAILURE, EXIT_COMPLETED,
    EXIT_ERROR,
};
use shardline::output::{
    export_run, format_markdown_summary, generate_markdown_summary, load_history,
    load_statistics, print_statistics,
};
use shardline::session::{FileSessionProvider, SessionProvider};
use shardline::shard::ShardPlanner;
use shardline::storage::FileProgressStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Posting age window
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Postings from the last 24 hours
    Daily,
    /// Postings from the last 7 days
    Weekly,
}

impl Mode {
    fn time_posted(self) -> &'static str {
        match self {
            Mode::Daily => "r86400",
            Mode::Weekly => "r604800",
        }
    }
}

/// Shardline: a sharded job-posting harvester
///
/// Shardline splits a job search into experience × employment type ×
/// workplace shards, pages through each one, and writes a deduplicated
/// record set with per-shard analytics. Interrupted runs resume from the
/// last checkpoint.
#[derive(Parser, Debug)]
#[command(name = "shardline")]
#[command(version = "1.0.0")]
#[command(about = "A sharded job-posting harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Only schedule the first N shards of the plan
    #[arg(long, value_name = "N")]
    max_shards: Option<usize>,

    /// Number of shards fetched in parallel
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Search keywords, replacing the configured ones
    #[arg(long)]
    keywords: Option<String>,

    /// Posting age window
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume an interrupted run (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh run, discarding the checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Validate config and show the shard plan without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show statistics from existing output files and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Regenerate the markdown summary from existing output files and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(max_shards) = self.max_shards {
            config.scraper.max_shards = Some(max_shards);
        }
        if let Some(workers) = self.workers {
            config.scraper.workers = workers;
        }
        if let Some(keywords) = &self.keywords {
            config.search.keywords = keywords.clone();
        }
        if let Some(mode) = self.mode {
            config.search.time_posted = mode.time_posted().to_string();
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            EXIT_ERROR
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    cli.apply_overrides(&mut config);
    validate(&config).context("invalid command-line override")?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(EXIT_COMPLETED)
    } else if cli.stats {
        handle_stats(&config)?;
        Ok(EXIT_COMPLETED)
    } else if cli.export_summary {
        handle_export_summary(&config)?;
        Ok(EXIT_COMPLETED)
    } else {
        handle_scrape(config, config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("shardline=info,warn"),
            1 => EnvFilter::new("shardline=debug,info"),
            2 => EnvFilter::new("shardline=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn history_for(config: &Config) -> Option<std::collections::HashMap<String, u64>> {
    config
        .output
        .history_path
        .as_ref()
        .and_then(|path| load_history(Path::new(path)))
}

/// Handles the --dry-run mode: validates config and shows the shard plan
fn handle_dry_run(config: &Config) {
    println!("=== Shardline Dry Run ===\n");

    println!("Scraper Configuration:");
    println!("  Workers: {}", config.scraper.workers);
    println!("  Max pages per shard: {}", config.scraper.max_pages_per_shard);
    println!("  Page size: {}", config.scraper.page_size);
    println!("  Retry budget: {}", config.scraper.retry_budget);
    println!("  Fallback enabled: {}", config.scraper.fallback_enabled);

    println!("\nRate Control:");
    println!(
        "  Delay: {:.2}s base, {:.2}s max, x{:.1} backoff",
        config.rate.base_delay_secs, config.rate.max_delay_secs, config.rate.backoff_factor
    );

    println!("\nSearch:");
    println!("  Keywords: {}", config.search.keywords);
    println!("  Location: {} ({})", config.search.location, config.search.geo_id);
    println!("  Time posted: {}", config.search.time_posted);

    println!("\nOutput:");
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    println!("  Jobs: {}", config.output.jobs_path);
    println!("  Summary: {}", config.output.summary_path);
    if let Some(database) = &config.output.database_path {
        println!("  Database: {}", database);
    }

    let planner = ShardPlanner::from_codes(
        &config.search.experience_codes,
        &config.search.job_type_codes,
        &config.search.workplace_codes,
        history_for(config).as_ref(),
        config.scraper.max_shards,
    );

    println!("\nShard Plan ({} shards, in dispatch order):", planner.len());
    for planned in planner.shards() {
        println!(
            "  - {} ({}) priority {}",
            planned.shard.key(),
            planned.shard.labels(),
            planned.priority
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would fetch up to {} pages",
        planner.len() as u64 * config.scraper.max_pages_per_shard as u64
    );
}

/// Handles the --stats mode: shows statistics from existing output files
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Jobs: {}", config.output.jobs_path);
    println!("Shard report: {}\n", config.output.shard_report_path);

    let stats = load_statistics(&config.output).context("failed to read output files")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: regenerates the markdown summary
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Scrape Summary ===\n");
    println!("Jobs: {}", config.output.jobs_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    tracing::info!("Loading scrape data from output files...");
    let stats = load_statistics(&config.output).context("failed to read output files")?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&stats, None, Path::new(&config.output.summary_path))
        .context("failed to write summary")?;

    println!("✓ Summary exported to: {}", config.output.summary_path);
    tracing::debug!("{}", format_markdown_summary(&stats, None));

    Ok(())
}

/// Handles the main scrape operation
async fn handle_scrape(config: Config, config_hash: String, fresh: bool) -> anyhow::Result<i32> {
    if fresh {
        tracing::info!("Starting fresh run (discarding previous checkpoint)");
    } else {
        tracing::info!("Starting run (will resume if a checkpoint exists)");
    }

    let session = match FileSessionProvider::new(&config.session.cookie_file).session() {
        Ok(session) => session,
        Err(error) if error.is_auth() => {
            tracing::error!(
                "No usable session in {}: {}",
                config.session.cookie_file,
                error
            );
            return Ok(EXIT_AUTH_FAILURE);
        }
        Err(error) => return Err(error).context("failed to load session cookies"),
    };
    let client = HttpChannelClient::new(&config, session).context("failed to build HTTP client")?;
    let store = FileProgressStore::new(&config.output.checkpoint_path);

    let options = RunOptions {
        resume: !fresh,
        config_hash,
        history: history_for(&config),
    };
    let mut orchestrator =
        ScrapeOrchestrator::new(&config, Arc::new(client), Arc::new(store), options)?;

    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight pages");
            cancel.cancel();
        }
    });

    let report = orchestrator.run().await?;

    export_run(&report, &config.output).context("failed to write output artifacts")?;

    let failed = report.failed();
    if !failed.is_empty() {
        tracing::warn!(
            "{} shards failed and need a rerun: {}",
            failed.len(),
            failed.join(", ")
        );
    }

    Ok(report.exit_code())
}
