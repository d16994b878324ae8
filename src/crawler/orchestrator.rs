//! Scrape orchestrator - the run-level control loop
//!
//! This module ties the other components together:
//! - Starting: plans the shard space and reconciles it with a checkpoint
//! - Running: a bounded pool of workers pulls shards in priority order and
//!   pages through each one until it is empty, hits the page ceiling, or
//!   runs out of retries
//! - Checkpoints after every finished shard and when the run stops
//! - Stops dispatching on an auth failure or an external cancel
//!
//! All shared state lives in one `RunContext` owned by the orchestrator and
//! handed to every worker.

use crate::config::Config;
use crate::crawler::client::ChannelClient;
use crate::crawler::fetcher::{FetchOutcome, PageFetcher};
use crate::crawler::rate::RateController;
use crate::records::{Deduplicator, JobRecord, MergeOutcome};
use crate::shard::{Shard, ShardPlanner, ShardStats, ShardStatus};
use crate::storage::{ProgressCheckpoint, ProgressStore, StorageError};
use crate::{Result, ShardlineError};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Process exit status for a completed run
pub const EXIT_COMPLETED: i32 = 0;

/// Process exit status for an unhandled error
pub const EXIT_ERROR: i32 = 1;

/// Process exit status when the session was rejected
pub const EXIT_AUTH_FAILURE: i32 = 2;

/// Process exit status when the run was stopped by a signal
pub const EXIT_INTERRUPTED: i32 = 130;

/// Why a run stopped before finishing its shards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A channel rejected the session
    AuthFailure,

    /// An external stop signal
    Interrupted,
}

/// Global run state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Completed,
    Aborted(AbortReason),
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted(AbortReason::AuthFailure) => "aborted (auth failure)",
            Self::Aborted(AbortReason::Interrupted) => "aborted (interrupted)",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Run parameters that do not come from the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Continue from the saved checkpoint instead of discarding it
    pub resume: bool,

    /// Hash of the configuration, stored in every checkpoint
    pub config_hash: String,

    /// Prior job count per shard key, used to order the plan
    pub history: Option<HashMap<String, u64>>,
}

/// Final state of one planned shard
#[derive(Debug, Clone)]
pub struct ShardReportEntry {
    pub shard: Shard,
    pub status: ShardStatus,
    pub stats: ShardStats,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: RunState,

    /// Every planned shard, in plan order
    pub shards: Vec<ShardReportEntry>,

    /// Deduplicated records, sorted by job id
    pub records: Vec<JobRecord>,

    /// Job id to the shard keys it was found under
    pub mappings: BTreeMap<String, Vec<String>>,

    pub elapsed: Duration,
}

impl RunReport {
    pub fn keys_with_status(&self, status: ShardStatus) -> Vec<String> {
        self.shards
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.shard.key())
            .collect()
    }

    pub fn exhausted(&self) -> Vec<String> {
        self.keys_with_status(ShardStatus::Exhausted)
    }

    /// Shards that ran out of retries and need a rerun
    pub fn failed(&self) -> Vec<String> {
        self.keys_with_status(ShardStatus::Failed)
    }

    /// Shards left Pending or InProgress by an aborted run
    pub fn unfinished(&self) -> Vec<String> {
        self.shards
            .iter()
            .filter(|entry| entry.status.is_active())
            .map(|entry| entry.shard.key())
            .collect()
    }

    pub fn exit_code(&self) -> i32 {
        match self.state {
            RunState::Completed => EXIT_COMPLETED,
            RunState::Aborted(AbortReason::AuthFailure) => EXIT_AUTH_FAILURE,
            RunState::Aborted(AbortReason::Interrupted) => EXIT_INTERRUPTED,
            RunState::Starting | RunState::Running => EXIT_ERROR,
        }
    }
}

/// How a worker left a shard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShardEnd {
    /// No more results, or the page ceiling was reached
    Exhausted,

    /// The retry budget ran out on one page
    Failed,

    /// The run is stopping; the shard stays unfinished
    Halted,
}

#[derive(Debug, Clone)]
struct Settings {
    workers: usize,
    max_pages: u32,
    retry_budget: u32,
    checkpoint_every_page: bool,
}

/// State shared by every worker of one run
///
/// Locks are taken one at a time and never held across a fetch.
struct RunContext {
    planner: Mutex<ShardPlanner>,
    dedup: Mutex<Deduplicator>,
    checkpoint: Mutex<ProgressCheckpoint>,
    abort: Mutex<Option<AbortReason>>,

    /// Serializes saves so snapshots reach the store in the order taken
    save_lock: Mutex<()>,
    fetcher: PageFetcher,
    store: Arc<dyn ProgressStore>,
    cancel: CancellationToken,
    settings: Settings,
}

impl RunContext {
    /// Pulls shards until the queue is empty or the run stops
    async fn worker(&self, id: usize) -> Result<()> {
        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!("Worker {} stopping", id);
                break;
            }

            let next = self.planner.lock().await.next_shard();
            let Some(shard) = next else {
                tracing::debug!("Worker {}: no shards left", id);
                break;
            };

            let key = shard.key();
            tracing::info!("Worker {} took shard {} ({})", id, key, shard.labels());

            match self.process_shard(&shard).await? {
                ShardEnd::Exhausted => {
                    self.planner
                        .lock()
                        .await
                        .mark_status(&key, ShardStatus::Exhausted)?;
                    self.checkpoint.lock().await.mark_completed(&key);
                    self.persist().await?;
                    tracing::info!("Shard {} exhausted", key);
                }
                ShardEnd::Failed => {
                    self.planner
                        .lock()
                        .await
                        .mark_status(&key, ShardStatus::Failed)?;
                    self.persist().await?;
                    tracing::warn!("Shard {} failed after exhausting its retries", key);
                }
                ShardEnd::Halted => {
                    tracing::info!("Shard {} left unfinished", key);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Pages through one shard, resuming from its saved cursor
    async fn process_shard(&self, shard: &Shard) -> Result<ShardEnd> {
        let key = shard.key();
        let mut page_index = self.checkpoint.lock().await.next_page(&key);
        let mut failures = 0u32;

        if page_index > 0 {
            tracing::info!("Resuming shard {} at page {}", key, page_index);
        }

        while page_index < self.settings.max_pages {
            if self.cancel.is_cancelled() {
                return Ok(ShardEnd::Halted);
            }

            let result = self.fetcher.fetch(shard, page_index).await;

            match result.outcome {
                FetchOutcome::Success => {
                    let found = result.records.len();
                    let mut inserted = 0;
                    {
                        let mut dedup = self.dedup.lock().await;
                        for record in result.records {
                            if dedup.merge(record) == MergeOutcome::Inserted {
                                inserted += 1;
                            }
                        }
                    }
                    {
                        let mut checkpoint = self.checkpoint.lock().await;
                        checkpoint.record_page(&key, page_index);
                        let stats = checkpoint.shard_stats.entry(key.clone()).or_default();
                        stats.attempts += 1;
                        stats.pages_fetched += 1;
                        stats.job_count += found;
                        stats.new_jobs += inserted;
                    }
                    tracing::debug!(
                        "Shard {} page {}: {} jobs, {} new",
                        key,
                        page_index,
                        found,
                        inserted
                    );

                    if self.settings.checkpoint_every_page {
                        self.persist().await?;
                    }
                    failures = 0;
                    page_index += 1;
                }
                FetchOutcome::EmptyPage => {
                    self.update_stats(&key, |stats| {
                        stats.attempts += 1;
                        stats.pages_fetched += 1;
                    })
                    .await;
                    tracing::debug!("Shard {} ran out of results at page {}", key, page_index);
                    return Ok(ShardEnd::Exhausted);
                }
                FetchOutcome::TransientError => {
                    self.update_stats(&key, |stats| stats.attempts += 1).await;
                    failures += 1;
                    if failures > self.settings.retry_budget {
                        tracing::warn!(
                            "Shard {} page {}: giving up after {} attempts ({})",
                            key,
                            page_index,
                            failures,
                            result.error.as_deref().unwrap_or("unknown error")
                        );
                        return Ok(ShardEnd::Failed);
                    }
                    tracing::debug!(
                        "Shard {} page {}: retry {}/{}",
                        key,
                        page_index,
                        failures,
                        self.settings.retry_budget
                    );
                }
                FetchOutcome::FatalAuthError => {
                    self.update_stats(&key, |stats| stats.attempts += 1).await;
                    tracing::error!(
                        "Session rejected while fetching shard {}: {}",
                        key,
                        result.error.as_deref().unwrap_or("auth failure")
                    );
                    self.abort(AbortReason::AuthFailure).await;
                    return Ok(ShardEnd::Halted);
                }
            }
        }

        tracing::debug!("Shard {} reached the {} page ceiling", key, self.settings.max_pages);
        Ok(ShardEnd::Exhausted)
    }

    async fn update_stats(&self, key: &str, update: impl FnOnce(&mut ShardStats)) {
        let mut checkpoint = self.checkpoint.lock().await;
        update(checkpoint.shard_stats.entry(key.to_string()).or_default());
    }

    /// Records the first abort reason and stops all dispatch
    async fn abort(&self, reason: AbortReason) {
        let mut abort = self.abort.lock().await;
        if abort.is_none() {
            *abort = Some(reason);
        }
        self.cancel.cancel();
    }

    /// Snapshots the collected records into the checkpoint and saves it
    ///
    /// The save runs on the blocking pool after the checkpoint lock is
    /// released, so workers keep recording pages while the file is written.
    async fn persist(&self) -> Result<()> {
        let _saving = self.save_lock.lock().await;

        let (records, job_ids) = {
            let dedup = self.dedup.lock().await;
            (dedup.records(), dedup.job_ids())
        };

        let snapshot = {
            let mut checkpoint = self.checkpoint.lock().await;
            checkpoint.collected_job_ids.extend(job_ids);
            checkpoint.records = records;
            checkpoint.saved_at = Some(Utc::now());
            checkpoint.clone()
        };

        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&snapshot))
            .await
            .map_err(|e| ShardlineError::Worker(format!("checkpoint save panicked: {}", e)))??;
        Ok(())
    }
}

/// Top-level driver of one scrape run
pub struct ScrapeOrchestrator {
    context: Arc<RunContext>,
    state: RunState,
}

impl ScrapeOrchestrator {
    /// Plans the run and loads or discards the checkpoint
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `client` - Transport for both channels
    /// * `store` - Checkpoint backend
    /// * `options` - Resume flag, config hash, and yield history
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapeOrchestrator)` - Ready to run
    /// * `Err(ShardlineError)` - The checkpoint could not be read or cleared
    pub fn new(
        config: &Config,
        client: Arc<dyn ChannelClient>,
        store: Arc<dyn ProgressStore>,
        options: RunOptions,
    ) -> Result<Self> {
        let mut planner = ShardPlanner::from_codes(
            &config.search.experience_codes,
            &config.search.job_type_codes,
            &config.search.workplace_codes,
            options.history.as_ref(),
            config.scraper.max_shards,
        );

        let mut checkpoint = if options.resume {
            match store.load() {
                Ok(Some(checkpoint)) => {
                    if !checkpoint.config_hash.is_empty()
                        && checkpoint.config_hash != options.config_hash
                    {
                        tracing::warn!(
                            "Configuration changed since the checkpoint was written; resuming anyway"
                        );
                    }
                    let skipped = planner.reconcile(&checkpoint.completed_shard_keys)?;
                    tracing::info!(
                        "Resuming: {} of {} shards already complete, {} jobs collected",
                        skipped,
                        planner.len(),
                        checkpoint.collected_job_ids.len()
                    );
                    checkpoint
                }
                Ok(None) => {
                    tracing::info!("No checkpoint found, starting fresh");
                    ProgressCheckpoint::default()
                }
                Err(StorageError::CorruptCheckpoint { path, reason }) => {
                    tracing::warn!(
                        "Checkpoint {} is unreadable ({}); starting fresh, earlier progress is lost",
                        path,
                        reason
                    );
                    ProgressCheckpoint::default()
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            store.clear()?;
            ProgressCheckpoint::default()
        };
        checkpoint.config_hash = options.config_hash;

        let dedup = Deduplicator::from_records(checkpoint.records.iter().cloned());
        let rate = Arc::new(Mutex::new(RateController::new(config.rate.clone())));

        let context = RunContext {
            planner: Mutex::new(planner),
            dedup: Mutex::new(dedup),
            checkpoint: Mutex::new(checkpoint),
            abort: Mutex::new(None),
            save_lock: Mutex::new(()),
            fetcher: PageFetcher::new(config, client, rate),
            store,
            cancel: CancellationToken::new(),
            settings: Settings {
                workers: config.scraper.workers.max(1),
                max_pages: config.scraper.max_pages_per_shard,
                retry_budget: config.scraper.retry_budget,
                checkpoint_every_page: config.scraper.checkpoint_every_page,
            },
        };

        Ok(Self {
            context: Arc::new(context),
            state: RunState::Starting,
        })
    }

    /// Token that stops the run when cancelled
    ///
    /// In-flight pages finish, the checkpoint is saved, and the run ends as
    /// interrupted.
    pub fn cancel_token(&self) -> CancellationToken {
        self.context.cancel.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs every remaining shard through the worker pool
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run completed or was aborted cleanly
    /// * `Err(ShardlineError)` - A worker hit an unrecoverable error
    pub async fn run(&mut self) -> Result<RunReport> {
        let started = Instant::now();
        self.state = RunState::Running;

        let (planned, remaining) = {
            let planner = self.context.planner.lock().await;
            (planner.len(), planner.remaining())
        };
        let workers = self.context.settings.workers.min(remaining);
        tracing::info!(
            "Run started: {} shards planned, {} to fetch, {} workers",
            planned,
            remaining,
            workers
        );

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let context = Arc::clone(&self.context);
            handles.push(tokio::spawn(async move {
                let result = context.worker(id).await;
                if result.is_err() {
                    context.cancel.cancel();
                }
                result
            }));
        }

        let mut first_error = None;
        for handle in handles {
            let error = match handle.await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(join_error) => ShardlineError::Worker(join_error.to_string()),
            };
            tracing::error!("Worker failed: {}", error);
            if first_error.is_none() {
                first_error = Some(error);
            }
        }

        // Saved on every exit path so an aborted run can resume
        let persisted = self.context.persist().await;
        if let Some(error) = first_error {
            return Err(error);
        }
        persisted?;

        let abort = *self.context.abort.lock().await;
        let finished = self.context.planner.lock().await.is_finished();
        self.state = match abort {
            Some(reason) => RunState::Aborted(reason),
            None if finished => RunState::Completed,
            None if self.context.cancel.is_cancelled() => {
                RunState::Aborted(AbortReason::Interrupted)
            }
            None => {
                return Err(ShardlineError::Worker(
                    "workers stopped with shards still pending".to_string(),
                ))
            }
        };

        let report = self.report(started.elapsed()).await;
        tracing::info!(
            "Run {}: {} jobs, {} shards exhausted, {} failed, {} unfinished, in {:.1}s",
            self.state,
            report.records.len(),
            report.exhausted().len(),
            report.failed().len(),
            report.unfinished().len(),
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    async fn report(&self, elapsed: Duration) -> RunReport {
        let shards = {
            let planner = self.context.planner.lock().await;
            let checkpoint = self.context.checkpoint.lock().await;
            planner
                .shards()
                .iter()
                .map(|planned| ShardReportEntry {
                    shard: planned.shard.clone(),
                    status: planned.status,
                    stats: checkpoint
                        .shard_stats
                        .get(&planned.shard.key())
                        .cloned()
                        .unwrap_or_default(),
                })
                .collect()
        };

        let dedup = self.context.dedup.lock().await;
        RunReport {
            state: self.state,
            shards,
            records: dedup.records(),
            mappings: dedup.mappings(),
            elapsed,
        }
    }
}
