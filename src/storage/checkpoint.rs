use crate::records::JobRecord;
use crate::shard::ShardStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Durable record of run progress
///
/// The first three sets are the resume contract. `records` and
/// `shard_stats` let a resumed run report totals for the whole run rather
/// than only for the shards it fetched itself; checkpoints without them
/// still load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressCheckpoint {
    /// Hash of the configuration that produced this checkpoint
    #[serde(default)]
    pub config_hash: String,

    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,

    pub completed_shard_keys: BTreeSet<String>,

    /// Highest page index fetched per shard
    pub last_page_index_per_shard: BTreeMap<String, u32>,

    pub collected_job_ids: BTreeSet<String>,

    #[serde(default)]
    pub records: Vec<JobRecord>,

    #[serde(default)]
    pub shard_stats: BTreeMap<String, ShardStats>,
}

impl ProgressCheckpoint {
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            config_hash: config_hash.into(),
            ..Default::default()
        }
    }

    pub fn is_completed(&self, shard_key: &str) -> bool {
        self.completed_shard_keys.contains(shard_key)
    }

    pub fn mark_completed(&mut self, shard_key: &str) {
        self.completed_shard_keys.insert(shard_key.to_string());
    }

    /// Records that `page_index` was fetched; the cursor never moves back
    pub fn record_page(&mut self, shard_key: &str, page_index: u32) {
        let cursor = self
            .last_page_index_per_shard
            .entry(shard_key.to_string())
            .or_insert(page_index);
        *cursor = (*cursor).max(page_index);
    }

    /// Page a shard should continue from
    pub fn next_page(&self, shard_key: &str) -> u32 {
        self.last_page_index_per_shard
            .get(shard_key)
            .map(|last| last + 1)
            .unwrap_or(0)
    }
}
