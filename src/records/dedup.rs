//! Cross-shard deduplication keyed by job id

use crate::records::JobRecord;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Result of merging one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// First time this job id was seen
    Inserted,

    /// The job was already known; its shard set was extended
    UpdatedMembership,
}

/// Hash-keyed store of every job collected so far
#[derive(Debug, Default)]
pub struct Deduplicator {
    records: HashMap<String, JobRecord>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the store from records saved in a checkpoint
    pub fn from_records(records: impl IntoIterator<Item = JobRecord>) -> Self {
        let mut dedup = Self::new();
        for record in records {
            dedup.merge(record);
        }
        dedup
    }

    /// Merges a record into the store
    ///
    /// A known job gains the incoming shard memberships. Its scalar fields
    /// are replaced only when the incoming record comes from a channel that
    /// outranks the stored one.
    pub fn merge(&mut self, record: JobRecord) -> MergeOutcome {
        match self.records.get_mut(&record.job_id) {
            Some(existing) => {
                if record.source_channel.outranks(existing.source_channel) {
                    existing.adopt_scalars(&record);
                }
                existing
                    .shard_memberships
                    .extend(record.shard_memberships);
                MergeOutcome::UpdatedMembership
            }
            None => {
                self.records.insert(record.job_id.clone(), record);
                MergeOutcome::Inserted
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn job_ids(&self) -> BTreeSet<String> {
        self.records.keys().cloned().collect()
    }

    /// Snapshot of every record, sorted by job id
    pub fn records(&self) -> Vec<JobRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        records
    }

    /// Job id to the shard keys it was found under
    pub fn mappings(&self) -> BTreeMap<String, Vec<String>> {
        self.records
            .values()
            .map(|record| {
                (
                    record.job_id.clone(),
                    record.shard_memberships.iter().cloned().collect(),
                )
            })
            .collect()
    }
}
