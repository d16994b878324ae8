//! Shard planner: enumerates the shard space and hands out work in priority order
//!
//! This module handles:
//! - Building the cartesian product of the three code sets
//! - Ordering shards by historical yield when it is available
//! - A priority queue of shards waiting to be dispatched
//! - Per-shard status tracking and transition checks
//! - Reconciling a fresh plan with a resumed checkpoint

use crate::shard::{Shard, ShardStatus};
use crate::ShardlineError;
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// Builds the ordered shard plan
///
/// Produces every (experience, job type, workplace) combination. Without
/// history the order is experience, then job type, then workplace, exactly
/// as the code sets are given. With history the shards are sorted by prior
/// job count, highest first; the sort is stable so ties and shards absent
/// from the history keep the deterministic order.
///
/// # Example
///
/// ```
/// use shardline::shard::plan;
///
/// let codes = |c: &[&str]| c.iter().map(|s| s.to_string()).collect::<Vec<_>>();
/// let shards = plan(&codes(&["1", "2"]), &codes(&["F", "C"]), &codes(&["2"]), None);
/// let keys: Vec<_> = shards.iter().map(|s| s.key()).collect();
/// assert_eq!(keys, vec!["1_F_2", "1_C_2", "2_F_2", "2_C_2"]);
/// ```
pub fn plan(
    experience_codes: &[String],
    job_type_codes: &[String],
    workplace_codes: &[String],
    history: Option<&HashMap<String, u64>>,
) -> Vec<Shard> {
    let mut shards = Vec::with_capacity(
        experience_codes.len() * job_type_codes.len() * workplace_codes.len(),
    );

    for experience in experience_codes {
        for job_type in job_type_codes {
            for workplace in workplace_codes {
                shards.push(Shard::new(
                    experience.clone(),
                    job_type.clone(),
                    workplace.clone(),
                ));
            }
        }
    }

    if let Some(history) = history.filter(|h| !h.is_empty()) {
        shards.sort_by_key(|shard| {
            std::cmp::Reverse(history.get(&shard.key()).copied().unwrap_or(0))
        });
    }

    shards
}

/// A shard waiting in the dispatch queue
#[derive(Debug, Clone)]
struct QueuedShard {
    /// Rank in the plan (lower is dispatched first)
    priority: u32,

    key: String,
}

// Lower priority values have higher priority (are popped first from BinaryHeap)
impl Ord for QueuedShard {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.key.cmp(&self.key))
    }
}

impl PartialOrd for QueuedShard {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedShard {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.key == other.key
    }
}

impl Eq for QueuedShard {}

/// Planned shard with its rank and status
#[derive(Debug, Clone)]
pub struct PlannedShard {
    pub shard: Shard,
    pub priority: u32,
    pub status: ShardStatus,
}

/// ShardPlanner owns shard status and the dispatch order
///
/// `mark_status` is the only way a status changes; `next_shard` goes
/// through it as well.
pub struct ShardPlanner {
    /// Shards in plan order
    entries: Vec<PlannedShard>,

    /// Shard key to position in `entries`
    index: HashMap<String, usize>,

    /// Shards waiting to be dispatched
    queue: BinaryHeap<QueuedShard>,
}

impl ShardPlanner {
    /// Creates a planner from an ordered plan
    ///
    /// Priority is the position in `shards`. Duplicate keys are dropped.
    pub fn new(shards: Vec<Shard>) -> Self {
        let mut entries = Vec::with_capacity(shards.len());
        let mut index = HashMap::with_capacity(shards.len());
        let mut queue = BinaryHeap::with_capacity(shards.len());

        for shard in shards {
            let key = shard.key();
            if index.contains_key(&key) {
                tracing::warn!("Dropping duplicate shard {} from plan", key);
                continue;
            }
            let priority = entries.len() as u32;
            index.insert(key.clone(), entries.len());
            queue.push(QueuedShard { priority, key });
            entries.push(PlannedShard {
                shard,
                priority,
                status: ShardStatus::Pending,
            });
        }

        Self {
            entries,
            index,
            queue,
        }
    }

    /// Plans the shard space and keeps only the first `max_shards` of it
    pub fn from_codes(
        experience_codes: &[String],
        job_type_codes: &[String],
        workplace_codes: &[String],
        history: Option<&HashMap<String, u64>>,
        max_shards: Option<usize>,
    ) -> Self {
        let mut shards = plan(experience_codes, job_type_codes, workplace_codes, history);
        if let Some(max) = max_shards {
            shards.truncate(max);
        }
        Self::new(shards)
    }

    /// Marks every key in `completed` as Exhausted
    ///
    /// Keys not in the plan are ignored. Returns how many shards were marked.
    pub fn reconcile(&mut self, completed: &BTreeSet<String>) -> Result<usize, ShardlineError> {
        let mut marked = 0;
        for key in completed {
            match self.status(key) {
                Some(ShardStatus::Pending) => {
                    self.mark_status(key, ShardStatus::Exhausted)?;
                    marked += 1;
                }
                Some(_) => {}
                None => tracing::debug!("Checkpointed shard {} is not in this plan", key),
            }
        }
        Ok(marked)
    }

    /// Takes the highest-priority Pending shard and marks it InProgress
    ///
    /// Returns None once no Pending shard is left.
    pub fn next_shard(&mut self) -> Option<Shard> {
        while let Some(queued) = self.queue.pop() {
            let Some(&idx) = self.index.get(&queued.key) else {
                continue;
            };
            if self.entries[idx].status != ShardStatus::Pending {
                continue;
            }
            if self.mark_status(&queued.key, ShardStatus::InProgress).is_ok() {
                return Some(self.entries[idx].shard.clone());
            }
        }
        None
    }

    /// Changes a shard's status
    ///
    /// # Errors
    ///
    /// * `InvalidTransition` if the shard is already Exhausted or Failed
    /// * `UnknownShard` if the key is not in the plan
    pub fn mark_status(&mut self, key: &str, status: ShardStatus) -> Result<(), ShardlineError> {
        let idx = *self
            .index
            .get(key)
            .ok_or_else(|| ShardlineError::UnknownShard(key.to_string()))?;
        let entry = &mut self.entries[idx];

        if !entry.status.is_active() {
            return Err(ShardlineError::InvalidTransition {
                key: key.to_string(),
                from: entry.status,
                to: status,
            });
        }

        tracing::trace!("Shard {}: {} -> {}", key, entry.status, status);
        entry.status = status;

        if status == ShardStatus::Pending {
            self.queue.push(QueuedShard {
                priority: entry.priority,
                key: key.to_string(),
            });
        }

        Ok(())
    }

    pub fn status(&self, key: &str) -> Option<ShardStatus> {
        self.index.get(key).map(|&idx| self.entries[idx].status)
    }

    /// Number of shards that are Pending or InProgress
    pub fn remaining(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status.is_active())
            .count()
    }

    /// True when no shard is Pending or InProgress
    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Keys with the given status, in plan order
    pub fn keys_with_status(&self, status: ShardStatus) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.shard.key())
            .collect()
    }

    /// All planned shards in plan order
    pub fn shards(&self) -> &[PlannedShard] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
