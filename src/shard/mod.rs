//! Shard space definitions and planning
//!
//! A shard is one search partition: an (experience level, employment type,
//! workplace arrangement) triple. This module provides:
//!
//! - `Shard`: the immutable triple and its canonical key
//! - `ShardStatus`: the per-shard lifecycle
//! - `ShardPlanner`: enumeration, priority ordering, and status tracking
//! - `codes`: vendor filter codes and readable labels

pub mod codes;
mod planner;
mod status;

pub use planner::{plan, PlannedShard, ShardPlanner};
pub use status::ShardStatus;

use serde::{Deserialize, Serialize};
use std::fmt;

/// One (experience, employment type, workplace) search partition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shard {
    pub experience_code: String,
    pub job_type_code: String,
    pub workplace_code: String,
}

impl Shard {
    pub fn new(
        experience_code: impl Into<String>,
        job_type_code: impl Into<String>,
        workplace_code: impl Into<String>,
    ) -> Self {
        Self {
            experience_code: experience_code.into(),
            job_type_code: job_type_code.into(),
            workplace_code: workplace_code.into(),
        }
    }

    /// Canonical string form, e.g. `4_F_2`
    pub fn key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.experience_code, self.job_type_code, self.workplace_code
        )
    }

    /// Parses a canonical key back into a shard
    pub fn from_key(key: &str) -> Option<Self> {
        let mut parts = key.split('_');
        let shard = Self::new(parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some()
            || shard.experience_code.is_empty()
            || shard.job_type_code.is_empty()
            || shard.workplace_code.is_empty()
        {
            return None;
        }
        Some(shard)
    }

    /// Readable label, e.g. `mid-senior+full_time+remote`
    pub fn labels(&self) -> String {
        format!(
            "{}+{}+{}",
            codes::experience_label(&self.experience_code),
            codes::job_type_label(&self.job_type_code),
            codes::workplace_label(&self.workplace_code)
        )
    }
}

impl fmt::Display for Shard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Counters collected while a shard is processed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    /// Records extracted from this shard's pages, duplicates included
    pub job_count: usize,

    /// Records first seen under this shard
    pub new_jobs: usize,

    /// Pages that returned a response, the terminating empty page included
    pub pages_fetched: u32,

    /// Calls into the page fetcher
    pub attempts: u32,
}
