/// Shard status definitions for tracking scrape progress
///
/// A shard moves Pending -> InProgress -> {Exhausted, Failed}. Resumed shards
/// may jump straight from Pending to Exhausted.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of a shard in the scrape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardStatus {
    // ===== Active States =====
    /// Planned but not yet dispatched
    Pending,

    /// Claimed by a worker
    InProgress,

    // ===== Terminal States =====
    /// Pagination ended (no results page, page ceiling, or prior run)
    Exhausted,

    /// Retry budget ran out; needs a manual rerun
    Failed,
}

impl ShardStatus {
    /// Returns true if the shard will not be dispatched again this run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exhausted | Self::Failed)
    }

    /// Returns true if the status may still change
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Exhausted => "exhausted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ShardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
