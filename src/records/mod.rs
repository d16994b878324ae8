//! Job records and cross-shard deduplication
//!
//! - `JobRecord`: one normalized job posting with its shard provenance
//! - `Channel`: which acquisition method produced a record
//! - `Deduplicator`: the jobId-keyed store that merges rediscovered postings

mod dedup;
mod job;

pub use dedup::{Deduplicator, MergeOutcome};
pub use job::{Channel, JobRecord};
