//! Storage module for resumable progress
//!
//! This module handles the durable checkpoint of a run, including:
//! - Which shards are complete
//! - The last page fetched for every shard that has started
//! - The job ids and records collected so far
//! - Atomic writes, so a crash never destroys the last good checkpoint

mod checkpoint;
mod file;
mod traits;

pub use checkpoint::ProgressCheckpoint;
pub use file::FileProgressStore;
pub use traits::{ProgressStore, StorageError, StorageResult};
