//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint backends and
//! associated error types.

use crate::storage::ProgressCheckpoint;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored checkpoint exists but cannot be read back
    #[error("Corrupt checkpoint at {path}: {reason}")]
    CorruptCheckpoint { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint backends
///
/// Implementations are shared between workers, so they must be usable
/// from several tasks at once.
pub trait ProgressStore: Send + Sync {
    /// Reads the last saved checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Nothing has been saved yet
    /// * `Err(StorageError::CorruptCheckpoint)` - A checkpoint exists but
    ///   does not parse
    fn load(&self) -> StorageResult<Option<ProgressCheckpoint>>;

    /// Replaces the saved checkpoint
    ///
    /// Must be atomic: after a crash either the old or the new checkpoint
    /// is readable, never a partial one.
    fn save(&self, checkpoint: &ProgressCheckpoint) -> StorageResult<()>;

    /// Discards the saved checkpoint, if any
    fn clear(&self) -> StorageResult<()>;
}
