//! Shardline: a sharded job-posting harvester
//!
//! This crate splits a job search into shards (experience level × employment
//! type × workplace arrangement), fetches each shard page by page through a
//! structured API channel with a rendered-page fallback, deduplicates the
//! postings across shards, and checkpoints progress so an interrupted run can
//! be resumed.

pub mod config;
pub mod crawler;
pub mod output;
pub mod records;
pub mod session;
pub mod shard;
pub mod storage;

use thiserror::Error;

/// Main error type for Shardline operations
#[derive(Debug, Error)]
pub enum ShardlineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Session error: {0}")]
    Session(#[from] session::SessionError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid shard transition for {key}: {from} -> {to}")]
    InvalidTransition {
        key: String,
        from: shard::ShardStatus,
        to: shard::ShardStatus,
    },

    #[error("Unknown shard: {0}")]
    UnknownShard(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Shardline operations
pub type Result<T> = std::result::Result<T, ShardlineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{RunReport, RunState, ScrapeOrchestrator};
pub use records::{Channel, Deduplicator, JobRecord};
pub use shard::{Shard, ShardPlanner, ShardStatus};
