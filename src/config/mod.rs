//! Configuration module for Shardline
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use shardline::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("shardline.toml")).unwrap();
//! println!("Workers: {}", config.scraper.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, EndpointConfig, FilterConfig, OutputConfig, RateConfig, ScraperConfig, SearchConfig,
    SessionConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
