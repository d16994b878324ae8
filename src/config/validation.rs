use crate::config::types::{
    Config, EndpointConfig, OutputConfig, RateConfig, ScraperConfig, SearchConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_rate_config(&config.rate)?;
    validate_search_config(&config.search)?;
    validate_endpoint_config(&config.endpoints)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates worker and pagination settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.max_pages_per_shard < 1 {
        return Err(ConfigError::Validation(
            "max_pages_per_shard must be >= 1".to_string(),
        ));
    }

    if config.page_size < 1 || config.page_size > 100 {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and 100, got {}",
            config.page_size
        )));
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.max_shards == Some(0) {
        return Err(ConfigError::Validation(
            "max_shards must be >= 1 when set".to_string(),
        ));
    }

    if config.detail_concurrency < 1 {
        return Err(ConfigError::Validation(
            "detail_concurrency must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates pacing parameters
fn validate_rate_config(config: &RateConfig) -> Result<(), ConfigError> {
    if !(config.base_delay_secs >= 0.0) {
        return Err(ConfigError::Validation(format!(
            "base_delay_secs must be >= 0, got {}",
            config.base_delay_secs
        )));
    }

    if !(config.max_delay_secs >= config.base_delay_secs) {
        return Err(ConfigError::Validation(format!(
            "max_delay_secs ({}) must be >= base_delay_secs ({})",
            config.max_delay_secs, config.base_delay_secs
        )));
    }

    if !(config.backoff_factor >= 1.0) {
        return Err(ConfigError::Validation(format!(
            "backoff_factor must be >= 1.0, got {}",
            config.backoff_factor
        )));
    }

    if !(config.decay_step_secs >= 0.0) {
        return Err(ConfigError::Validation(format!(
            "decay_step_secs must be >= 0, got {}",
            config.decay_step_secs
        )));
    }

    if config.failure_threshold < 1 || config.success_threshold < 1 {
        return Err(ConfigError::Validation(
            "failure_threshold and success_threshold must be >= 1".to_string(),
        ));
    }

    if !(0.0..1.0).contains(&config.jitter) {
        return Err(ConfigError::Validation(format!(
            "jitter must be in [0, 1), got {}",
            config.jitter
        )));
    }

    Ok(())
}

/// Validates the shard space and search terms
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.keywords.trim().is_empty() {
        return Err(ConfigError::Validation(
            "keywords cannot be empty".to_string(),
        ));
    }

    validate_code_set("experience_codes", &config.experience_codes)?;
    validate_code_set("job_type_codes", &config.job_type_codes)?;
    validate_code_set("workplace_codes", &config.workplace_codes)?;

    Ok(())
}

/// A code set must be non-empty, free of duplicates, and usable in a shard key
fn validate_code_set(name: &str, codes: &[String]) -> Result<(), ConfigError> {
    if codes.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{} must contain at least one code",
            name
        )));
    }

    let mut seen = HashSet::new();
    for code in codes {
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "{} contains invalid code '{}'",
                name, code
            )));
        }
        if !seen.insert(code) {
            return Err(ConfigError::Validation(format!(
                "{} contains duplicate code '{}'",
                name, code
            )));
        }
    }

    Ok(())
}

/// Validates endpoint URLs
fn validate_endpoint_config(config: &EndpointConfig) -> Result<(), ConfigError> {
    for (name, value) in [("api_base", &config.api_base), ("web_base", &config.web_base)] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("checkpoint_path", &config.checkpoint_path),
        ("jobs_path", &config.jobs_path),
        ("shard_report_path", &config.shard_report_path),
        ("mappings_path", &config.mappings_path),
        ("summary_path", &config.summary_path),
    ] {
        if value.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}
