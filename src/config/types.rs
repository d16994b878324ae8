use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Shardline
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub rate: RateConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub filters: FilterConfig,
}

/// Worker pool and pagination behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ScraperConfig {
    /// Number of shards processed in parallel
    pub workers: usize,

    /// Hard ceiling on pages fetched for a single shard
    pub max_pages_per_shard: u32,

    /// Results requested per page (also the pagination stride)
    pub page_size: u32,

    /// Hard timeout for one fetch attempt, in seconds
    pub fetch_timeout_secs: u64,

    /// Retries allowed for a page after its first transient failure
    pub retry_budget: u32,

    /// Only the first N shards of the plan are scheduled
    pub max_shards: Option<usize>,

    /// Whether the rendered-page channel is tried when the API fails
    pub fallback_enabled: bool,

    /// Persist the checkpoint after every page, not only per shard
    pub checkpoint_every_page: bool,

    /// Concurrent posting-detail requests within one structured page
    pub detail_concurrency: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            max_pages_per_shard: 5,
            page_size: 25,
            fetch_timeout_secs: 15,
            retry_budget: 3,
            max_shards: None,
            fallback_enabled: true,
            checkpoint_every_page: false,
            detail_concurrency: 10,
        }
    }
}

impl ScraperConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Adaptive pacing parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateConfig {
    /// Delay used when nothing has gone wrong; also the floor
    pub base_delay_secs: f64,

    /// Ceiling the delay never exceeds
    pub max_delay_secs: f64,

    /// Multiplier applied on rate limiting or a run of failures
    pub backoff_factor: f64,

    /// Amount subtracted after a run of successes
    pub decay_step_secs: f64,

    /// Consecutive failures that trigger a backoff step
    pub failure_threshold: u32,

    /// Consecutive successes that trigger a decay step
    pub success_threshold: u32,

    /// Random spread applied to each delay, as a fraction of it
    pub jitter: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: 1.0,
            max_delay_secs: 30.0,
            backoff_factor: 2.0,
            decay_step_secs: 0.5,
            failure_threshold: 3,
            success_threshold: 5,
            jitter: 0.2,
        }
    }
}

/// Search query and the shard space
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SearchConfig {
    /// Raw (unencoded) search keywords
    pub keywords: String,

    /// Vendor geo identifier
    pub geo_id: String,

    /// Human-readable location used by the rendered search page
    pub location: String,

    /// Posting age filter (`r86400` for a day, `r604800` for a week)
    pub time_posted: String,

    pub experience_codes: Vec<String>,
    pub job_type_codes: Vec<String>,
    pub workplace_codes: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let codes = |c: &[&str]| c.iter().map(|s| s.to_string()).collect();
        Self {
            keywords: "\"AI\" OR \"Generative AI\" OR \"LLM\"".to_string(),
            geo_id: "103644278".to_string(),
            location: "United States".to_string(),
            time_posted: "r604800".to_string(),
            experience_codes: codes(crate::shard::codes::EXPERIENCE_CODES),
            job_type_codes: codes(crate::shard::codes::JOB_TYPE_CODES),
            workplace_codes: codes(crate::shard::codes::WORKPLACE_CODES),
        }
    }
}

/// Where requests are sent
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EndpointConfig {
    /// Base URL of the structured API
    pub api_base: String,

    /// Base URL of the rendered search pages
    pub web_base: String,

    pub user_agent: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.linkedin.com".to_string(),
            web_base: "https://www.linkedin.com".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// Session bundle produced by the external login tooling
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionConfig {
    pub cookie_file: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_file: "li_cookies.json".to_string(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct OutputConfig {
    /// Resumable progress checkpoint
    pub checkpoint_path: String,

    /// Deduplicated job records
    pub jobs_path: String,

    /// Per-shard counts and statuses
    pub shard_report_path: String,

    /// Job id to shard keys mapping
    pub mappings_path: String,

    /// Markdown run summary
    pub summary_path: String,

    /// Optional SQLite export of the finished record set
    pub database_path: Option<String>,

    /// Optional previous shard report used to prioritize productive shards
    pub history_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: "data/scraping_progress.json".to_string(),
            jobs_path: "data/jobs.json".to_string(),
            shard_report_path: "data/shard_report.json".to_string(),
            mappings_path: "data/shard_mappings.json".to_string(),
            summary_path: "data/summary.md".to_string(),
            database_path: None,
            history_path: None,
        }
    }
}

/// Record-level filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FilterConfig {
    /// Case-insensitive substrings; matching companies are dropped
    pub company_blacklist: Vec<String>,
}
