//! Shared fixtures: a fast test configuration and a scripted channel client

use async_trait::async_trait;
use chrono::Utc;
use shardline::config::{Config, RateConfig};
use shardline::crawler::{
    ChannelClient, ChannelError, PageRequest, Posting, RawPage, RenderedPage, StructuredPage,
};
use shardline::records::Channel;
use std::collections::HashMap;
use std::sync::Mutex;

/// Configuration with near-zero delays and one worker
pub fn fast_config(
    experience_codes: &[&str],
    job_type_codes: &[&str],
    workplace_codes: &[&str],
) -> Config {
    let codes = |c: &[&str]| c.iter().map(|s| s.to_string()).collect();

    let mut config = Config::default();
    config.rate = RateConfig {
        base_delay_secs: 0.001,
        max_delay_secs: 0.005,
        jitter: 0.0,
        ..RateConfig::default()
    };
    config.scraper.workers = 1;
    config.scraper.fetch_timeout_secs = 5;
    config.scraper.fallback_enabled = false;
    config.search.experience_codes = codes(experience_codes);
    config.search.job_type_codes = codes(job_type_codes);
    config.search.workplace_codes = codes(workplace_codes);
    config.endpoints.web_base = "https://jobs.example.com".to_string();
    config
}

pub fn posting(job_id: &str) -> Posting {
    Posting {
        job_id: job_id.to_string(),
        title: format!("Engineer {}", job_id),
        company_name: "Acme".to_string(),
        posted_at: Some(Utc::now()),
        explicit_repost: false,
        apply_url: None,
    }
}

/// Structured page whose cards all come with posting details
pub fn results_page(job_ids: &[String]) -> RawPage {
    let postings: HashMap<String, Posting> = job_ids
        .iter()
        .map(|id| (id.clone(), posting(id)))
        .collect();
    RawPage::Structured(StructuredPage {
        job_ids: Some(job_ids.to_vec()),
        postings,
        unreadable_cards: 0,
    })
}

/// Structured page with an empty card collection
pub fn empty_page() -> RawPage {
    RawPage::Structured(StructuredPage {
        job_ids: Some(Vec::new()),
        postings: HashMap::new(),
        unreadable_cards: 0,
    })
}

pub fn rendered_no_results() -> RawPage {
    RawPage::Rendered(RenderedPage::new(
        r#"<html><body><div class="jobs-search-no-results-banner">No matching jobs</div></body></html>"#,
    ))
}

type Script = dyn Fn(&PageRequest, usize) -> Result<RawPage, ChannelError> + Send + Sync;

/// One recorded page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub shard_key: String,
    pub page_index: u32,
    pub channel: Channel,
}

/// Channel client that answers from a script
///
/// The script receives the request and the zero-based order in which its
/// shard was first requested, so tests can target "the third shard".
pub struct ScriptedClient {
    script: Box<Script>,
    calls: Mutex<Vec<Call>>,
    shard_order: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new(
        script: impl Fn(&PageRequest, usize) -> Result<RawPage, ChannelError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            shard_order: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, shard_key: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.shard_key == shard_key)
            .collect()
    }

    /// Shard keys in the order they were first requested
    pub fn shard_order(&self) -> Vec<String> {
        self.shard_order.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelClient for ScriptedClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, ChannelError> {
        let key = request.shard.key();
        self.calls.lock().unwrap().push(Call {
            shard_key: key.clone(),
            page_index: request.page_index,
            channel: request.channel,
        });

        let position = {
            let mut order = self.shard_order.lock().unwrap();
            match order.iter().position(|k| *k == key) {
                Some(position) => position,
                None => {
                    order.push(key);
                    order.len() - 1
                }
            }
        };
        (self.script)(request, position)
    }

    async fn fetch_posting(&self, job_id: &str) -> Result<Posting, ChannelError> {
        Ok(posting(job_id))
    }
}

/// Two jobs per page, ids unique per shard and page
pub fn page_ids(request: &PageRequest) -> Vec<String> {
    (0..2)
        .map(|n| format!("{}{}{}", request.shard.key().replace('_', ""), request.page_index, n))
        .collect()
}
