//! Page fetcher
//!
//! This module drives one shard page through the channels, including:
//! - Pacing every request, page or posting detail, through the shared rate
//!   controller
//! - A hard timeout on each request
//! - Structured API first, rendered fallback on a non-auth failure or when
//!   the structured response has no readable card collection
//! - Early exit on a confirmed empty page, before any extraction
//! - Turning extracted postings into annotated job records

use crate::config::Config;
use crate::crawler::client::{ChannelClient, ChannelError, PageRequest};
use crate::crawler::detector::EmptyPageDetector;
use crate::crawler::page::{PageClass, PageShape, RawPage, StructuredPage};
use crate::crawler::posting::Posting;
use crate::crawler::rate::RateController;
use crate::crawler::repost::detect_repost;
use crate::records::{Channel, JobRecord};
use crate::shard::Shard;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// How a page fetch ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The page had results; `records` holds them
    Success,

    /// The page was confirmed empty; the shard has no more pages
    EmptyPage,

    /// Every channel failed for a reason worth retrying
    TransientError,

    /// The session was rejected; the run must stop
    FatalAuthError,
}

/// Result of fetching one shard page
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub records: Vec<JobRecord>,
    pub outcome: FetchOutcome,

    /// Channel of the last attempt made
    pub channel: Channel,

    /// Failure description for the error outcomes
    pub error: Option<String>,
}

impl FetchResult {
    fn failed(outcome: FetchOutcome, channel: Channel, error: &ChannelError) -> Self {
        Self {
            records: Vec::new(),
            outcome,
            channel,
            error: Some(error.to_string()),
        }
    }
}

/// Fetches shard pages, one attempt per channel per call
pub struct PageFetcher {
    client: Arc<dyn ChannelClient>,
    rate: Arc<Mutex<RateController>>,
    fetch_timeout: Duration,
    fallback_enabled: bool,
    detail_concurrency: usize,
    page_size: u32,
    web_base: String,

    /// Lowercased company substrings to drop
    company_blacklist: Vec<String>,
}

impl PageFetcher {
    pub fn new(
        config: &Config,
        client: Arc<dyn ChannelClient>,
        rate: Arc<Mutex<RateController>>,
    ) -> Self {
        Self {
            client,
            rate,
            fetch_timeout: config.scraper.fetch_timeout(),
            fallback_enabled: config.scraper.fallback_enabled,
            detail_concurrency: config.scraper.detail_concurrency.max(1),
            page_size: config.scraper.page_size,
            web_base: config.endpoints.web_base.trim_end_matches('/').to_string(),
            company_blacklist: config
                .filters
                .company_blacklist
                .iter()
                .map(|c| c.to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// Fetches one page of a shard
    ///
    /// # Flow
    ///
    /// | Structured API | Rendered fallback | Outcome |
    /// |----------------|-------------------|---------|
    /// | page | not tried | Success or EmptyPage |
    /// | no readable cards | page | Success or EmptyPage |
    /// | auth failure | not tried | FatalAuthError |
    /// | other failure | page | Success or EmptyPage |
    /// | other failure | auth failure | FatalAuthError |
    /// | other failure | other failure | TransientError |
    ///
    /// Retries are left to the caller.
    pub async fn fetch(&self, shard: &Shard, page_index: u32) -> FetchResult {
        let api_error = match self.attempt(shard, page_index, Channel::StructuredApi).await {
            Ok((page, class)) => return self.finish(shard, page_index, page, class),
            Err(error) if error.is_auth() => {
                tracing::error!("Structured API rejected the session on {}: {}", shard, error);
                return FetchResult::failed(
                    FetchOutcome::FatalAuthError,
                    Channel::StructuredApi,
                    &error,
                );
            }
            Err(error) => error,
        };

        if !self.fallback_enabled {
            tracing::debug!("Shard {} page {}: {}", shard, page_index, api_error);
            return FetchResult::failed(
                FetchOutcome::TransientError,
                Channel::StructuredApi,
                &api_error,
            );
        }

        tracing::debug!(
            "Shard {} page {}: API failed ({}), trying rendered page",
            shard,
            page_index,
            api_error
        );

        match self
            .attempt(shard, page_index, Channel::RenderedFallback)
            .await
        {
            Ok((page, class)) => self.finish(shard, page_index, page, class),
            Err(error) if error.is_auth() => {
                tracing::error!("Rendered page rejected the session on {}: {}", shard, error);
                FetchResult::failed(
                    FetchOutcome::FatalAuthError,
                    Channel::RenderedFallback,
                    &error,
                )
            }
            Err(error) => FetchResult::failed(
                FetchOutcome::TransientError,
                Channel::RenderedFallback,
                &error,
            ),
        }
    }

    /// One attempt through one channel
    ///
    /// On the structured channel this includes the detail requests for any
    /// cards shipped without posting details. A detail request that fails
    /// fails the whole attempt with its error.
    async fn attempt(
        &self,
        shard: &Shard,
        page_index: u32,
        channel: Channel,
    ) -> Result<(RawPage, PageClass), ChannelError> {
        let request = PageRequest {
            shard: shard.clone(),
            page_index,
            channel,
        };

        let mut page = self.paced(self.client.fetch_page(&request)).await?;
        let class = EmptyPageDetector::classify(&page);
        if class == PageClass::NoResults {
            return Ok((page, class));
        }

        // Only the rendered channel lets ambiguous markup through as results
        if let RawPage::Structured(structured) = &mut page {
            if class == PageClass::Indeterminate {
                return Err(ChannelError::Transient(
                    "job-cards response had no readable card collection".to_string(),
                ));
            }
            self.hydrate(structured).await?;
        }

        Ok((page, class))
    }

    /// Fetches details for every card that arrived without them
    async fn hydrate(&self, page: &mut StructuredPage) -> Result<(), ChannelError> {
        let missing = page.missing_postings();
        if missing.is_empty() {
            return Ok(());
        }

        let results: Vec<Result<Posting, ChannelError>> = stream::iter(missing)
            .map(|job_id| async move { self.paced(self.client.fetch_posting(&job_id)).await })
            .buffer_unordered(self.detail_concurrency)
            .collect()
            .await;

        let mut postings = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(posting) => postings.push(posting),
                Err(error) if error.is_auth() => return Err(error),
                Err(error) => {
                    failure.get_or_insert(error);
                }
            }
        }

        if let Some(error) = failure {
            tracing::debug!("Posting details failed: {}", error);
            return Err(error);
        }
        page.attach_postings(postings);
        Ok(())
    }

    /// Runs one request after the shared delay, under the fetch timeout
    ///
    /// The outcome is fed back to the rate controller.
    async fn paced<T>(
        &self,
        request: impl Future<Output = Result<T, ChannelError>>,
    ) -> Result<T, ChannelError> {
        let delay = self.rate.lock().await.next_delay();
        tokio::time::sleep(delay).await;

        let result = match tokio::time::timeout(self.fetch_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Timeout),
        };

        {
            let mut rate = self.rate.lock().await;
            match &result {
                Ok(_) => rate.record_outcome(true, false),
                Err(ChannelError::RateLimited(_)) => rate.record_outcome(false, true),
                Err(_) => rate.record_outcome(false, false),
            }
        }

        result
    }

    fn finish(&self, shard: &Shard, page_index: u32, page: RawPage, class: PageClass) -> FetchResult {
        let channel = page.channel();

        if class == PageClass::NoResults {
            tracing::debug!("Shard {} page {} is empty ({})", shard, page_index, channel);
            return FetchResult {
                records: Vec::new(),
                outcome: FetchOutcome::EmptyPage,
                channel,
                error: None,
            };
        }

        let observed_at = Utc::now();
        let shard_key = shard.key();
        let mut records = Vec::new();

        for job in page.extract_records() {
            let posting = job.posting;
            if self.is_blacklisted(&posting.company_name) {
                tracing::debug!(
                    "Dropping job {} from blacklisted company {}",
                    posting.job_id,
                    posting.company_name
                );
                continue;
            }

            let is_repost = posting.explicit_repost
                || detect_repost(
                    posting.posted_at,
                    observed_at,
                    job.rank,
                    page_index,
                    self.page_size,
                );
            let apply_url = posting
                .apply_url
                .unwrap_or_else(|| format!("{}/jobs/view/{}/", self.web_base, posting.job_id));

            records.push(JobRecord {
                job_id: posting.job_id,
                title: posting.title,
                company_name: posting.company_name,
                posted_at: posting.posted_at,
                is_repost,
                apply_url,
                source_channel: channel,
                shard_memberships: [shard_key.clone()].into_iter().collect(),
            });
        }

        tracing::debug!(
            "Shard {} page {}: {} records via {}",
            shard,
            page_index,
            records.len(),
            channel
        );

        FetchResult {
            records,
            outcome: FetchOutcome::Success,
            channel,
            error: None,
        }
    }

    fn is_blacklisted(&self, company: &str) -> bool {
        let company = company.to_lowercase();
        self.company_blacklist
            .iter()
            .any(|pattern| company.contains(pattern.as_str()))
    }
}
