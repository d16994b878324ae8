//! Channel clients
//!
//! This module handles the HTTP side of both channels, including:
//! - Building the HTTP client and the session headers
//! - Job-cards requests against the structured API
//! - Posting detail requests for cards shipped without details
//! - Search page requests for the rendered fallback
//! - Mapping HTTP outcomes to auth, rate-limit, and transient failures

use crate::config::{Config, EndpointConfig, SearchConfig};
use crate::crawler::page::{RawPage, RenderedPage, StructuredPage};
use crate::crawler::posting::Posting;
use crate::records::Channel;
use crate::session::Session;
use crate::shard::Shard;
use async_trait::async_trait;
use reqwest::{header, redirect::Policy, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Vendor status code for blocked or throttled clients
const VENDOR_THROTTLE_STATUS: u16 = 999;

/// Redirect targets that mean the session is no longer accepted
const AUTH_REDIRECT_MARKERS: [&str; 3] = ["login", "authwall", "checkpoint"];

const API_ACCEPT: &str = "application/vnd.linkedin.normalized+json+2.1";

/// One fetch attempt for one page of one shard
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub shard: Shard,
    pub page_index: u32,
    pub channel: Channel,
}

/// Why a channel request failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The session was rejected; retrying cannot help
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited (HTTP {0})")]
    RateLimited(u16),

    #[error("Request timed out")]
    Timeout,

    #[error("Transient failure: {0}")]
    Transient(String),
}

impl ChannelError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Transport for page and posting requests
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Fetches one page through the channel named in the request
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, ChannelError>;

    /// Fetches the posting details for one structured-channel job id
    ///
    /// Callers pace and time-limit each call like a page request.
    async fn fetch_posting(&self, job_id: &str) -> Result<Posting, ChannelError>;
}

/// Builds the HTTP client shared by both channels
///
/// Redirects are not followed so a bounce to the login wall can be seen.
pub fn build_http_client(
    endpoints: &EndpointConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(endpoints.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Maps a non-success HTTP status to a channel failure
///
/// Returns None for success statuses.
///
/// | Status | Failure |
/// |--------|---------|
/// | 401, 403 | Auth |
/// | 3xx to a login or authwall page | Auth |
/// | 429, 999 | RateLimited |
/// | anything else | Transient |
pub fn classify_status(status: StatusCode, location: Option<&str>) -> Option<ChannelError> {
    if status.is_success() {
        return None;
    }

    let code = status.as_u16();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Some(ChannelError::Auth(format!("HTTP {}", code)));
    }

    if status.is_redirection() {
        let target = location.unwrap_or("");
        let lowered = target.to_lowercase();
        if AUTH_REDIRECT_MARKERS.iter().any(|m| lowered.contains(m)) {
            return Some(ChannelError::Auth(format!("redirected to {}", target)));
        }
        return Some(ChannelError::Transient(format!(
            "unexpected redirect ({}) to {}",
            code, target
        )));
    }

    if status == StatusCode::TOO_MANY_REQUESTS || code == VENDOR_THROTTLE_STATUS {
        return Some(ChannelError::RateLimited(code));
    }

    Some(ChannelError::Transient(format!("HTTP {}", code)))
}

fn check_response(response: &Response) -> Result<(), ChannelError> {
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok());
    match classify_status(response.status(), location) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

fn transport_error(error: reqwest::Error) -> ChannelError {
    if error.is_timeout() {
        ChannelError::Timeout
    } else {
        ChannelError::Transient(error.to_string())
    }
}

/// Percent-encodes keywords for the API query, spaces as `%20`
fn encode_keywords(keywords: &str) -> String {
    url::form_urlencoded::byte_serialize(keywords.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Channel client that talks to the live endpoints
pub struct HttpChannelClient {
    client: Client,
    session: Session,
    endpoints: EndpointConfig,
    search: SearchConfig,
    page_size: u32,
}

impl HttpChannelClient {
    pub fn new(config: &Config, session: Session) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.endpoints, config.scraper.fetch_timeout())?;
        Ok(Self {
            client,
            session,
            endpoints: config.endpoints.clone(),
            search: config.search.clone(),
            page_size: config.scraper.page_size,
        })
    }

    /// Job-cards collection URL for one shard page
    pub fn structured_url(&self, shard: &Shard, page_index: u32) -> String {
        format!(
            "{}/voyager/api/voyagerJobsDashJobCards\
             ?decorationId=com.linkedin.voyager.dash.deco.jobs.search.JobSearchCardsCollectionLite-88\
             &count={}&q=jobSearch\
             &query=(origin:JOB_SEARCH_PAGE_JOB_FILTER,keywords:{},locationUnion:(geoId:{}),\
             selectedFilters:(experience:List({}),jobType:List({}),workplaceType:List({}),\
             timePostedRange:List({})),spellCorrectionEnabled:true)\
             &servedEventEnabled=false&start={}",
            self.endpoints.api_base.trim_end_matches('/'),
            self.page_size,
            encode_keywords(&self.search.keywords),
            self.search.geo_id,
            shard.experience_code,
            shard.job_type_code,
            shard.workplace_code,
            self.search.time_posted,
            page_index * self.page_size,
        )
    }

    fn api_get(&self, url: &str) -> RequestBuilder {
        self.client
            .get(url)
            .header(header::COOKIE, &self.session.cookie_header)
            .header("csrf-token", &self.session.csrf_token)
            .header(header::ACCEPT, API_ACCEPT)
            .header("x-restli-protocol-version", "2.0.0")
    }

    async fn fetch_structured(&self, request: &PageRequest) -> Result<RawPage, ChannelError> {
        let url = self.structured_url(&request.shard, request.page_index);
        let response = self.api_get(&url).send().await.map_err(transport_error)?;
        check_response(&response)?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| ChannelError::Transient(format!("invalid job-cards body: {}", e)))?;
        Ok(RawPage::Structured(StructuredPage::from_json(&value)))
    }

    async fn fetch_rendered(&self, request: &PageRequest) -> Result<RawPage, ChannelError> {
        let url = format!(
            "{}/jobs/search/",
            self.endpoints.web_base.trim_end_matches('/')
        );
        let shard = &request.shard;
        let start = (request.page_index * self.page_size).to_string();
        let query = [
            ("keywords", self.search.keywords.as_str()),
            ("location", self.search.location.as_str()),
            ("geoId", self.search.geo_id.as_str()),
            ("f_E", shard.experience_code.as_str()),
            ("f_JT", shard.job_type_code.as_str()),
            ("f_WT", shard.workplace_code.as_str()),
            ("f_TPR", self.search.time_posted.as_str()),
            ("sortBy", "DD"),
            ("start", start.as_str()),
        ];

        let response = self
            .client
            .get(&url)
            .query(&query)
            .header(header::COOKIE, &self.session.cookie_header)
            .header(header::ACCEPT, "text/html")
            .send()
            .await
            .map_err(transport_error)?;
        check_response(&response)?;

        let html = response.text().await.map_err(transport_error)?;
        Ok(RawPage::Rendered(RenderedPage::new(html)))
    }
}

#[async_trait]
impl ChannelClient for HttpChannelClient {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawPage, ChannelError> {
        match request.channel {
            Channel::StructuredApi => self.fetch_structured(request).await,
            Channel::RenderedFallback => self.fetch_rendered(request).await,
        }
    }

    async fn fetch_posting(&self, job_id: &str) -> Result<Posting, ChannelError> {
        let url = format!(
            "{}/voyager/api/jobs/jobPostings/{}",
            self.endpoints.api_base.trim_end_matches('/'),
            job_id
        );
        let response = self.api_get(&url).send().await.map_err(transport_error)?;
        check_response(&response)?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| ChannelError::Transient(format!("invalid posting body: {}", e)))?;
        Ok(Posting::from_json(job_id, &value))
    }
}
