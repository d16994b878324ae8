//! HTTP channel client against mock servers
//!
//! These tests use wiremock to stand in for the structured API and the
//! rendered search pages.

use serde_json::json;
use shardline::config::{Config, RateConfig};
use shardline::crawler::{
    ChannelClient, ChannelError, FetchOutcome, HttpChannelClient, PageClass, PageFetcher,
    PageRequest, PageShape, RateController, RawPage,
};
use shardline::records::Channel;
use shardline::session::Session;
use shardline::shard::Shard;
use std::sync::Arc;
use tokio::sync::Mutex;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CARDS_PATH: &str = "/voyager/api/voyagerJobsDashJobCards";

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.endpoints.api_base = server.uri();
    config.endpoints.web_base = server.uri();
    config.search.keywords = "rust engineer".to_string();
    config.search.geo_id = "103644278".to_string();
    config.search.time_posted = "r86400".to_string();
    config.scraper.page_size = 25;
    config.scraper.fetch_timeout_secs = 5;
    config.rate = RateConfig {
        base_delay_secs: 0.001,
        max_delay_secs: 0.01,
        jitter: 0.0,
        ..RateConfig::default()
    };
    config
}

fn session() -> Session {
    Session {
        cookie_header: "li_at=token; JSESSIONID=\"ajax:123\"".to_string(),
        csrf_token: "ajax:123".to_string(),
    }
}

fn client_for(server: &MockServer) -> HttpChannelClient {
    HttpChannelClient::new(&config_for(server), session()).unwrap()
}

fn request(channel: Channel, page_index: u32) -> PageRequest {
    PageRequest {
        shard: Shard::new("4", "F", "2"),
        page_index,
        channel,
    }
}

#[tokio::test]
async fn test_structured_page_with_included_postings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARDS_PATH))
        .and(header("csrf-token", "ajax:123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "elements": [
                    {"jobCardUnion": {"*jobPostingCard": "urn:li:fsd_jobPostingCard:(4100000001,JOB_DETAILS)"}},
                    {"jobCardUnion": {"*jobPostingCard": "urn:li:fsd_jobPostingCard:(4100000002,JOB_DETAILS)"}}
                ]
            },
            "included": [
                {
                    "$type": "com.linkedin.voyager.dash.jobs.JobPosting",
                    "entityUrn": "urn:li:fsd_jobPosting:4100000001",
                    "title": "Rust Engineer",
                    "companyDetails": {"companyName": "Ferrous Systems"}
                },
                {
                    "$type": "com.linkedin.voyager.dash.jobs.JobPosting",
                    "entityUrn": "urn:li:fsd_jobPosting:4100000002",
                    "title": "Platform Engineer",
                    "urlPathSegment": "platform-engineer-at-acme-robotics-4100000002"
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server)
        .fetch_page(&request(Channel::StructuredApi, 0))
        .await
        .unwrap();

    assert_eq!(page.channel(), Channel::StructuredApi);
    assert_eq!(page.classify_empty(), PageClass::HasResults);

    let jobs = page.extract_records();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].posting.job_id, "4100000001");
    assert_eq!(jobs[0].posting.company_name, "Ferrous Systems");
    assert_eq!(jobs[1].posting.company_name, "Acme Robotics");
}

#[tokio::test]
async fn test_structured_page_offset_follows_page_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARDS_PATH))
        .and(query_param("start", "50"))
        .and(query_param("count", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"elements": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server)
        .fetch_page(&request(Channel::StructuredApi, 2))
        .await
        .unwrap();

    assert_eq!(page.classify_empty(), PageClass::NoResults);
}

#[tokio::test]
async fn test_missing_postings_are_fetched_individually() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/voyager/api/jobs/jobPostings/4100000003"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"title": "Compiler Engineer", "companyDetails": {"companyName": "Oxide"}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/voyager/api/jobs/jobPostings/4100000004"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let posting = client.fetch_posting("4100000003").await.unwrap();
    let error = client.fetch_posting("4100000004").await.unwrap_err();

    assert_eq!(posting.job_id, "4100000003");
    assert_eq!(posting.title, "Compiler Engineer");
    assert_eq!(posting.company_name, "Oxide");
    assert!(matches!(error, ChannelError::Transient(_)));
}

#[tokio::test]
async fn test_throttled_details_keep_page_for_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARDS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "elements": [
                    {"jobCardUnion": {"*jobPostingCard": "urn:li:fsd_jobPostingCard:(4100000021,JOB_DETAILS)"}},
                    {"jobCardUnion": {"*jobPostingCard": "urn:li:fsd_jobPostingCard:(4100000022,JOB_DETAILS)"}}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/voyager/api/jobs/jobPostings/4100000021"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/voyager/api/jobs/jobPostings/4100000022"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.scraper.fallback_enabled = false;
    let rate = Arc::new(Mutex::new(RateController::new(config.rate.clone())));
    let client = Arc::new(HttpChannelClient::new(&config, session()).unwrap());
    let fetcher = PageFetcher::new(&config, client, rate.clone());

    let result = fetcher.fetch(&Shard::new("4", "F", "2"), 0).await;

    assert_eq!(result.outcome, FetchOutcome::TransientError);
    assert!(result.records.is_empty());
    assert_eq!(result.error.as_deref(), Some("Rate limited (HTTP 429)"));

    // Both throttled detail requests went through the shared controller
    let state = rate.lock().await.state().clone();
    assert_eq!(state.consecutive_failures, 2);
    assert!(state.current_delay_secs > config.rate.base_delay_secs);
}

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARDS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .fetch_page(&request(Channel::StructuredApi, 0))
        .await
        .unwrap_err();

    assert!(error.is_auth());
}

#[tokio::test]
async fn test_login_redirect_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/search/"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "https://www.linkedin.com/authwall?trk=x"),
        )
        .mount(&server)
        .await;

    let error = client_for(&server)
        .fetch_page(&request(Channel::RenderedFallback, 0))
        .await
        .unwrap_err();

    assert!(matches!(error, ChannelError::Auth(_)));
}

#[tokio::test]
async fn test_rate_limit_statuses_are_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARDS_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/jobs/search/"))
        .respond_with(ResponseTemplate::new(999))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let api = client
        .fetch_page(&request(Channel::StructuredApi, 0))
        .await
        .unwrap_err();
    let rendered = client
        .fetch_page(&request(Channel::RenderedFallback, 0))
        .await
        .unwrap_err();

    assert_eq!(api, ChannelError::RateLimited(429));
    assert_eq!(rendered, ChannelError::RateLimited(999));
    assert!(!api.is_auth());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CARDS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let error = client_for(&server)
        .fetch_page(&request(Channel::StructuredApi, 0))
        .await
        .unwrap_err();

    assert!(matches!(error, ChannelError::Transient(_)));
}

#[tokio::test]
async fn test_rendered_search_query_and_cards() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/search/"))
        .and(query_param("keywords", "rust engineer"))
        .and(query_param("f_E", "4"))
        .and(query_param("f_JT", "F"))
        .and(query_param("f_WT", "2"))
        .and(query_param("f_TPR", "r86400"))
        .and(query_param("sortBy", "DD"))
        .and(query_param("start", "25"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><ul class="jobs-search__results-list">
                <li data-occludable-job-id="4100000009">
                  <h3><a href="https://www.linkedin.com/jobs/view/4100000009/"><span title="Backend Engineer">Backend Engineer</span></a></h3>
                  <h4><a>Initech</a></h4>
                  <time datetime="2025-08-19">1 day ago</time>
                </li>
            </ul></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let page = client_for(&server)
        .fetch_page(&request(Channel::RenderedFallback, 1))
        .await
        .unwrap();

    assert!(matches!(page, RawPage::Rendered(_)));
    assert_eq!(page.classify_empty(), PageClass::HasResults);
    let jobs = page.extract_records();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].posting.title, "Backend Engineer");
    assert_eq!(jobs[0].posting.company_name, "Initech");
}

#[tokio::test]
async fn test_rendered_no_results_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs/search/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div class="jobs-search-no-results-banner">No matching jobs found.</div></body></html>"#,
        ))
        .mount(&server)
        .await;

    let page = client_for(&server)
        .fetch_page(&request(Channel::RenderedFallback, 3))
        .await
        .unwrap();

    assert_eq!(page.classify_empty(), PageClass::NoResults);
    assert!(page.extract_records().is_empty());
}
