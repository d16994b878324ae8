//! Crawler module for shard fetching and run orchestration
//!
//! This module contains the core scraping logic, including:
//! - Adaptive request pacing
//! - Channel clients for the structured API and rendered pages
//! - Page shapes, emptiness detection, and record extraction
//! - Repost detection
//! - Overall run orchestration

mod client;
mod detector;
mod fetcher;
mod orchestrator;
mod page;
mod posting;
mod rate;
mod repost;

pub use client::{
    build_http_client, classify_status, ChannelClient, ChannelError, HttpChannelClient,
    PageRequest,
};
pub use detector::EmptyPageDetector;
pub use fetcher::{FetchOutcome, FetchResult, PageFetcher};
pub use orchestrator::{
    AbortReason, RunOptions, RunReport, RunState, ScrapeOrchestrator, ShardReportEntry,
    EXIT_AUTH_FAILURE, EXIT_COMPLETED, EXIT_ERROR, EXIT_INTERRUPTED,
};
pub use page::{ExtractedJob, PageClass, PageShape, RawPage, RenderedPage, StructuredPage};
pub use posting::{first_digit_run, Posting, UNKNOWN_FIELD};
pub use rate::{RateController, RateState};
pub use repost::{detect_repost, REPOST_BASE_SLACK_HOURS, REPOST_HOURS_PER_RANK};
