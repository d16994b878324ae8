//! Repost heuristic from posting-date anomalies
//!
//! Search results are requested newest first, so a card near the top of the
//! listing is expected to be recent. A card whose posting date is much older
//! than its position allows has most likely been re-published and bumped
//! back up the list.

use chrono::{DateTime, Duration, Utc};

/// Age any card may have regardless of rank, in hours
pub const REPOST_BASE_SLACK_HOURS: i64 = 72;

/// Extra age allowed per position down the listing, in hours
pub const REPOST_HOURS_PER_RANK: i64 = 2;

/// Flags a posting as a likely repost
///
/// The overall rank is `page_index * page_size + page_rank`. The posting is
/// flagged when it is older than
/// `REPOST_BASE_SLACK_HOURS + rank * REPOST_HOURS_PER_RANK` at `observed_at`.
/// Postings without a date, or dated after `observed_at`, are never flagged.
pub fn detect_repost(
    posted_at: Option<DateTime<Utc>>,
    observed_at: DateTime<Utc>,
    page_rank: usize,
    page_index: u32,
    page_size: u32,
) -> bool {
    let Some(posted_at) = posted_at else {
        return false;
    };

    let age = observed_at.signed_duration_since(posted_at);
    if age <= Duration::zero() {
        return false;
    }

    let rank = page_index as i64 * page_size as i64 + page_rank as i64;
    let allowance = Duration::hours(REPOST_BASE_SLACK_HOURS + rank * REPOST_HOURS_PER_RANK);

    age > allowance
}
