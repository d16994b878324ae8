//! Field extraction for structured job-posting entities

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Placeholder for fields the source did not provide
pub const UNKNOWN_FIELD: &str = "N/A";

/// Posting-time fields in the order they are trusted
const POSTED_AT_FIELDS: [&str; 3] = ["timeAt", "listedAt", "postedAt"];

/// One job posting as read from either channel, before shard annotation
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    pub job_id: String,
    pub title: String,
    pub company_name: String,
    pub posted_at: Option<DateTime<Utc>>,

    /// The source itself marks the posting as re-published
    pub explicit_repost: bool,

    /// None when the fallback job-view URL should be used
    pub apply_url: Option<String>,
}

impl Posting {
    /// Reads a posting entity (a detail response or an `included` entry)
    ///
    /// Detail responses wrap the entity in `data`; both shapes are accepted.
    pub fn from_json(job_id: &str, value: &Value) -> Self {
        let entity = value.get("data").filter(|d| d.is_object()).unwrap_or(value);

        let title = entity
            .get("title")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNKNOWN_FIELD)
            .to_string();

        Self {
            job_id: job_id.to_string(),
            title,
            company_name: company_name(entity),
            posted_at: posted_at(entity),
            explicit_repost: explicit_repost(entity),
            apply_url: apply_url(entity),
        }
    }
}

/// Returns the first run of ASCII digits in `s`
///
/// Vendor URNs carry the numeric job id, e.g.
/// `urn:li:fsd_jobPostingCard:(4289326695,JOB_DETAILS)`.
pub fn first_digit_run(s: &str) -> Option<&str> {
    let start = s.find(|c: char| c.is_ascii_digit())?;
    let rest = &s[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn posted_at(entity: &Value) -> Option<DateTime<Utc>> {
    POSTED_AT_FIELDS.iter().find_map(|field| {
        let value = entity.get(*field)?;
        let millis = value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))?;
        Utc.timestamp_millis_opt(millis).single()
    })
}

fn explicit_repost(entity: &Value) -> bool {
    let listed = entity.get("listedAt").and_then(Value::as_i64);
    let original = entity.get("originalListedAt").and_then(Value::as_i64);

    if let (Some(listed), Some(original)) = (listed, original) {
        return listed != original;
    }

    match entity.get("repostedJobPosting") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(urn)) => !urn.is_empty(),
        Some(Value::Object(_)) => true,
        _ => false,
    }
}

/// Company from the URL path segment, falling back to company details
///
/// Path segments look like `junior-legal-specialist-at-robin-ai-4289326695`.
fn company_name(entity: &Value) -> String {
    let from_path = entity
        .get("urlPathSegment")
        .and_then(Value::as_str)
        .and_then(|segment| segment.split_once("-at-"))
        .map(|(_, company)| {
            let mut words: Vec<&str> = company.split('-').collect();
            words.pop();
            title_case(&words.join(" "))
        })
        .filter(|name| !name.is_empty());

    if let Some(name) = from_path {
        return name;
    }

    entity
        .get("companyDetails")
        .and_then(|details| {
            details
                .get("companyName")
                .and_then(Value::as_str)
                .or_else(|| details.pointer("/company/name").and_then(Value::as_str))
        })
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_FIELD.to_string())
}

/// The company's own apply URL, directly or inside a typed wrapper
fn apply_url(entity: &Value) -> Option<String> {
    let method = entity.get("applyMethod")?;

    let direct = method.get("companyApplyUrl").and_then(Value::as_str);
    let wrapped = || {
        method.as_object()?.values().find_map(|inner| {
            inner.get("companyApplyUrl").and_then(Value::as_str)
        })
    };

    direct
        .or_else(wrapped)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
