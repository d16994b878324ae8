use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Data-acquisition method for a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// The vendor's JSON API
    #[serde(rename = "api")]
    StructuredApi,

    /// The HTML search results page
    #[serde(rename = "dom")]
    RenderedFallback,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuredApi => "api",
            Self::RenderedFallback => "dom",
        }
    }

    /// API data outranks rendered-page data for the same job
    pub fn outranks(&self, other: Channel) -> bool {
        matches!(
            (self, other),
            (Self::StructuredApi, Self::RenderedFallback)
        )
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized job posting
///
/// `job_id` is the dedup key. `shard_memberships` only ever grows; the
/// scalar fields belong to the first channel that produced the record,
/// unless an API record later replaces rendered-page data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub title: String,
    pub company_name: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub is_repost: bool,
    pub apply_url: String,
    pub source_channel: Channel,
    #[serde(default)]
    pub shard_memberships: BTreeSet<String>,
}

impl JobRecord {
    /// Replaces every scalar field with the other record's values
    pub(crate) fn adopt_scalars(&mut self, other: &JobRecord) {
        self.title = other.title.clone();
        self.company_name = other.company_name.clone();
        self.posted_at = other.posted_at;
        self.is_repost = other.is_repost;
        self.apply_url = other.apply_url.clone();
        self.source_channel = other.source_channel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_ranking() {
        assert!(Channel::StructuredApi.outranks(Channel::RenderedFallback));
        assert!(!Channel::RenderedFallback.outranks(Channel::StructuredApi));
        assert!(!Channel::StructuredApi.outranks(Channel::StructuredApi));
    }

    #[test]
    fn test_channel_serialized_names() {
        assert_eq!(
            serde_json::to_string(&Channel::StructuredApi).unwrap(),
            "\"api\""
        );
        assert_eq!(
            serde_json::to_string(&Channel::RenderedFallback).unwrap(),
            "\"dom\""
        );
    }

    #[test]
    fn test_record_deserializes_without_memberships() {
        let json = r#"{
            "job_id": "42",
            "title": "ML Engineer",
            "company_name": "Acme",
            "posted_at": null,
            "is_repost": false,
            "apply_url": "https://example.com/jobs/view/42/",
            "source_channel": "dom"
        }"#;
        let record: JobRecord = serde_json::from_str(json).unwrap();
        assert!(record.shard_memberships.is_empty());
        assert_eq!(record.source_channel, Channel::RenderedFallback);
    }
}
