//! Fetched page shapes
//!
//! Each channel returns its own kind of page. Both implement `PageShape`, so
//! emptiness checks and record extraction work the same way regardless of
//! where the page came from:
//! - `StructuredPage`: the job-cards JSON collection, plus posting entities
//! - `RenderedPage`: the HTML search results page, parsed with `scraper`

use crate::crawler::posting::{first_digit_run, Posting, UNKNOWN_FIELD};
use crate::records::Channel;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Emptiness verdict for a fetched page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageClass {
    HasResults,
    NoResults,

    /// The markup matched neither a results list nor an empty-state marker
    Indeterminate,
}

/// A job read from a page, with its position on that page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedJob {
    /// Zero-based position of the card on the page
    pub rank: usize,
    pub posting: Posting,
}

/// Uniform view over the page kinds each channel returns
pub trait PageShape {
    fn channel(&self) -> Channel;

    /// Cheap emptiness check, run before any record extraction
    fn classify_empty(&self) -> PageClass;

    /// Reads every job on the page, in page order
    fn extract_records(&self) -> Vec<ExtractedJob>;
}

/// A page as returned by a channel
#[derive(Debug, Clone)]
pub enum RawPage {
    Structured(StructuredPage),
    Rendered(RenderedPage),
}

impl PageShape for RawPage {
    fn channel(&self) -> Channel {
        match self {
            Self::Structured(page) => page.channel(),
            Self::Rendered(page) => page.channel(),
        }
    }

    fn classify_empty(&self) -> PageClass {
        match self {
            Self::Structured(page) => page.classify_empty(),
            Self::Rendered(page) => page.classify_empty(),
        }
    }

    fn extract_records(&self) -> Vec<ExtractedJob> {
        match self {
            Self::Structured(page) => page.extract_records(),
            Self::Rendered(page) => page.extract_records(),
        }
    }
}

/// Job-cards collection from the structured API
#[derive(Debug, Clone, Default)]
pub struct StructuredPage {
    /// Job ids in card order; None when the response had no card collection
    pub job_ids: Option<Vec<String>>,

    /// Posting entities by job id
    pub postings: HashMap<String, Posting>,

    /// Card elements that carried no readable job id
    pub unreadable_cards: usize,
}

impl StructuredPage {
    /// Reads a job-cards response
    ///
    /// Card ids come from `data.elements[].jobCardUnion.*jobPostingCard`.
    /// Posting entities shipped alongside in `included` are kept so they do
    /// not need a separate detail request.
    pub fn from_json(value: &Value) -> Self {
        let elements = value.pointer("/data/elements").and_then(Value::as_array);
        let job_ids: Option<Vec<String>> = elements.map(|elements| {
            elements
                .iter()
                .filter_map(|element| {
                    element
                        .pointer("/jobCardUnion/*jobPostingCard")
                        .and_then(Value::as_str)
                        .and_then(first_digit_run)
                        .map(str::to_string)
                })
                .collect()
        });
        let unreadable_cards = match (elements, &job_ids) {
            (Some(elements), Some(ids)) => elements.len() - ids.len(),
            _ => 0,
        };

        let mut postings = HashMap::new();
        if let Some(included) = value.get("included").and_then(Value::as_array) {
            for entity in included {
                let is_posting = entity
                    .get("$type")
                    .and_then(Value::as_str)
                    .map(|t| t.ends_with("JobPosting"))
                    .unwrap_or(false);
                if !is_posting {
                    continue;
                }
                let id = entity
                    .get("entityUrn")
                    .and_then(Value::as_str)
                    .and_then(first_digit_run);
                if let Some(id) = id {
                    postings.insert(id.to_string(), Posting::from_json(id, entity));
                }
            }
        }

        Self {
            job_ids,
            postings,
            unreadable_cards,
        }
    }

    /// Card ids that have no posting entity yet, without repeats
    pub fn missing_postings(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.job_ids
            .iter()
            .flatten()
            .filter(|id| !self.postings.contains_key(*id) && seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn attach_postings(&mut self, postings: Vec<Posting>) {
        for posting in postings {
            self.postings.insert(posting.job_id.clone(), posting);
        }
    }
}

impl PageShape for StructuredPage {
    fn channel(&self) -> Channel {
        Channel::StructuredApi
    }

    /// A collection whose cards all lack a job id is not taken as empty
    fn classify_empty(&self) -> PageClass {
        match &self.job_ids {
            None => PageClass::Indeterminate,
            Some(ids) if ids.is_empty() && self.unreadable_cards > 0 => PageClass::Indeterminate,
            Some(ids) if ids.is_empty() => PageClass::NoResults,
            Some(_) => PageClass::HasResults,
        }
    }

    fn extract_records(&self) -> Vec<ExtractedJob> {
        let Some(ids) = &self.job_ids else {
            return Vec::new();
        };

        ids.iter()
            .enumerate()
            .filter_map(|(rank, id)| match self.postings.get(id) {
                Some(posting) => Some(ExtractedJob {
                    rank,
                    posting: posting.clone(),
                }),
                None => {
                    tracing::debug!("No posting details for job {}, skipping", id);
                    None
                }
            })
            .collect()
    }
}

const CARD_SELECTORS: [&str; 3] = [
    "li[data-occludable-job-id]",
    "[data-entity-urn*='jobPosting']",
    "div[data-job-id]",
];

const NO_RESULTS_SELECTORS: [&str; 3] = [
    ".jobs-search-no-results-banner",
    ".jobs-search-two-pane__no-results-banner--expand",
    ".jobs-search-no-results",
];

const RESULTS_LIST_SELECTORS: [&str; 3] = [
    ".jobs-search__results-list",
    ".jobs-search-results-list",
    ".scaffold-layout__list-container",
];

/// HTML search results page
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub html: String,
}

impl RenderedPage {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

impl PageShape for RenderedPage {
    fn channel(&self) -> Channel {
        Channel::RenderedFallback
    }

    fn classify_empty(&self) -> PageClass {
        let document = Html::parse_document(&self.html);

        if !job_cards(&document).is_empty() {
            return PageClass::HasResults;
        }
        if any_match(&document, &NO_RESULTS_SELECTORS) {
            return PageClass::NoResults;
        }
        // A results list that rendered without a single card
        if any_match(&document, &RESULTS_LIST_SELECTORS) {
            return PageClass::NoResults;
        }
        PageClass::Indeterminate
    }

    fn extract_records(&self) -> Vec<ExtractedJob> {
        let document = Html::parse_document(&self.html);

        // Ranks follow card positions, including cards that cannot be read
        job_cards(&document)
            .into_iter()
            .enumerate()
            .filter_map(|(rank, card)| {
                read_card(card).map(|posting| ExtractedJob { rank, posting })
            })
            .collect()
    }
}

/// Cards matched by the first card selector that finds any
fn job_cards(document: &Html) -> Vec<ElementRef<'_>> {
    for css in CARD_SELECTORS {
        if let Ok(selector) = Selector::parse(css) {
            let cards: Vec<_> = document.select(&selector).collect();
            if !cards.is_empty() {
                return cards;
            }
        }
    }
    Vec::new()
}

fn any_match(document: &Html, selectors: &[&str]) -> bool {
    selectors.iter().any(|css| {
        Selector::parse(css)
            .map(|selector| document.select(&selector).next().is_some())
            .unwrap_or(false)
    })
}

fn read_card(card: ElementRef<'_>) -> Option<Posting> {
    let element = card.value();
    let job_id = element
        .attr("data-occludable-job-id")
        .or_else(|| element.attr("data-job-id"))
        .and_then(first_digit_run)
        .or_else(|| element.attr("data-entity-urn").and_then(first_digit_run))?
        .to_string();

    let title = card_attr(card, "h3 a span[title]", "title").or_else(|| {
        first_text(
            card,
            &[".job-card-list__title", ".base-search-card__title", "h3"],
        )
    })?;

    let company_name = first_text(
        card,
        &[
            "h4 a",
            ".base-search-card__subtitle",
            ".job-card-container__primary-description",
            "h4",
        ],
    )
    .unwrap_or_else(|| UNKNOWN_FIELD.to_string());

    let posted_at = card_attr(card, "time[datetime]", "datetime")
        .as_deref()
        .and_then(parse_card_date);

    let apply_url = card_attr(card, "a[href*='/jobs/view/']", "href")
        .filter(|href| href.starts_with("http"))
        .map(|href| href.split('?').next().unwrap_or(&href).to_string());

    Some(Posting {
        job_id,
        title,
        company_name,
        posted_at,
        explicit_repost: false,
        apply_url,
    })
}

fn card_attr(card: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    card.select(&selector)
        .find_map(|el| el.value().attr(attr))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn first_text(card: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let selector = Selector::parse(css).ok()?;
        card.select(&selector)
            .map(|el| el.text().collect::<Vec<_>>().join(" "))
            .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|text| !text.is_empty())
    })
}

/// Accepts full RFC 3339 timestamps or the bare dates the cards usually carry
fn parse_card_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}
