//! Early detection of empty result pages

use crate::crawler::page::{PageClass, PageShape};

/// Decides whether a shard's pagination should stop at a page
///
/// Runs right after a fetch and before record extraction, so a confirmed
/// empty page is never parsed for records. Only a confirmed empty page stops
/// pagination; ambiguous markup is passed on as `Indeterminate`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyPageDetector;

impl EmptyPageDetector {
    pub fn classify(page: &impl PageShape) -> PageClass {
        let class = page.classify_empty();
        if class == PageClass::Indeterminate {
            tracing::debug!(
                "Could not classify {} page, treating it as having results",
                page.channel()
            );
        }
        class
    }
}
