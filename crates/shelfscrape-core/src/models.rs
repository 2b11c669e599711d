//! Core data types that flow through the crawl pipeline.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::FailureKind;

/// A unit of crawl work: one detail-page URL and the category tags it was
/// discovered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: String,
    pub tags: BTreeSet<String>,
}

impl WorkItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tags<I, S>(url: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            url: url.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// Fields extracted from one book detail page.
///
/// `title` is the only mandatory field. Everything else is `None` when the
/// page did not carry it or it failed to parse.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookRecord {
    pub book_url: String,
    pub title: String,
    pub author: Option<String>,
    pub avg_rating: Option<f64>,
    pub review_count: Option<i64>,
    pub publish_year: Option<i32>,
    pub cover_image: Option<String>,
    pub reviews: Vec<ReviewItem>,
}

/// A review (comment) shown on a detail page.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewItem {
    pub text: String,
    pub reviewer: Option<String>,
    /// Star rating, 1 to 5.
    pub rating: Option<u8>,
    /// Date as displayed by the site; not normalised.
    pub posted_on: Option<String>,
}

impl ReviewItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Per-run counts, reported at the end of `shelf crawl` and stored in the
/// run history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Work items handed to the orchestrator.
    pub total: u64,
    /// Items fetched, extracted and handed to persistence.
    pub succeeded: u64,
    pub malformed_input: u64,
    pub fetch_failed: u64,
    pub incomplete_data: u64,
    /// Individual failed writes (not items).
    pub store_write_failed: u64,
    pub metrics_inserted: u64,
    pub metrics_existing: u64,
    pub reviews_inserted: u64,
    pub reviews_existing: u64,
    pub skipped_existing: u64,
    pub cancelled: u64,
}

impl RunSummary {
    pub fn record_failure(&mut self, kind: FailureKind) {
        match kind {
            FailureKind::MalformedInput => self.malformed_input += 1,
            FailureKind::Fetch => self.fetch_failed += 1,
            FailureKind::IncompleteData => self.incomplete_data += 1,
            FailureKind::StoreWrite => self.store_write_failed += 1,
        }
    }

    pub fn failures(&self, kind: FailureKind) -> u64 {
        match kind {
            FailureKind::MalformedInput => self.malformed_input,
            FailureKind::Fetch => self.fetch_failed,
            FailureKind::IncompleteData => self.incomplete_data,
            FailureKind::StoreWrite => self.store_write_failed,
        }
    }

    /// Items dropped before persistence.
    pub fn dropped(&self) -> u64 {
        self.malformed_input + self.fetch_failed + self.incomplete_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_counters_match_kinds() {
        let mut s = RunSummary::default();
        s.record_failure(FailureKind::Fetch);
        s.record_failure(FailureKind::Fetch);
        s.record_failure(FailureKind::IncompleteData);
        s.record_failure(FailureKind::StoreWrite);
        assert_eq!(s.failures(FailureKind::Fetch), 2);
        assert_eq!(s.failures(FailureKind::IncompleteData), 1);
        assert_eq!(s.failures(FailureKind::MalformedInput), 0);
        assert_eq!(s.dropped(), 3);
    }
}
