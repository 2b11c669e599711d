//! Persistence stage: one extracted record becomes three independent
//! write groups (book upsert, daily metric, reviews).
//!
//! A failure in one group never rolls back or skips another. Each write is
//! retried `write_retries` times and, if it still fails, logged and
//! reported in the [`PersistReport`].

use std::collections::BTreeSet;
use std::future::Future;

use chrono::NaiveDate;
use tracing::{debug, error, warn};

use crate::error::{IngestError, WriteKind};
use crate::id::review_hash;
use crate::models::BookRecord;
use crate::store::{BookFields, MetricFields, ReviewFields, Store};

/// Knobs for [`persist_record`].
#[derive(Debug, Clone, Copy)]
pub struct PersistOptions {
    /// Extra attempts per write after the first failure.
    pub write_retries: u32,
    /// Reviews beyond this many per record are ignored.
    pub max_reviews: usize,
}

impl Default for PersistOptions {
    fn default() -> Self {
        Self {
            write_retries: 1,
            max_reviews: 5,
        }
    }
}

/// What happened to each write group of one record.
#[derive(Debug, Clone, Default)]
pub struct PersistReport {
    pub book_written: bool,
    /// `Some(true)` inserted, `Some(false)` already present, `None` failed.
    pub metric_inserted: Option<bool>,
    pub reviews_inserted: u64,
    pub reviews_existing: u64,
    pub write_errors: Vec<IngestError>,
}

impl PersistReport {
    pub fn is_clean(&self) -> bool {
        self.write_errors.is_empty()
    }
}

/// Write one record to `store`.
pub async fn persist_record(
    store: &dyn Store,
    book_id: &str,
    record: &BookRecord,
    tags: &BTreeSet<String>,
    observed_on: NaiveDate,
    options: PersistOptions,
) -> PersistReport {
    let mut report = PersistReport::default();

    let fields = BookFields {
        title: record.title.clone(),
        author: record.author.clone(),
        publish_year: record.publish_year,
        cover_image: record.cover_image.clone(),
        book_url: record.book_url.clone(),
    };
    match with_retries(options.write_retries, || store.upsert_book(book_id, &fields, tags)).await
    {
        Ok(()) => report.book_written = true,
        Err(e) => report.write_errors.push(write_failed(WriteKind::Book, book_id, e)),
    }

    let metric = MetricFields {
        avg_rating: record.avg_rating,
        review_count: record.review_count,
    };
    match with_retries(options.write_retries, || {
        store.insert_metric_if_absent(book_id, observed_on, &metric)
    })
    .await
    {
        Ok(inserted) => {
            if !inserted {
                debug!(book_id, %observed_on, "metric snapshot already recorded today");
            }
            report.metric_inserted = Some(inserted);
        }
        Err(e) => report.write_errors.push(write_failed(WriteKind::Metric, book_id, e)),
    }

    for review in record.reviews.iter().take(options.max_reviews) {
        if review.text.trim().is_empty() {
            continue;
        }
        let hash = review_hash(book_id, &review.text);
        let fields = ReviewFields {
            book_id: book_id.to_string(),
            text: review.text.clone(),
            reviewer: review.reviewer.clone(),
            rating: review.rating,
            posted_on: review.posted_on.clone(),
            tags: tags.clone(),
            created_on: observed_on,
        };
        match with_retries(options.write_retries, || {
            store.insert_review_if_absent(&hash, &fields)
        })
        .await
        {
            Ok(true) => report.reviews_inserted += 1,
            Ok(false) => report.reviews_existing += 1,
            Err(e) => report.write_errors.push(write_failed(WriteKind::Review, book_id, e)),
        }
    }

    report
}

async fn with_retries<T, F, Fut>(retries: u32, mut op: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(attempt, error = %e, "store write failed, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

fn write_failed(write: WriteKind, book_id: &str, e: anyhow::Error) -> IngestError {
    error!(book_id, %write, error = %e, "store write failed");
    IngestError::StoreWrite {
        write,
        message: format!("{book_id}: {e:#}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReviewItem;
    use crate::store::memory::InMemoryStore;

    fn record(title: &str, reviews: &[&str]) -> BookRecord {
        BookRecord {
            book_url: "https://site/book/show/7".to_string(),
            title: title.to_string(),
            avg_rating: Some(4.0),
            review_count: Some(12),
            reviews: reviews.iter().map(|t| ReviewItem::text(*t)).collect(),
            ..Default::default()
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[tokio::test]
    async fn writes_all_three_groups() {
        let store = InMemoryStore::new();
        let tags: BTreeSet<String> = ["fiction".to_string()].into();
        let report = persist_record(
            &store,
            "GR_7",
            &record("Seven", &["great", "meh"]),
            &tags,
            day(),
            PersistOptions::default(),
        )
        .await;

        assert!(report.is_clean());
        assert!(report.book_written);
        assert_eq!(report.metric_inserted, Some(true));
        assert_eq!(report.reviews_inserted, 2);
        let reviews = store.reviews_for("GR_7").await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert!(reviews.iter().all(|r| r.tags.contains("fiction")));
    }

    #[tokio::test]
    async fn respects_max_reviews_and_skips_blank_text() {
        let store = InMemoryStore::new();
        let opts = PersistOptions {
            write_retries: 0,
            max_reviews: 2,
        };
        let report = persist_record(
            &store,
            "GR_7",
            &record("Seven", &["  ", "one", "two"]),
            &BTreeSet::new(),
            day(),
            opts,
        )
        .await;
        assert_eq!(report.reviews_inserted, 1);
        assert_eq!(store.review_count(), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let mut calls = 0;
        let result = with_retries(2, || {
            calls += 1;
            let n = calls;
            async move {
                if n < 3 {
                    anyhow::bail!("busy")
                }
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_retries() {
        let mut calls = 0;
        let result: anyhow::Result<()> = with_retries(1, || {
            calls += 1;
            async { anyhow::bail!("locked") }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
