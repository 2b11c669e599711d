//! The bounded-concurrency fetch → extract → persist pipeline.
//!
//! [`Pipeline::process`] handles one work item end to end and always
//! returns an [`ItemOutcome`]; [`Pipeline::run`] drives many of them with
//! at most `concurrency` in flight and folds the outcomes into a
//! [`RunSummary`] as they complete.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tokio::task;
use tracing::{debug, info, warn};

use crate::error::IngestError;
use crate::id::{derive_book_id, DEFAULT_ID_PREFIX};
use crate::models::{BookRecord, RunSummary, WorkItem};
use crate::persist::{persist_record, PersistOptions, PersistReport};
use crate::store::Store;
use crate::traits::{Extractor, PageFetcher};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Maximum items in flight.
    pub concurrency: usize,
    /// Calendar day metric snapshots are filed under.
    pub observed_on: NaiveDate,
    pub id_prefix: String,
    /// Skip items whose book already exists in the store.
    pub skip_existing: bool,
    pub persist: PersistOptions,
}

impl PipelineOptions {
    pub fn new(observed_on: NaiveDate) -> Self {
        Self {
            concurrency: 10,
            observed_on,
            id_prefix: DEFAULT_ID_PREFIX.to_string(),
            skip_existing: false,
            persist: PersistOptions::default(),
        }
    }
}

/// Result of one work item.
#[derive(Debug)]
pub struct ItemOutcome {
    pub url: String,
    /// `None` when the URL was malformed.
    pub book_id: Option<String>,
    pub title: Option<String>,
    pub result: Result<PersistReport, IngestError>,
}

/// Crawl pipeline wired to its collaborators.
///
/// Store, fetcher and extractor are shared read-only across workers; the
/// pipeline keeps no other state between items.
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn Store>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn Store>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Fetch, extract and persist one item.
    pub async fn process(&self, item: &WorkItem) -> ItemOutcome {
        let book_id = match derive_book_id(&self.options.id_prefix, &item.url) {
            Ok(id) => id,
            Err(e) => {
                return ItemOutcome {
                    url: item.url.clone(),
                    book_id: None,
                    title: None,
                    result: Err(e),
                }
            }
        };

        debug!(url = %item.url, %book_id, "fetching");
        let extracted = match self.fetcher.fetch(&item.url).await {
            Ok(html) => self.extract(&item.url, html).await,
            Err(e) => Err(e),
        };

        let record = match extracted {
            Ok(record) => record,
            Err(e) => {
                return ItemOutcome {
                    url: item.url.clone(),
                    book_id: Some(book_id),
                    title: None,
                    result: Err(e),
                }
            }
        };

        let report = persist_record(
            self.store.as_ref(),
            &book_id,
            &record,
            &item.tags,
            self.options.observed_on,
            self.options.persist,
        )
        .await;

        ItemOutcome {
            url: item.url.clone(),
            book_id: Some(book_id),
            title: Some(record.title),
            result: Ok(report),
        }
    }

    /// Parse on the blocking pool so concurrent items parse in parallel
    /// instead of queueing behind one another on the runtime thread.
    async fn extract(&self, url: &str, html: String) -> Result<BookRecord, IngestError> {
        let extractor = Arc::clone(&self.extractor);
        let owned_url = url.to_string();
        match task::spawn_blocking(move || extractor.extract(&owned_url, &html)).await {
            Ok(result) => result,
            Err(e) => {
                warn!(url = %url, error = %e, "extraction task failed");
                Err(IngestError::IncompleteData {
                    url: url.to_string(),
                    field: "document",
                })
            }
        }
    }

    /// Process every item with at most `concurrency` in flight.
    ///
    /// `on_outcome` sees each outcome as soon as it completes, in completion
    /// order. Once `cancel` is set no new item starts; items already in
    /// flight run to completion and the rest are counted as cancelled.
    pub async fn run<F>(
        &self,
        items: Vec<WorkItem>,
        cancel: &AtomicBool,
        mut on_outcome: F,
    ) -> RunSummary
    where
        F: FnMut(&ItemOutcome, &RunSummary),
    {
        let mut summary = RunSummary::default();
        let items = self.drop_existing(items, &mut summary).await;
        summary.total = items.len() as u64;

        info!(
            items = items.len(),
            concurrency = self.options.concurrency,
            observed_on = %self.options.observed_on,
            "crawl started"
        );

        let mut outcomes = stream::iter(items)
            .map(|item| async move {
                if cancel.load(Ordering::SeqCst) {
                    return None;
                }
                Some(self.process(&item).await)
            })
            .buffer_unordered(self.options.concurrency.max(1));

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                Some(outcome) => {
                    absorb(&mut summary, &outcome);
                    on_outcome(&outcome, &summary);
                }
                None => summary.cancelled += 1,
            }
        }

        info!(
            succeeded = summary.succeeded,
            dropped = summary.dropped(),
            store_write_failed = summary.store_write_failed,
            cancelled = summary.cancelled,
            "crawl finished"
        );
        summary
    }

    async fn drop_existing(&self, items: Vec<WorkItem>, summary: &mut RunSummary) -> Vec<WorkItem> {
        if !self.options.skip_existing {
            return items;
        }
        let mut keep = Vec::with_capacity(items.len());
        for item in items {
            if let Ok(id) = derive_book_id(&self.options.id_prefix, &item.url) {
                match self.store.book_exists(&id).await {
                    Ok(true) => {
                        debug!(book_id = %id, "already stored, skipping");
                        summary.skipped_existing += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => warn!(book_id = %id, error = %e, "existence check failed"),
                }
            }
            keep.push(item);
        }
        keep
    }
}

fn absorb(summary: &mut RunSummary, outcome: &ItemOutcome) {
    match &outcome.result {
        Ok(report) => {
            summary.succeeded += 1;
            match report.metric_inserted {
                Some(true) => summary.metrics_inserted += 1,
                Some(false) => summary.metrics_existing += 1,
                None => {}
            }
            summary.reviews_inserted += report.reviews_inserted;
            summary.reviews_existing += report.reviews_existing;
            for e in &report.write_errors {
                summary.record_failure(e.kind());
            }
            info!(
                book_id = outcome.book_id.as_deref().unwrap_or(""),
                title = outcome.title.as_deref().unwrap_or(""),
                "saved"
            );
        }
        Err(e) => {
            summary.record_failure(e.kind());
            warn!(url = %outcome.url, kind = %e.kind(), error = %e, "item dropped");
        }
    }
}
