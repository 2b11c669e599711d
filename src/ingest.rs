//! Crawl orchestration.
//!
//! Coordinates one full run: discovery (or explicit URLs) → bounded
//! fetch/extract/persist → summary → run record. The SQLite pool is opened
//! at the start of the run and closed at the end; every collaborator is
//! built here and handed to the pipeline explicitly.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use tracing::info;

use shelfscrape_core::discovery::discover;
use shelfscrape_core::id::derive_book_id;
use shelfscrape_core::persist::PersistOptions;
use shelfscrape_core::traits::{Extractor, PageFetcher};
use shelfscrape_core::{FailureKind, Pipeline, PipelineOptions, RunSummary, WorkItem};

use crate::config::Config;
use crate::discover::HttpListingSource;
use crate::extract::HtmlExtractor;
use crate::fetch::HttpFetcher;
use crate::progress::{CrawlProgressEvent, CrawlProgressReporter, ProgressMode};
use crate::sqlite_store::SqliteStore;
use crate::{db, migrate};

/// Per-run switches that are not part of the config file.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Crawl these detail pages instead of running discovery.
    pub urls: Vec<String>,
    /// Stop after discovery and print the work set.
    pub dry_run: bool,
    pub progress: ProgressMode,
    /// Print the summary as JSON instead of text.
    pub json: bool,
    /// Calendar day for metric snapshots; today when `None`.
    pub observed_on: Option<NaiveDate>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            dry_run: false,
            progress: ProgressMode::Off,
            json: false,
            observed_on: None,
        }
    }
}

pub async fn run_crawl(
    config: &Config,
    opts: &CrawlOptions,
    cancel: &AtomicBool,
) -> Result<RunSummary> {
    let crawl = &config.crawl;
    let started_at = chrono::Utc::now().timestamp();
    let observed_on = opts
        .observed_on
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let progress: Arc<dyn CrawlProgressReporter> = Arc::from(opts.progress.reporter());
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::from_config(crawl)?);
    let extractor: Arc<dyn Extractor> = Arc::new(HtmlExtractor::from_config(config)?);

    let items = if opts.urls.is_empty() {
        if crawl.categories.is_empty() {
            bail!("no categories to crawl: set crawl.categories or pass --category");
        }
        let listing =
            HttpListingSource::new(crawl, fetcher.clone(), extractor.clone(), progress.clone())?;
        let work = discover(&listing, &crawl.id_prefix, &crawl.categories, crawl.max_pages).await;
        info!(work_items = work.len(), "discovery finished");

        if opts.dry_run {
            print_dry_run(crawl.categories.join(", "), work.len(), &work.tag_counts(), crawl.limit);
            return Ok(RunSummary {
                total: work.len().min(crawl.limit.unwrap_or(usize::MAX)) as u64,
                ..Default::default()
            });
        }
        work.into_items(crawl.limit)
    } else {
        let mut items = explicit_items(&crawl.id_prefix, &opts.urls, &crawl.categories);
        if let Some(limit) = crawl.limit {
            items.truncate(limit);
        }
        if opts.dry_run {
            print_dry_run("urls".to_string(), items.len(), &BTreeMap::new(), crawl.limit);
            return Ok(RunSummary {
                total: items.len() as u64,
                ..Default::default()
            });
        }
        items
    };

    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));

    let mut options = PipelineOptions::new(observed_on);
    options.concurrency = crawl.concurrency;
    options.id_prefix = crawl.id_prefix.clone();
    options.skip_existing = crawl.skip_existing;
    options.persist = PersistOptions {
        write_retries: crawl.write_retries,
        max_reviews: crawl.max_reviews,
    };
    let pipeline = Pipeline::new(fetcher, extractor, store.clone(), options);

    let mut done = 0u64;
    let summary = pipeline
        .run(items, cancel, |_, so_far| {
            done += 1;
            progress.report(CrawlProgressEvent::Crawling {
                n: done,
                total: so_far.total,
                failed: so_far.dropped(),
            });
        })
        .await;

    let finished_at = chrono::Utc::now().timestamp();
    store
        .record_run(started_at, finished_at, observed_on, &crawl.categories, &summary)
        .await?;

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary, observed_on);
    }

    store.pool().close().await;
    Ok(summary)
}

/// Fetch and extract one detail page and print it as JSON. Writes nothing.
pub async fn run_fetch(config: &Config, url: &str) -> Result<()> {
    let book_id = derive_book_id(&config.crawl.id_prefix, url)?;
    let fetcher = HttpFetcher::from_config(&config.crawl)?;
    let extractor = HtmlExtractor::from_config(config)?;

    let html = fetcher.fetch(url).await?;
    let record = extractor.extract(url, &html)?;

    let out = serde_json::json!({
        "book_id": book_id,
        "record": record,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Work items for explicitly named URLs, deduplicated by book id.
fn explicit_items(id_prefix: &str, urls: &[String], tags: &[String]) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    urls.iter()
        .filter(|url| {
            let key = derive_book_id(id_prefix, url).unwrap_or_else(|_| url.trim().to_string());
            seen.insert(key)
        })
        .map(|url| WorkItem::with_tags(url.trim(), tags.iter().cloned()))
        .collect()
}

fn print_dry_run(
    label: String,
    found: usize,
    tag_counts: &BTreeMap<String, usize>,
    limit: Option<usize>,
) {
    println!("crawl {} (dry-run)", label);
    println!("  work items: {}", found);
    for (tag, count) in tag_counts {
        println!("    {:<24} {}", tag, count);
    }
    if let Some(limit) = limit {
        println!("  limit: {}", limit);
    }
}

fn print_summary(s: &RunSummary, observed_on: NaiveDate) {
    println!("crawl {}", observed_on);
    println!("  work items: {}", s.total);
    println!("  saved: {}", s.succeeded);
    println!("  malformed input: {}", s.failures(FailureKind::MalformedInput));
    println!("  fetch failed: {}", s.failures(FailureKind::Fetch));
    println!("  incomplete data: {}", s.failures(FailureKind::IncompleteData));
    println!("  store writes failed: {}", s.failures(FailureKind::StoreWrite));
    println!(
        "  metric snapshots: {} new, {} already recorded",
        s.metrics_inserted, s.metrics_existing
    );
    println!(
        "  reviews: {} new, {} already stored",
        s.reviews_inserted, s.reviews_existing
    );
    if s.skipped_existing > 0 {
        println!("  skipped existing: {}", s.skipped_existing);
    }
    if s.cancelled > 0 {
        println!("  cancelled: {}", s.cancelled);
    }
    println!("ok");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_items_dedupe_by_book_id() {
        let urls = vec![
            "https://books.test/book/show/1-a?x=1".to_string(),
            "https://books.test/book/show/1-b".to_string(),
            "https://books.test/book/show/2".to_string(),
            "not a url".to_string(),
        ];
        let items = explicit_items("GR_", &urls, &["fiction".to_string()]);
        assert_eq!(items.len(), 3);
        assert!(items[0].tags.contains("fiction"));
        assert_eq!(items[2].url, "not a url");
    }
}
