//! Book retrieval by id or URL.
//!
//! Reads a stored book, its metric history and its reviews through the
//! [`Store`] trait. Used by `shelf show`.

use anyhow::{bail, Result};
use serde::Serialize;

use shelfscrape_core::id::derive_book_id;
use shelfscrape_core::store::{BookEntity, MetricSnapshot, ReviewEntity, Store};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Serialize)]
pub struct BookReport {
    #[serde(flatten)]
    pub book: BookEntity,
    pub metrics: Vec<MetricSnapshot>,
    pub reviews: Vec<ReviewEntity>,
}

/// Accept either a stored id (`GR_4671`) or any detail-page URL.
pub fn resolve_book_id(id_prefix: &str, key: &str) -> Result<String> {
    let key = key.trim();
    if key.starts_with("http://") || key.starts_with("https://") {
        Ok(derive_book_id(id_prefix, key)?)
    } else {
        Ok(key.to_string())
    }
}

pub async fn get_book_report(store: &dyn Store, book_id: &str) -> Result<Option<BookReport>> {
    let Some(book) = store.get_book(book_id).await? else {
        return Ok(None);
    };
    Ok(Some(BookReport {
        book,
        metrics: store.metric_history(book_id).await?,
        reviews: store.reviews_for(book_id).await?,
    }))
}

/// CLI entry point: look the book up and print it to stdout.
pub async fn run_show(config: &Config, key: &str, json: bool) -> Result<()> {
    let book_id = resolve_book_id(&config.crawl.id_prefix, key)?;
    let store = SqliteStore::new(db::connect(config).await?);
    let report = get_book_report(&store, &book_id).await;
    store.pool().close().await;

    let Some(report) = report? else {
        bail!("book not found: {}", book_id);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let book = &report.book;
    println!("--- Book ---");
    println!("id:           {}", book.book_id);
    println!("title:        {}", book.title);
    println!("author:       {}", book.author.as_deref().unwrap_or("(unknown)"));
    if let Some(year) = book.publish_year {
        println!("published:    {}", year);
    }
    println!("url:          {}", book.book_url);
    if let Some(ref cover) = book.cover_image {
        println!("cover:        {}", cover);
    }
    let tags: Vec<&str> = book.tags.iter().map(String::as_str).collect();
    println!("tags:         {}", tags.join(", "));
    println!("first seen:   {}", format_ts_iso(book.first_seen_at));
    println!("last seen:    {}", format_ts_iso(book.last_seen_at));
    println!();

    println!("--- Metrics ({}) ---", report.metrics.len());
    for m in &report.metrics {
        println!(
            "{}  rating {:<6} reviews {}",
            m.observed_on,
            m.avg_rating.map(|r| format!("{:.2}", r)).unwrap_or_else(|| "-".into()),
            m.review_count.map(|c| c.to_string()).unwrap_or_else(|| "-".into())
        );
    }
    println!();

    println!("--- Reviews ({}) ---", report.reviews.len());
    for r in &report.reviews {
        let stars = r.rating.map(|n| format!("{}/5", n)).unwrap_or_default();
        println!(
            "[{}] {} {}",
            r.reviewer.as_deref().unwrap_or("anonymous"),
            stars,
            r.posted_on.as_deref().unwrap_or("")
        );
        println!("{}", r.text);
        println!();
    }

    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
