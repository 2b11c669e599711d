//! Export crawled books as JSON.
//!
//! Produces one document with every book, its tags and its full daily
//! metric history, for analysis outside the database.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use sqlx::Row;

use crate::config::Config;
use crate::db;

#[derive(Serialize)]
struct ExportData {
    exported_at: String,
    books: Vec<ExportBook>,
}

#[derive(Serialize)]
struct ExportBook {
    book_id: String,
    title: String,
    author: Option<String>,
    publish_year: Option<i32>,
    cover_image: Option<String>,
    book_url: String,
    tags: Vec<String>,
    review_count_stored: i64,
    metrics: Vec<ExportMetric>,
}

#[derive(Serialize)]
struct ExportMetric {
    observed_on: String,
    avg_rating: Option<f64>,
    review_count: Option<i64>,
}

/// Export books as JSON.
///
/// If `output` is `Some`, writes to that file path. Otherwise writes
/// to stdout for piping.
pub async fn run_export(config: &Config, output: Option<&Path>) -> Result<()> {
    let pool = db::connect(config).await?;

    let book_rows = sqlx::query(
        r#"
        SELECT b.book_id, b.title, b.author, b.publish_year, b.cover_image, b.book_url,
               (SELECT COUNT(*) FROM book_reviews r WHERE r.book_id = b.book_id) AS stored_reviews
        FROM books b
        ORDER BY b.book_id
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let tag_rows = sqlx::query("SELECT book_id, tag FROM book_tags ORDER BY book_id, tag")
        .fetch_all(&pool)
        .await?;

    let metric_rows = sqlx::query(
        "SELECT book_id, observed_on, avg_rating, review_count \
         FROM book_metrics_daily ORDER BY book_id, observed_on",
    )
    .fetch_all(&pool)
    .await?;

    let mut tags: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in &tag_rows {
        tags.entry(row.get("book_id"))
            .or_default()
            .push(row.get("tag"));
    }

    let mut metrics: BTreeMap<String, Vec<ExportMetric>> = BTreeMap::new();
    for row in &metric_rows {
        metrics
            .entry(row.get("book_id"))
            .or_default()
            .push(ExportMetric {
                observed_on: row.get("observed_on"),
                avg_rating: row.get("avg_rating"),
                review_count: row.get("review_count"),
            });
    }

    let books: Vec<ExportBook> = book_rows
        .iter()
        .map(|row| {
            let book_id: String = row.get("book_id");
            ExportBook {
                tags: tags.remove(&book_id).unwrap_or_default(),
                metrics: metrics.remove(&book_id).unwrap_or_default(),
                title: row.get("title"),
                author: row.get("author"),
                publish_year: row.get("publish_year"),
                cover_image: row.get("cover_image"),
                book_url: row.get("book_url"),
                review_count_stored: row.get("stored_reviews"),
                book_id,
            }
        })
        .collect();

    let book_count = books.len();
    let data = ExportData {
        exported_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        books,
    };
    let json = serde_json::to_string_pretty(&data)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &json)?;
            eprintln!("Exported {} books to {}", book_count, path.display());
        }
        None => {
            println!("{}", json);
        }
    }

    pool.close().await;
    Ok(())
}
