//! SQLite-backed [`Store`] implementation.
//!
//! Each [`Store`] operation is one statement, or one transaction for the
//! book row plus its tags. Uniqueness is enforced by primary keys, so the
//! insert-if-absent operations stay atomic when several workers race on the
//! same key: `ON CONFLICT DO NOTHING` and `rows_affected()` decide who won.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use shelfscrape_core::store::{
    BookEntity, BookFields, MetricFields, MetricSnapshot, ReviewEntity, ReviewFields, Store,
};
use shelfscrape_core::RunSummary;

const DATE_FMT: &str = "%Y-%m-%d";

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Append a finished run to `crawl_runs`. Returns the run id.
    pub async fn record_run(
        &self,
        started_at: i64,
        finished_at: i64,
        observed_on: NaiveDate,
        categories: &[String],
        summary: &RunSummary,
    ) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO crawl_runs (started_at, finished_at, observed_on, categories_json, summary_json)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(started_at)
        .bind(finished_at)
        .bind(observed_on.format(DATE_FMT).to_string())
        .bind(serde_json::to_string(categories)?)
        .bind(serde_json::to_string(summary)?)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn tags_for(&self, book_id: &str) -> Result<BTreeSet<String>> {
        let tags: Vec<String> =
            sqlx::query_scalar("SELECT tag FROM book_tags WHERE book_id = ? ORDER BY tag")
                .bind(book_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(tags.into_iter().collect())
    }
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT).with_context(|| format!("bad stored date: {raw}"))
}

fn review_from_row(row: &SqliteRow) -> Result<ReviewEntity> {
    let tags_json: String = row.get("tags_json");
    let created_on: String = row.get("created_on");
    let rating: Option<i64> = row.get("rating");
    Ok(ReviewEntity {
        review_hash: row.get("review_hash"),
        book_id: row.get("book_id"),
        text: row.get("text"),
        reviewer: row.get("reviewer"),
        rating: rating.and_then(|r| u8::try_from(r).ok()),
        posted_on: row.get("posted_on"),
        tags: serde_json::from_str(&tags_json)
            .with_context(|| format!("bad stored review tags: {tags_json}"))?,
        created_on: parse_day(&created_on)?,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn upsert_book(
        &self,
        book_id: &str,
        fields: &BookFields,
        tags_to_add: &BTreeSet<String>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        // Unknown optional values keep whatever an earlier run recorded.
        sqlx::query(
            r#"
            INSERT INTO books (book_id, title, author, publish_year, cover_image, book_url,
                               first_seen_at, last_seen_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(book_id) DO UPDATE SET
                title = excluded.title,
                author = COALESCE(excluded.author, books.author),
                publish_year = COALESCE(excluded.publish_year, books.publish_year),
                cover_image = COALESCE(excluded.cover_image, books.cover_image),
                book_url = excluded.book_url,
                last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(book_id)
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(fields.publish_year)
        .bind(&fields.cover_image)
        .bind(&fields.book_url)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for tag in tags_to_add {
            sqlx::query("INSERT OR IGNORE INTO book_tags (book_id, tag) VALUES (?, ?)")
                .bind(book_id)
                .bind(tag)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_metric_if_absent(
        &self,
        book_id: &str,
        observed_on: NaiveDate,
        fields: &MetricFields,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO book_metrics_daily (book_id, observed_on, avg_rating, review_count, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(book_id, observed_on) DO NOTHING
            "#,
        )
        .bind(book_id)
        .bind(observed_on.format(DATE_FMT).to_string())
        .bind(fields.avg_rating)
        .bind(fields.review_count)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_review_if_absent(
        &self,
        review_hash: &str,
        fields: &ReviewFields,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO book_reviews (review_hash, book_id, text, reviewer, rating, posted_on,
                                      tags_json, created_on)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(review_hash) DO NOTHING
            "#,
        )
        .bind(review_hash)
        .bind(&fields.book_id)
        .bind(&fields.text)
        .bind(&fields.reviewer)
        .bind(fields.rating.map(i64::from))
        .bind(&fields.posted_on)
        .bind(serde_json::to_string(&fields.tags)?)
        .bind(fields.created_on.format(DATE_FMT).to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn book_exists(&self, book_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM books WHERE book_id = ?")
            .bind(book_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn get_book(&self, book_id: &str) -> Result<Option<BookEntity>> {
        let row = sqlx::query(
            "SELECT book_id, title, author, publish_year, cover_image, book_url, \
             first_seen_at, last_seen_at FROM books WHERE book_id = ?",
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(BookEntity {
            book_id: row.get("book_id"),
            title: row.get("title"),
            author: row.get("author"),
            publish_year: row.get("publish_year"),
            cover_image: row.get("cover_image"),
            book_url: row.get("book_url"),
            tags: self.tags_for(book_id).await?,
            first_seen_at: row.get("first_seen_at"),
            last_seen_at: row.get("last_seen_at"),
        }))
    }

    async fn metric_history(&self, book_id: &str) -> Result<Vec<MetricSnapshot>> {
        let rows = sqlx::query(
            "SELECT book_id, observed_on, avg_rating, review_count FROM book_metrics_daily \
             WHERE book_id = ? ORDER BY observed_on ASC",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let observed_on: String = row.get("observed_on");
                Ok(MetricSnapshot {
                    book_id: row.get("book_id"),
                    observed_on: parse_day(&observed_on)?,
                    avg_rating: row.get("avg_rating"),
                    review_count: row.get("review_count"),
                })
            })
            .collect()
    }

    async fn reviews_for(&self, book_id: &str) -> Result<Vec<ReviewEntity>> {
        let rows = sqlx::query(
            "SELECT review_hash, book_id, text, reviewer, rating, posted_on, tags_json, created_on \
             FROM book_reviews WHERE book_id = ? ORDER BY created_on ASC, rowid ASC",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(review_from_row).collect()
    }
}
