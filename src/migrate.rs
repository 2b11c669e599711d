use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database file and schema. Safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Apply the schema on an open pool.
///
/// Metrics and reviews carry no foreign key to `books`: each write group
/// must succeed or fail on its own.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            book_id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT,
            publish_year INTEGER,
            cover_image TEXT,
            book_url TEXT NOT NULL,
            first_seen_at INTEGER NOT NULL,
            last_seen_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS book_tags (
            book_id TEXT NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY (book_id, tag),
            FOREIGN KEY (book_id) REFERENCES books(book_id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    // observed_on is a calendar day, YYYY-MM-DD.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS book_metrics_daily (
            book_id TEXT NOT NULL,
            observed_on TEXT NOT NULL,
            avg_rating REAL,
            review_count INTEGER,
            recorded_at INTEGER NOT NULL,
            PRIMARY KEY (book_id, observed_on)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS book_reviews (
            review_hash TEXT PRIMARY KEY,
            book_id TEXT NOT NULL,
            text TEXT NOT NULL,
            reviewer TEXT,
            rating INTEGER,
            posted_on TEXT,
            tags_json TEXT NOT NULL DEFAULT '[]',
            created_on TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            started_at INTEGER NOT NULL,
            finished_at INTEGER NOT NULL,
            observed_on TEXT NOT NULL,
            categories_json TEXT NOT NULL DEFAULT '[]',
            summary_json TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_book_tags_tag ON book_tags(tag)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_book_reviews_book_id ON book_reviews(book_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_book_metrics_observed_on ON book_metrics_daily(observed_on)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
