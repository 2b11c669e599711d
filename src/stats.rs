//! Database statistics and health overview.
//!
//! Provides a quick summary of what has been crawled: book, snapshot and
//! review counts, a per-tag breakdown, and the most recent runs. Used by
//! `shelf stats` to check that crawls are landing as expected.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

const RECENT_RUNS: i64 = 5;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(&pool)
        .await?;
    let total_snapshots: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_metrics_daily")
        .fetch_one(&pool)
        .await?;
    let total_reviews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_reviews")
        .fetch_one(&pool)
        .await?;
    let last_day: Option<String> =
        sqlx::query_scalar("SELECT MAX(observed_on) FROM book_metrics_daily")
            .fetch_one(&pool)
            .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("shelfscrape: database stats");
    println!("============================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Books:       {}", total_books);
    println!("  Snapshots:   {}", total_snapshots);
    println!("  Reviews:     {}", total_reviews);
    println!(
        "  Last day:    {}",
        last_day.as_deref().unwrap_or("never")
    );

    let tag_rows = sqlx::query(
        r#"
        SELECT t.tag, COUNT(DISTINCT t.book_id) AS book_count,
               COUNT(DISTINCT r.review_hash) AS review_count
        FROM book_tags t
        LEFT JOIN book_reviews r ON r.book_id = t.book_id
        GROUP BY t.tag
        ORDER BY book_count DESC, t.tag ASC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !tag_rows.is_empty() {
        println!();
        println!("  By tag:");
        println!("  {:<24} {:>8} {:>8}", "TAG", "BOOKS", "REVIEWS");
        println!("  {}", "-".repeat(42));
        for row in &tag_rows {
            let tag: String = row.get("tag");
            let books: i64 = row.get("book_count");
            let reviews: i64 = row.get("review_count");
            println!("  {:<24} {:>8} {:>8}", tag, books, reviews);
        }
    }

    let run_rows = sqlx::query(
        "SELECT id, finished_at, observed_on, summary_json FROM crawl_runs ORDER BY id DESC LIMIT ?",
    )
    .bind(RECENT_RUNS)
    .fetch_all(&pool)
    .await?;

    if !run_rows.is_empty() {
        println!();
        println!("  Recent runs:");
        println!(
            "  {:>4}  {:<10} {:>6} {:>6} {:>7}   {}",
            "RUN", "DAY", "ITEMS", "SAVED", "FAILED", "FINISHED"
        );
        println!("  {}", "-".repeat(56));
        for row in &run_rows {
            let id: i64 = row.get("id");
            let finished_at: i64 = row.get("finished_at");
            let observed_on: String = row.get("observed_on");
            let summary_json: String = row.get("summary_json");
            let summary: serde_json::Value =
                serde_json::from_str(&summary_json).unwrap_or(serde_json::json!({}));
            let count = |key: &str| summary[key].as_u64().unwrap_or(0);
            let failed = count("malformed_input") + count("fetch_failed") + count("incomplete_data");
            println!(
                "  {:>4}  {:<10} {:>6} {:>6} {:>7}   {}",
                id,
                observed_on,
                count("total"),
                count("succeeded"),
                failed,
                format_ts_relative(finished_at)
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn relative_times() {
        let now = chrono::Utc::now().timestamp();
        assert_eq!(format_ts_relative(now), "just now");
        assert_eq!(format_ts_relative(now - 120), "2 mins ago");
        assert_eq!(format_ts_relative(now - 3600), "1 hour ago");
    }
}
