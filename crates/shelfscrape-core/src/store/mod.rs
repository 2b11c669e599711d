//! Storage abstraction for shelfscrape.
//!
//! The [`Store`] trait is everything the persistence stage and the read-side
//! commands need. Any backend with unique-key upsert semantics satisfies it
//! (SQLite in the `shelfscrape` crate, [`memory::InMemoryStore`] here).
//!
//! Implementations must be `Send + Sync` and must make the two
//! `insert_*_if_absent` operations atomic: two workers racing on the same
//! key must end with exactly one row and the first writer's values.

pub mod memory;

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

/// Scalar fields written by [`Store::upsert_book`].
#[derive(Debug, Clone, PartialEq)]
pub struct BookFields {
    pub title: String,
    pub author: Option<String>,
    pub publish_year: Option<i32>,
    pub cover_image: Option<String>,
    pub book_url: String,
}

/// Fields of a daily metric snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricFields {
    pub avg_rating: Option<f64>,
    pub review_count: Option<i64>,
}

/// Fields of a review row.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewFields {
    pub book_id: String,
    pub text: String,
    pub reviewer: Option<String>,
    pub rating: Option<u8>,
    pub posted_on: Option<String>,
    pub tags: BTreeSet<String>,
    pub created_on: NaiveDate,
}

/// A stored book with its accumulated tags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookEntity {
    pub book_id: String,
    pub title: String,
    pub author: Option<String>,
    pub publish_year: Option<i32>,
    pub cover_image: Option<String>,
    pub book_url: String,
    pub tags: BTreeSet<String>,
    /// Unix seconds.
    pub first_seen_at: i64,
    /// Unix seconds.
    pub last_seen_at: i64,
}

/// One reading per book per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub book_id: String,
    pub observed_on: NaiveDate,
    pub avg_rating: Option<f64>,
    pub review_count: Option<i64>,
}

/// A stored review, keyed by its content hash.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewEntity {
    pub review_hash: String,
    pub book_id: String,
    pub text: String,
    pub reviewer: Option<String>,
    pub rating: Option<u8>,
    pub posted_on: Option<String>,
    pub tags: BTreeSet<String>,
    pub created_on: NaiveDate,
}

/// Abstract storage backend.
///
/// | Method | Semantics |
/// |--------|-----------|
/// | [`upsert_book`](Store::upsert_book) | insert or overwrite scalars, union tags |
/// | [`insert_metric_if_absent`](Store::insert_metric_if_absent) | first write of the day wins |
/// | [`insert_review_if_absent`](Store::insert_review_if_absent) | first write of a hash wins |
/// | [`book_exists`](Store::book_exists) | existence check for opt-in skipping |
/// | [`get_book`](Store::get_book), [`metric_history`](Store::metric_history), [`reviews_for`](Store::reviews_for) | read side |
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert the book or overwrite its scalar fields with the newest
    /// observation, and add `tags_to_add` to its tag set.
    ///
    /// A `None` in `fields` does not erase a value recorded earlier.
    async fn upsert_book(
        &self,
        book_id: &str,
        fields: &BookFields,
        tags_to_add: &BTreeSet<String>,
    ) -> Result<()>;

    /// Insert the snapshot for `(book_id, observed_on)` unless one exists.
    /// Returns `true` when a row was written.
    async fn insert_metric_if_absent(
        &self,
        book_id: &str,
        observed_on: NaiveDate,
        fields: &MetricFields,
    ) -> Result<bool>;

    /// Insert the review unless `review_hash` exists. Returns `true` when a
    /// row was written.
    async fn insert_review_if_absent(&self, review_hash: &str, fields: &ReviewFields)
        -> Result<bool>;

    async fn book_exists(&self, book_id: &str) -> Result<bool>;

    async fn get_book(&self, book_id: &str) -> Result<Option<BookEntity>>;

    /// Snapshots for a book, oldest first.
    async fn metric_history(&self, book_id: &str) -> Result<Vec<MetricSnapshot>>;

    /// Reviews for a book, oldest first.
    async fn reviews_for(&self, book_id: &str) -> Result<Vec<ReviewEntity>>;
}
