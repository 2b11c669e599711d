//! In-memory [`Store`] implementation for tests and dry runs.
//!
//! Uses `HashMap`/`BTreeMap` behind `std::sync::RwLock`. Each operation
//! takes one write lock for its whole check-and-insert, which makes the
//! insert-if-absent operations atomic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

use super::{
    BookEntity, BookFields, MetricFields, MetricSnapshot, ReviewEntity, ReviewFields, Store,
};

/// In-memory store.
pub struct InMemoryStore {
    books: RwLock<HashMap<String, BookEntity>>,
    metrics: RwLock<BTreeMap<(String, NaiveDate), MetricSnapshot>>,
    reviews: RwLock<BTreeMap<String, ReviewEntity>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            metrics: RwLock::new(BTreeMap::new()),
            reviews: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn book_count(&self) -> usize {
        self.books.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn review_count(&self) -> usize {
        self.reviews.read().map(|r| r.len()).unwrap_or(0)
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_book(
        &self,
        book_id: &str,
        fields: &BookFields,
        tags_to_add: &BTreeSet<String>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut books = write(&self.books)?;
        let entry = books
            .entry(book_id.to_string())
            .or_insert_with(|| BookEntity {
                book_id: book_id.to_string(),
                title: fields.title.clone(),
                author: None,
                publish_year: None,
                cover_image: None,
                book_url: fields.book_url.clone(),
                tags: BTreeSet::new(),
                first_seen_at: now,
                last_seen_at: now,
            });

        entry.title = fields.title.clone();
        entry.book_url = fields.book_url.clone();
        if fields.author.is_some() {
            entry.author = fields.author.clone();
        }
        if fields.publish_year.is_some() {
            entry.publish_year = fields.publish_year;
        }
        if fields.cover_image.is_some() {
            entry.cover_image = fields.cover_image.clone();
        }
        entry.tags.extend(tags_to_add.iter().cloned());
        entry.last_seen_at = now;
        Ok(())
    }

    async fn insert_metric_if_absent(
        &self,
        book_id: &str,
        observed_on: NaiveDate,
        fields: &MetricFields,
    ) -> Result<bool> {
        let mut metrics = write(&self.metrics)?;
        let key = (book_id.to_string(), observed_on);
        if metrics.contains_key(&key) {
            return Ok(false);
        }
        metrics.insert(
            key,
            MetricSnapshot {
                book_id: book_id.to_string(),
                observed_on,
                avg_rating: fields.avg_rating,
                review_count: fields.review_count,
            },
        );
        Ok(true)
    }

    async fn insert_review_if_absent(
        &self,
        review_hash: &str,
        fields: &ReviewFields,
    ) -> Result<bool> {
        let mut reviews = write(&self.reviews)?;
        if reviews.contains_key(review_hash) {
            return Ok(false);
        }
        reviews.insert(
            review_hash.to_string(),
            ReviewEntity {
                review_hash: review_hash.to_string(),
                book_id: fields.book_id.clone(),
                text: fields.text.clone(),
                reviewer: fields.reviewer.clone(),
                rating: fields.rating,
                posted_on: fields.posted_on.clone(),
                tags: fields.tags.clone(),
                created_on: fields.created_on,
            },
        );
        Ok(true)
    }

    async fn book_exists(&self, book_id: &str) -> Result<bool> {
        Ok(read(&self.books)?.contains_key(book_id))
    }

    async fn get_book(&self, book_id: &str) -> Result<Option<BookEntity>> {
        Ok(read(&self.books)?.get(book_id).cloned())
    }

    async fn metric_history(&self, book_id: &str) -> Result<Vec<MetricSnapshot>> {
        Ok(read(&self.metrics)?
            .values()
            .filter(|m| m.book_id == book_id)
            .cloned()
            .collect())
    }

    async fn reviews_for(&self, book_id: &str) -> Result<Vec<ReviewEntity>> {
        let mut reviews: Vec<ReviewEntity> = read(&self.reviews)?
            .values()
            .filter(|r| r.book_id == book_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| a.created_on.cmp(&b.created_on));
        Ok(reviews)
    }
}
