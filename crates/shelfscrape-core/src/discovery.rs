//! Work discovery: walk category listings and build the deduplicated
//! [`WorkSet`] before any detail page is fetched.
//!
//! Discovery runs on a single task. The resulting set is handed to the
//! pipeline by value, so no locking is needed around it.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{info, warn};

use crate::id::{canonical_url, derive_book_id};
use crate::models::WorkItem;
use crate::traits::ListingSource;

/// Mapping from work key to the URL and the set of tags it was found under.
///
/// The key is the derived book id when one can be derived, so URL variants
/// of the same book (tracking query, different slug) share one entry.
/// URLs that yield no id are kept under their raw text; the pipeline then
/// reports them as malformed instead of silently losing them.
#[derive(Debug, Clone)]
pub struct WorkSet {
    id_prefix: String,
    items: BTreeMap<String, WorkItem>,
}

impl WorkSet {
    pub fn new(id_prefix: impl Into<String>) -> Self {
        Self {
            id_prefix: id_prefix.into(),
            items: BTreeMap::new(),
        }
    }

    /// Add `url` under `tag`, merging with an existing entry for the same
    /// book. Returns `true` when a new work item was created.
    pub fn insert(&mut self, url: &str, tag: &str) -> bool {
        let key = derive_book_id(&self.id_prefix, url).unwrap_or_else(|_| url.trim().to_string());
        match self.items.entry(key) {
            Entry::Occupied(mut e) => {
                e.get_mut().tags.insert(tag.to_string());
                false
            }
            Entry::Vacant(e) => {
                let mut tags = BTreeSet::new();
                tags.insert(tag.to_string());
                e.insert(WorkItem {
                    url: canonical_url(url),
                    tags,
                });
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&WorkItem> {
        self.items.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.items.values()
    }

    /// Number of work items carrying each tag.
    pub fn tag_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for item in self.items.values() {
            for tag in &item.tags {
                *counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Work items in key order, truncated to `limit` when given.
    pub fn into_items(self, limit: Option<usize>) -> Vec<WorkItem> {
        let iter = self.items.into_values();
        match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        }
    }
}

/// Walk `categories` page by page, up to `max_pages` each.
///
/// A page that yields no links ends its category. A page that fails is
/// logged and counted as yielding no links.
pub async fn discover(
    source: &dyn ListingSource,
    id_prefix: &str,
    categories: &[String],
    max_pages: u32,
) -> WorkSet {
    let mut work = WorkSet::new(id_prefix);

    for category in categories {
        for page in 1..=max_pages {
            let links = match source.list_page(category, page).await {
                Ok(links) => links,
                Err(e) => {
                    warn!(category = %category, page, error = %e, "listing page failed");
                    Vec::new()
                }
            };

            if links.is_empty() {
                info!(category = %category, page, "end of listing");
                break;
            }

            let found = links.len();
            let added = links.iter().filter(|url| work.insert(url, category)).count();
            info!(
                category = %category,
                page,
                found,
                added,
                total = work.len(),
                "listing page"
            );
        }
    }

    work
}
