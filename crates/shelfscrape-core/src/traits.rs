//! Seams between the pipeline and its external collaborators.
//!
//! The pipeline never talks to the network or parses markup itself. It is
//! handed a [`PageFetcher`], an [`Extractor`] and (for discovery) a
//! [`ListingSource`] at construction time, so the fetch backend (plain
//! HTTP, a rendering service) and the site markup can change without
//! touching the orchestration.
//!
//! ```text
//!   ListingSource ──▶ discovery::discover ──▶ WorkSet
//!                                               │
//!   PageFetcher ──▶ Pipeline::process ◀─────────┘
//!   Extractor   ──▶        │
//!                          ▼
//!                 persist::persist_record ──▶ Store
//! ```

use async_trait::async_trait;

use crate::error::Result;
use crate::models::BookRecord;

/// Fetches raw markup for a URL.
///
/// Implementations must bound every request with a timeout and report it as
/// [`FetchFailure::Timeout`](crate::FetchFailure::Timeout). Non-success
/// statuses are failures, not bodies.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Turns detail-page markup into a [`BookRecord`].
///
/// Synchronous: parsed documents are usually not `Send`. The pipeline calls
/// [`extract`](Extractor::extract) on the blocking thread pool.
pub trait Extractor: Send + Sync {
    /// Extract a book record. A missing title is
    /// [`IngestError::IncompleteData`](crate::IngestError::IncompleteData);
    /// every other field is optional.
    fn extract(&self, url: &str, html: &str) -> Result<BookRecord>;

    /// Absolute detail-page URLs found on a listing page.
    fn listing_links(&self, page_url: &str, html: &str) -> Vec<String>;
}

/// Produces the detail-page URLs listed for one category page.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Links on page `page` (1-based) of `category`. An empty vector marks
    /// the end of the listing.
    async fn list_page(&self, category: &str, page: u32) -> Result<Vec<String>>;
}
